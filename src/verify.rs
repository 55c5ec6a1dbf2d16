//! ラベル検証画像の生成
//!
//! 検証用画像からランダムに数枚選び、ラベルのボックスとクラス名を描画して保存する。
//! 変換・分割の結果を目視で確認するためのもの。
//!
//! クラス名はフォントが見つかった場合のみ描画する（ボックスと標準出力は常に出る）。

use crate::dataset::{subset_image_dir, subset_label_dir, DatasetYaml, Subset, DATASET_YAML_NAME};
use crate::error::{Result, TacoSortError};
use crate::fs_util::write_atomic;
use crate::scanner::{scan_jpegs, ImageInfo};
use crate::skipped::Skipped;
use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use taco_sort_common::yolo::parse_label_file;

pub const DEFAULT_VERIFY_COUNT: usize = 5;
pub const VERIFIED_PREFIX: &str = "VERIFIED_";

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_SCALE: f32 = 14.0;

/// フォント未指定時に探す場所
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// 分割済みデータセットのルート
    pub dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    pub count: usize,
    /// None なら毎回異なる画像を選ぶ
    pub seed: Option<u64>,
    /// None ならシステムフォントを探す
    pub font: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct VerifySummary {
    pub saved: Vec<PathBuf>,
    pub boxes: usize,
    pub skipped: Skipped,
}

/// 描画したボックス1件
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnBox {
    pub class_name: String,
    pub tlbr: (u32, u32, u32, u32),
}

/// クラス名描画用フォントを読み込む
///
/// 明示したパスが読めなければエラー。未指定で見つからなければ `None`。
pub fn load_label_font(path: Option<&Path>) -> Result<Option<FontVec>> {
    if let Some(path) = path {
        if !path.is_file() {
            return Err(TacoSortError::FileNotFound(path.display().to_string()));
        }
        let font = FontVec::try_from_vec(std::fs::read(path)?).map_err(|e| {
            TacoSortError::Config(format!("フォントを読み込めません: {}: {}", path.display(), e))
        })?;
        return Ok(Some(font));
    }

    for candidate in SYSTEM_FONT_CANDIDATES {
        let Ok(bytes) = std::fs::read(candidate) else {
            continue;
        };
        if let Ok(font) = FontVec::try_from_vec(bytes) {
            log::debug!("ラベル用フォント: {}", candidate);
            return Ok(Some(font));
        }
    }
    log::warn!("ラベル用フォントが見つかりません（クラス名は描画しません。--font で指定できます）");
    Ok(None)
}

pub fn verify_labels(options: &VerifyOptions) -> Result<VerifySummary> {
    let image_dir = subset_image_dir(&options.dataset_dir, Subset::Val);
    let label_dir = subset_label_dir(&options.dataset_dir, Subset::Val);

    let yaml = match DatasetYaml::load(&options.dataset_dir.join(DATASET_YAML_NAME)) {
        Ok(yaml) => Some(yaml),
        Err(TacoSortError::FileNotFound(p)) => {
            log::warn!("dataset.yaml がありません（クラスIDで表示）: {}", p);
            None
        }
        Err(e) => return Err(e),
    };

    let images = scan_jpegs(&image_dir)?;
    let font = load_label_font(options.font.as_deref())?;
    if images.is_empty() {
        println!("検証用画像がありません: {}", image_dir.display());
        return Ok(VerifySummary::default());
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let count = options.count.min(images.len());
    let picked: Vec<&ImageInfo> = images.choose_multiple(&mut rng, count).collect();
    println!("{}枚をランダムに選択しました", picked.len());

    let mut summary = VerifySummary::default();

    for info in picked {
        println!("\n--- {} ---", info.file_name);
        let target = VerifyTarget {
            label_dir: &label_dir,
            output_dir: &options.output_dir,
            yaml: yaml.as_ref(),
            font: font.as_ref(),
        };
        match verify_one(info, &target, &mut summary.skipped) {
            Ok((saved, drawn)) => {
                for b in &drawn {
                    let (x1, y1, x2, y2) = b.tlbr;
                    println!("  {} at [{}, {}, {}, {}]", b.class_name, x1, y1, x2, y2);
                }
                println!("✔ {}", saved.display());
                summary.boxes += drawn.len();
                summary.saved.push(saved);
            }
            Err(e) => summary.skipped.record(info.file_name.clone(), e),
        }
    }

    Ok(summary)
}

/// 1枚の描画に必要な共通情報
struct VerifyTarget<'a> {
    label_dir: &'a Path,
    output_dir: &'a Path,
    yaml: Option<&'a DatasetYaml>,
    font: Option<&'a FontVec>,
}

fn verify_one(
    info: &ImageInfo,
    target: &VerifyTarget<'_>,
    skipped: &mut Skipped,
) -> Result<(PathBuf, Vec<DrawnBox>)> {
    let mut img = image::open(&info.path)
        .map_err(|e| TacoSortError::ImageLoad(format!("{}: {}", info.path.display(), e)))?
        .to_rgb8();

    let stem = info
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let label_path = target.label_dir.join(format!("{}.txt", stem));

    let drawn = match std::fs::read_to_string(&label_path) {
        Ok(content) => {
            let (lines, errors) = parse_label_file(&content);
            for (line_no, err) in errors {
                skipped.record(
                    format!("{}:{}", label_path.display(), line_no),
                    TacoSortError::MalformedInput(err.to_string()),
                );
            }
            lines
                .iter()
                .map(|line| {
                    let tlbr = line.bbox.to_pixel_tlbr(img.width(), img.height());
                    draw_box(&mut img, tlbr);
                    let class_name = match target.yaml {
                        Some(y) => y.class_name(line.class_id),
                        None => format!("ID:{}", line.class_id),
                    };
                    if let Some(font) = target.font {
                        draw_label(&mut img, font, tlbr, &class_name);
                    }
                    DrawnBox { class_name, tlbr }
                })
                .collect()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("ラベルファイルがありません: {}", label_path.display());
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let output = target.output_dir.join(format!("{}{}", VERIFIED_PREFIX, info.file_name));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| TacoSortError::ImageLoad(format!("{}: {}", output.display(), e)))?;
    write_atomic(&output, &buf)?;

    Ok((output, drawn))
}

/// 太さ2pxの矩形（内側に1px重ねる）
fn draw_box(img: &mut RgbImage, (x1, y1, x2, y2): (u32, u32, u32, u32)) {
    for i in 0..BOX_THICKNESS {
        let (left, top) = (x1 + i, y1 + i);
        let (right, bottom) = (x2.saturating_sub(i), y2.saturating_sub(i));
        if right <= left || bottom <= top {
            break;
        }
        let rect = Rect::at(left as i32, top as i32).of_size(right - left + 1, bottom - top + 1);
        draw_hollow_rect_mut(img, rect, BOX_COLOR);
    }
}

/// クラス名の左上位置（枠の上に置けなければ枠の内側）
fn label_origin((x1, y1, _, _): (u32, u32, u32, u32), text_height: u32) -> (i32, i32) {
    let y = if y1 >= text_height { y1 - text_height } else { y1 };
    (x1 as i32, y as i32)
}

/// 枠色の帯の上にクラス名を書く
fn draw_label(img: &mut RgbImage, font: &FontVec, tlbr: (u32, u32, u32, u32), text: &str) {
    let scale = PxScale::from(LABEL_SCALE);
    let (w, h) = text_size(scale, font, text);
    if w == 0 || h == 0 {
        return;
    }
    let (x, y) = label_origin(tlbr, h);
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), BOX_COLOR);
    draw_text_mut(img, LABEL_TEXT_COLOR, x, y, scale, font, text);
}
