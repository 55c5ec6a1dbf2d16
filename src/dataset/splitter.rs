//! 学習/検証分割
//!
//! 固定シードでシャッフルしてから1点で分割する。
//! 画像は `images/{train,val}/<ベース名>.jpg`、ラベルは `labels/{train,val}/<ベース名>.txt` にコピーする。

use crate::error::{Result, TacoSortError};
use crate::fs_util::write_atomic;
use crate::skipped::Skipped;
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use taco_sort_common::CocoImage;

/// 出力画像の拡張子（元画像の形式にかかわらず統一）
pub const OUTPUT_IMAGE_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
        }
    }
}

impl std::fmt::Display for Subset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// 分割の設定
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// 元画像ディレクトリ（`file_name` の基準）
    pub raw_dir: PathBuf,
    /// 変換済みラベルディレクトリ
    pub labels_dir: PathBuf,
    /// 出力先（`images/` と `labels/` を作る）
    pub output_dir: PathBuf,
    pub val_ratio: f64,
    pub seed: u64,
    /// 前回の出力を残すか
    pub keep_existing: bool,
}

/// サブセット毎の集計
#[derive(Debug, Default, Clone)]
pub struct SubsetSummary {
    pub assigned: usize,
    pub images: usize,
    pub labels_copied: usize,
    pub empty_labels: usize,
}

#[derive(Debug, Default)]
pub struct SplitSummary {
    pub train: SubsetSummary,
    pub val: SubsetSummary,
    pub skipped: Skipped,
}

impl SplitSummary {
    fn subset_mut(&mut self, subset: Subset) -> &mut SubsetSummary {
        match subset {
            Subset::Train => &mut self.train,
            Subset::Val => &mut self.val,
        }
    }
}

/// シャッフルして学習/検証に分ける
///
/// 学習側は `⌊N·(1-r)⌋` 件、残りが検証側。同じ入力順とシードなら常に同じ結果になる。
pub fn split_items<T: Clone>(items: &[T], val_ratio: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut shuffled = items.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let split_idx = train_count(items.len(), val_ratio);
    let val = shuffled.split_off(split_idx);
    (shuffled, val)
}

/// 学習側の件数
pub fn train_count(n: usize, val_ratio: f64) -> usize {
    ((n as f64) * (1.0 - val_ratio)).floor().min(n as f64) as usize
}

pub fn subset_image_dir(output_dir: &Path, subset: Subset) -> PathBuf {
    output_dir.join("images").join(subset.dir_name())
}

pub fn subset_label_dir(output_dir: &Path, subset: Subset) -> PathBuf {
    output_dir.join("labels").join(subset.dir_name())
}

fn is_jpeg_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            e == "jpg" || e == "jpeg"
        })
        .unwrap_or(false)
}

/// 画像をJPEGとして書き出す
///
/// 元がJPEGならバイト列をそのままコピーし、それ以外はデコードして再エンコードする。
fn write_as_jpeg(src: &Path, dst: &Path) -> Result<()> {
    if is_jpeg_extension(src) {
        let bytes = std::fs::read(src)?;
        return write_atomic(dst, &bytes);
    }

    let img = image::open(src)
        .map_err(|e| TacoSortError::ImageLoad(format!("{}: {}", src.display(), e)))?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| TacoSortError::ImageLoad(format!("{}: {}", src.display(), e)))?;
    write_atomic(dst, &buf)
}

/// ラベルをコピー（無い・空なら空ファイル）
///
/// 戻り値は中身をコピーしたかどうか。
fn write_label(src: &Path, dst: &Path) -> Result<bool> {
    match std::fs::read(src) {
        Ok(bytes) if !bytes.is_empty() => {
            write_atomic(dst, &bytes)?;
            Ok(true)
        }
        Ok(_) => {
            write_atomic(dst, b"")?;
            Ok(false)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("ラベルファイルがありません（空ラベルを作成）: {}", src.display());
            write_atomic(dst, b"")?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// 1画像をサブセットに配置
fn place_image(config: &SplitConfig, image: &CocoImage, subset: Subset) -> Result<bool> {
    let base_name = image.unique_base_name();
    let src_image = config.raw_dir.join(&image.file_name);
    if !src_image.is_file() {
        return Err(TacoSortError::MissingSourceAsset(src_image.display().to_string()));
    }

    let dst_image = subset_image_dir(&config.output_dir, subset)
        .join(format!("{}.{}", base_name, OUTPUT_IMAGE_EXTENSION));
    let src_label = config.labels_dir.join(format!("{}.txt", base_name));
    let dst_label = subset_label_dir(&config.output_dir, subset).join(format!("{}.txt", base_name));

    write_as_jpeg(&src_image, &dst_image)?;

    // ラベルが書けなければ画像も消して対応を崩さない
    match write_label(&src_label, &dst_label) {
        Ok(copied) => Ok(copied),
        Err(e) => {
            std::fs::remove_file(&dst_image).ok();
            Err(e)
        }
    }
}

/// 画像とラベルを学習/検証ディレクトリに分割コピー
///
/// 元画像が無い画像は `MissingSourceAsset` として記録し、次の画像に進む。
pub fn split_dataset(images: &[CocoImage], config: &SplitConfig) -> Result<SplitSummary> {
    crate::config::validate_val_ratio(config.val_ratio)?;

    let (train, val) = split_items(images, config.val_ratio, config.seed);
    let mut summary = SplitSummary::default();
    summary.train.assigned = train.len();
    summary.val.assigned = val.len();

    println!("  学習 {}枚 / 検証 {}枚 に分割", train.len(), val.len());

    for (subset, subset_images) in [(Subset::Train, &train), (Subset::Val, &val)] {
        let image_dir = subset_image_dir(&config.output_dir, subset);
        let label_dir = subset_label_dir(&config.output_dir, subset);
        if config.keep_existing {
            std::fs::create_dir_all(&image_dir)?;
            std::fs::create_dir_all(&label_dir)?;
        } else {
            clear_dir(&image_dir)?;
            clear_dir(&label_dir)?;
        }

        let pb = ProgressBar::new(subset_images.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg:5} {bar:40} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(subset.to_string());

        for image in subset_images.iter() {
            pb.inc(1);
            match place_image(config, image, subset) {
                Ok(copied) => {
                    let s = summary.subset_mut(subset);
                    s.images += 1;
                    if copied {
                        s.labels_copied += 1;
                    } else {
                        s.empty_labels += 1;
                    }
                }
                Err(e) => summary.skipped.record(image.file_name.clone(), e),
            }
        }

        pb.finish_and_clear();
        let s = summary.subset_mut(subset);
        println!(
            "  ✔ {}: 画像{}枚・ラベル{}件（空ラベル{}件）",
            subset, s.images, s.labels_copied, s.empty_labels
        );
    }

    Ok(summary)
}
