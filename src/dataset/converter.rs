//! COCO → YOLO ラベル変換
//!
//! アノテーションファイルの全画像について、衝突しないベース名で
//! ラベルファイルを1つずつ書き出す。アノテーションの無い画像も空ファイルを作る。

use crate::error::{Result, TacoSortError};
use crate::fs_util::write_atomic;
use crate::skipped::Skipped;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use taco_sort_common::yolo::format_label_file;
use taco_sort_common::{coco_to_yolo, CocoDataset, LabelLine};

/// 変換結果
#[derive(Debug, Default)]
pub struct ConversionSummary {
    /// 書き出したラベルファイル数
    pub label_files: usize,
    /// 1行以上を含むラベルファイル数
    pub non_empty: usize,
    /// 書き出したラベル行数
    pub boxes: usize,
    /// 画像ID → ラベルファイルパス
    pub label_paths: HashMap<i64, PathBuf>,
    pub skipped: Skipped,
}

impl ConversionSummary {
    pub fn empty_files(&self) -> usize {
        self.label_files - self.non_empty
    }
}

/// アノテーションファイルを読み込む
///
/// ファイルが無い・JSONが壊れている場合は致命的エラー。
pub fn load_annotations(path: &Path) -> Result<CocoDataset> {
    if !path.exists() {
        return Err(TacoSortError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    CocoDataset::from_json_str(&content).map_err(|e| match e {
        taco_sort_common::Error::Json(err) => TacoSortError::MalformedInput(format!(
            "{} のJSONを解析できません: {}",
            path.display(),
            err
        )),
        other => TacoSortError::MalformedInput(format!("{}: {}", path.display(), other)),
    })
}

/// 1画像分のラベル行を作る
///
/// 範囲外のボックスは `InvalidGeometry` としてスキップ記録する。
fn label_lines_for_image(
    dataset_image: &taco_sort_common::CocoImage,
    annotations: &[&taco_sort_common::CocoAnnotation],
    skipped: &mut Skipped,
) -> Vec<LabelLine> {
    let mut lines = Vec::with_capacity(annotations.len());

    for ann in annotations {
        let converted = coco_to_yolo(ann.bbox, dataset_image.width, dataset_image.height)
            .and_then(|b| b.validated());

        match converted {
            Ok(bbox) => lines.push(LabelLine {
                class_id: ann.category_id,
                bbox,
            }),
            Err(e) => skipped.record(
                format!("{} (category {}, bbox {:?})", dataset_image.file_name, ann.category_id, ann.bbox),
                TacoSortError::InvalidGeometry(e.to_string()),
            ),
        }
    }

    lines
}

/// COCOアノテーションをYOLOラベルに変換
///
/// 未知の画像IDを参照するアノテーションは警告してスキップする（処理は継続）。
pub fn convert_coco_to_yolo(dataset: &CocoDataset, labels_dir: &Path) -> Result<ConversionSummary> {
    std::fs::create_dir_all(labels_dir)?;

    let mut summary = ConversionSummary::default();
    let images = dataset.images_by_id();
    let annotations = dataset.annotations_by_image();

    for ann in &dataset.annotations {
        if !images.contains_key(&ann.image_id) {
            summary.skipped.record(
                format!("annotation (image_id {})", ann.image_id),
                TacoSortError::MalformedInput(format!("未知の画像IDを参照しています: {}", ann.image_id)),
            );
        }
    }

    let pb = ProgressBar::new(dataset.images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // 同じステムや平坦化後に同名になる画像（`a/1.jpg` と `a_1.png` など）は
    // 先に出た方だけ変換し、後の画像はスキップ記録する（DESIGN.md の重複ベース名の方針）
    let mut used_names: HashSet<String> = HashSet::new();

    for image in &dataset.images {
        pb.inc(1);
        let base_name = image.unique_base_name();

        if !used_names.insert(base_name.clone()) {
            summary.skipped.record(
                image.file_name.clone(),
                TacoSortError::MalformedInput(format!(
                    "ベース名 {} が他の画像と重複しています",
                    base_name
                )),
            );
            continue;
        }

        let image_annotations = annotations.get(&image.id).map(Vec::as_slice).unwrap_or(&[]);

        if !image_annotations.is_empty() && !(image.width > 0.0 && image.height > 0.0) {
            // 画像サイズが不正なら全ボックスを落とし、空ラベルだけ作る
            summary.skipped.record(
                image.file_name.clone(),
                TacoSortError::InvalidGeometry(format!(
                    "画像サイズが不正です: {} x {}（{}件のボックスを破棄）",
                    image.width,
                    image.height,
                    image_annotations.len()
                )),
            );
        }

        let lines = if image.width > 0.0 && image.height > 0.0 {
            label_lines_for_image(image, image_annotations, &mut summary.skipped)
        } else {
            Vec::new()
        };

        let label_path = labels_dir.join(format!("{}.txt", base_name));
        write_atomic(&label_path, format_label_file(&lines).as_bytes())?;

        summary.label_files += 1;
        summary.boxes += lines.len();
        if !lines.is_empty() {
            summary.non_empty += 1;
        }
        summary.label_paths.insert(image.id, label_path);
    }

    pb.finish_and_clear();
    Ok(summary)
}
