//! データセット準備
//!
//! ## 処理フロー
//! 1. COCOアノテーションをYOLOラベルに変換（`raw/labels/`）
//! 2. 画像とラベルを学習/検証に分割コピー（`prepared/`）
//! 3. 学習ツール向けの `dataset.yaml` を書き出す

pub mod converter;
pub mod splitter;
pub mod yaml;

pub use converter::{convert_coco_to_yolo, load_annotations, ConversionSummary};
pub use splitter::{
    split_dataset, split_items, subset_image_dir, subset_label_dir, train_count, SplitConfig,
    SplitSummary, Subset,
};
pub use yaml::{DatasetYaml, DATASET_YAML_NAME};

use crate::error::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use taco_sort_common::{CocoDataset, CocoImage};

/// 準備処理の入力
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub annotations_file: PathBuf,
    pub raw_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    pub val_ratio: f64,
    pub seed: u64,
    pub keep_existing: bool,
}

#[derive(Debug)]
pub struct PrepareSummary {
    pub conversion: ConversionSummary,
    pub split: SplitSummary,
    pub dataset_yaml: PathBuf,
}

impl PrepareSummary {
    pub fn skipped_count(&self) -> usize {
        self.conversion.skipped.len() + self.split.skipped.len()
    }
}

/// 分割対象の画像を取り出す（単独の分割用）
///
/// 同じベース名が複数ある場合は先に出た画像のみ残す。ラベルの有無では絞らない
/// （ラベルが無い画像は分割時に空ラベルになる）。
pub fn unique_images(dataset: &CocoDataset) -> Vec<CocoImage> {
    let mut seen = HashSet::new();
    dataset
        .images
        .iter()
        .filter(|img| seen.insert(img.unique_base_name()))
        .cloned()
        .collect()
}

/// 変換→分割→dataset.yaml を一括実行
pub fn prepare_dataset(options: &PrepareOptions) -> Result<PrepareSummary> {
    crate::config::validate_val_ratio(options.val_ratio)?;

    println!("[1/3] COCO → YOLO 変換中...");
    let dataset = load_annotations(&options.annotations_file)?;
    println!(
        "  画像{}件・アノテーション{}件を読み込み",
        dataset.images.len(),
        dataset.annotations.len()
    );
    let conversion = convert_coco_to_yolo(&dataset, &options.labels_dir)?;
    println!(
        "✔ ラベル{}件を作成（ボックスあり{}件・空{}件）: {}\n",
        conversion.label_files,
        conversion.non_empty,
        conversion.empty_files(),
        options.labels_dir.display()
    );

    println!("[2/3] 学習/検証に分割中...");
    let split_config = SplitConfig {
        raw_dir: options.raw_dir.clone(),
        labels_dir: options.labels_dir.clone(),
        output_dir: options.output_dir.clone(),
        val_ratio: options.val_ratio,
        seed: options.seed,
        keep_existing: options.keep_existing,
    };

    // ベース名が衝突してラベルを作らなかった画像は分割対象から外す
    let images: Vec<_> = dataset
        .images
        .iter()
        .filter(|img| conversion.label_paths.contains_key(&img.id))
        .cloned()
        .collect();
    let split = split_dataset(&images, &split_config)?;
    println!("✔ 分割完了: {}\n", options.output_dir.display());

    println!("[3/3] dataset.yaml を作成中...");
    let dataset_yaml = options.output_dir.join(DATASET_YAML_NAME);
    DatasetYaml::new(&options.output_dir, dataset.class_names()).save(&dataset_yaml)?;
    println!("✔ {}", dataset_yaml.display());

    Ok(PrepareSummary {
        conversion,
        split,
        dataset_yaml,
    })
}
