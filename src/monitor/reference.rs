//! 参照データ生成
//!
//! 検証用画像を1枚ずつ推論し、推論APIと同じ形のレコードにまとめて一括保存する。

use super::prediction_log::{now_timestamp, write_log};
use crate::detector::{DetectParams, ModelHandle};
use crate::error::Result;
use crate::scanner::scan_folder;
use crate::skipped::Skipped;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use taco_sort_common::PredictionLogRecord;

#[derive(Debug, Default)]
pub struct ReferenceSummary {
    pub images: usize,
    pub records: usize,
    pub skipped: Skipped,
}

pub fn generate_reference(
    model: &ModelHandle,
    images_dir: &Path,
    output: &Path,
    params: &DetectParams,
) -> Result<ReferenceSummary> {
    params.validate()?;
    let images = scan_folder(images_dir)?;

    let pb = ProgressBar::new(images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut records = Vec::with_capacity(images.len());
    let mut skipped = Skipped::new();

    for image in &images {
        pb.set_message(image.file_name.clone());
        match model.detect(&image.path, params) {
            Ok(detections) => {
                records.push(PredictionLogRecord::from_detections(&detections, now_timestamp()));
            }
            Err(e) => skipped.record(image.file_name.clone(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    write_log(output, &records)?;

    Ok(ReferenceSummary {
        images: images.len(),
        records: records.len(),
        skipped,
    })
}
