//! 推論結果と予測ログの型定義
//!
//! 予測ログは1推論1行のJSONL。推論APIが追記し、
//! 参照データ生成が検証用画像に対して一括で書き出す。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 検出1件（ピクセル座標、左上/右下）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(alias = "xmin")]
    pub x1: f64,
    #[serde(alias = "ymin")]
    pub y1: f64,
    #[serde(alias = "xmax")]
    pub x2: f64,
    #[serde(alias = "ymax")]
    pub y2: f64,
    pub confidence: f64,
    #[serde(alias = "name")]
    pub class_name: String,
}

/// ログのタイムスタンプ
///
/// 推論APIはISO 8601文字列、古い参照データはUNIX秒で書いている。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogTimestamp {
    Epoch(f64),
    Iso(String),
}

impl Default for LogTimestamp {
    fn default() -> Self {
        LogTimestamp::Epoch(0.0)
    }
}

/// 予測ログ1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogRecord {
    #[serde(default)]
    pub timestamp: LogTimestamp,
    pub num_boxes_predicted: u64,
    #[serde(default)]
    pub avg_confidence: f64,
    /// クラス名 → 検出数
    #[serde(default)]
    pub class_distribution: BTreeMap<String, u64>,
}

impl PredictionLogRecord {
    /// 検出結果から集計レコードを作成
    ///
    /// 検出0件のとき平均信頼度は0.0。
    pub fn from_detections(detections: &[Detection], timestamp: LogTimestamp) -> Self {
        let mut class_distribution = BTreeMap::new();
        for det in detections {
            *class_distribution.entry(det.class_name.clone()).or_insert(0) += 1;
        }

        let avg_confidence = if detections.is_empty() {
            0.0
        } else {
            let sum: f64 = detections.iter().map(|d| d.confidence).sum();
            let mean = sum / detections.len() as f64;
            if mean.is_finite() { mean } else { 0.0 }
        };

        Self {
            timestamp,
            num_boxes_predicted: detections.len() as u64,
            avg_confidence,
            class_distribution,
        }
    }

    /// JSONL用の1行（改行付き）
    pub fn to_json_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// JSONLをパース
///
/// 壊れた行はスキップし、(行番号, エラー) として返す。
pub fn parse_log_lines(content: &str) -> (Vec<PredictionLogRecord>, Vec<(usize, Error)>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PredictionLogRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => errors.push((idx + 1, Error::Json(e))),
        }
    }

    (records, errors)
}
