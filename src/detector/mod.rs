//! 物体検出モデルとの境界
//!
//! 推論そのものは外部（学習済みモデルを動かすコマンド）に任せる。
//! モデルは起動時に明示的に作ってハンドラへ渡し、終了時に破棄する。

mod command;

pub use command::CommandDetector;

use crate::config::validate_threshold;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use taco_sort_common::Detection;

pub const DEFAULT_CONFIDENCE: f64 = 0.25;
pub const DEFAULT_IOU: f64 = 0.7;

/// 推論時パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectParams {
    /// 信頼度しきい値
    #[serde(default = "default_confidence", rename = "conf")]
    pub confidence: f64,
    /// NMSのIoUしきい値
    #[serde(default = "default_iou")]
    pub iou: f64,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_iou() -> f64 {
    DEFAULT_IOU
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
        }
    }
}

impl DetectParams {
    pub fn new(confidence: f64, iou: f64) -> Result<Self> {
        let params = Self { confidence, iou };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold("conf", self.confidence)?;
        validate_threshold("iou", self.iou)
    }
}

/// 画像1枚に対する物体検出
pub trait Detector: Send + Sync {
    /// ログ表示用の名前
    fn name(&self) -> &str;

    fn detect(&self, image: &Path, params: &DetectParams) -> Result<Vec<Detection>>;
}

/// ロード済みモデルのハンドル
///
/// 推論APIの状態に `Arc` で共有され、最後の参照が消えたときに破棄ログを出す。
pub struct ModelHandle {
    detector: Box<dyn Detector>,
}

impl ModelHandle {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        log::info!("モデルをロードしました: {}", detector.name());
        Self { detector }
    }

    pub fn shared(detector: Box<dyn Detector>) -> Arc<Self> {
        Arc::new(Self::new(detector))
    }

    pub fn name(&self) -> &str {
        self.detector.name()
    }

    pub fn detect(&self, image: &Path, params: &DetectParams) -> Result<Vec<Detection>> {
        self.detector.detect(image, params)
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        log::info!("モデルを破棄しました: {}", self.detector.name());
    }
}
