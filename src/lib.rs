//! TACO-SORT
//!
//! ゴミ分別検出モデルの運用ツール
//! - データセット準備（COCO → YOLO 変換、学習/検証分割）
//! - 推論API
//! - 予測ログのドリフト監視

pub mod cli;
pub mod config;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod fs_util;
pub mod monitor;
pub mod scanner;
pub mod serve;
pub mod skipped;
pub mod verify;
