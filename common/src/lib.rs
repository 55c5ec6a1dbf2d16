//! TACO-SORT Common Library
//!
//! データセット準備・推論API・ドリフト監視で共有される型とデータ整形ロジック

pub mod coco;
pub mod error;
pub mod parser;
pub mod prediction;
pub mod table;
pub mod yolo;

pub use coco::{unique_base_name, CocoAnnotation, CocoCategory, CocoDataset, CocoImage};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_detections};
pub use prediction::{parse_log_lines, Detection, LogTimestamp, PredictionLogRecord};
pub use table::{column_union, FeatureTable};
pub use yolo::{coco_to_yolo, yolo_to_coco, LabelLine, YoloBox, GEOMETRY_EPSILON};
