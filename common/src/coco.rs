//! COCO形式アノテーションの型定義
//!
//! 外部から入ってくるJSONはここで型付きレコードに変換し、
//! 境界で一度だけ検証する。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// 画像レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: i64,
    /// 生データディレクトリからの相対パス（サブディレクトリを含むことがある）
    pub file_name: String,
    pub width: f64,
    pub height: f64,
}

impl CocoImage {
    /// 出力ファイル名に使う衝突しないベース名
    pub fn unique_base_name(&self) -> String {
        unique_base_name(&self.file_name)
    }
}

/// アノテーションレコード（物体1つにつき1件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub image_id: i64,
    pub category_id: i64,
    /// [x_min, y_min, width, height]（ピクセル、左上原点）
    pub bbox: [f64; 4],
}

/// カテゴリ定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

/// アノテーションファイル全体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

impl CocoDataset {
    /// JSON文字列からパースして検証
    pub fn from_json_str(content: &str) -> Result<Self> {
        let dataset: CocoDataset = serde_json::from_str(content)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// ファイルから読み込み
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 画像IDの一意性を検証
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for image in &self.images {
            if !seen.insert(image.id) {
                return Err(Error::Parse(format!(
                    "duplicate image id {} ({})",
                    image.id, image.file_name
                )));
            }
        }
        Ok(())
    }

    /// 画像ID → 画像レコード
    pub fn images_by_id(&self) -> HashMap<i64, &CocoImage> {
        self.images.iter().map(|img| (img.id, img)).collect()
    }

    /// 画像ID → アノテーション一覧
    ///
    /// キーが無い画像はアノテーション0件として扱う。
    pub fn annotations_by_image(&self) -> HashMap<i64, Vec<&CocoAnnotation>> {
        let mut map: HashMap<i64, Vec<&CocoAnnotation>> = HashMap::new();
        for ann in &self.annotations {
            map.entry(ann.image_id).or_default().push(ann);
        }
        map
    }

    /// カテゴリID → クラス名
    pub fn class_names(&self) -> BTreeMap<i64, String> {
        self.categories
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect()
    }
}

/// 衝突しないベース名を生成
///
/// 拡張子を落とし、パス区切りを `_` に置き換える。
/// `batch_1/000006.jpg` と `batch_2/000006.JPG` は別の名前になる。
///
/// # Examples
/// ```
/// use taco_sort_common::unique_base_name;
///
/// assert_eq!(unique_base_name("batch_1/000006.jpg"), "batch_1_000006");
/// assert_eq!(unique_base_name("000006.JPG"), "000006");
/// ```
pub fn unique_base_name(file_name: &str) -> String {
    let mut trimmed = file_name;
    while let Some(rest) = trimmed.strip_prefix("./").or_else(|| trimmed.strip_prefix(".\\")) {
        trimmed = rest;
    }

    let leaf_start = trimmed
        .rfind(|c: char| c == '/' || c == '\\')
        .map(|i| i + 1)
        .unwrap_or(0);

    // 拡張子のドットは葉の中だけを見る（先頭ドットの隠しファイルは拡張子扱いしない）
    let stem = match trimmed[leaf_start..].rfind('.') {
        Some(dot) if dot > 0 => &trimmed[..leaf_start + dot],
        _ => trimmed,
    };

    stem.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
