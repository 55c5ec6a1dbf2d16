//! 学習ツール向けデータセット定義（dataset.yaml）

use crate::error::{Result, TacoSortError};
use crate::fs_util::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DATASET_YAML_NAME: &str = "dataset.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetYaml {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub nc: usize,
    /// クラスID → クラス名
    pub names: BTreeMap<i64, String>,
}

impl DatasetYaml {
    pub fn new(dataset_root: &Path, names: BTreeMap<i64, String>) -> Self {
        Self {
            path: dataset_root.to_path_buf(),
            train: "images/train".into(),
            val: "images/val".into(),
            nc: names.len(),
            names,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TacoSortError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// クラス名（無ければ `ID:<n>`）
    pub fn class_name(&self, class_id: i64) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("ID:{}", class_id))
    }
}
