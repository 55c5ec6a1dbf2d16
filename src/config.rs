use crate::error::{Result, TacoSortError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 検出器コマンドの環境変数（設定ファイルより優先）
pub const DETECTOR_ENV: &str = "TACO_SORT_DETECTOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub val_ratio: f64,
    pub seed: u64,
    pub detector_command: Option<Vec<String>>,
    pub confidence: f64,
    pub iou: f64,
    pub bind: String,
    /// 検証画像のクラス名描画に使うフォント（未設定ならシステムフォントを探す）
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            val_ratio: 0.2,
            seed: 42,
            detector_command: None,
            confidence: 0.25,
            iou: 0.7,
            bind: "0.0.0.0:8000".into(),
            font_path: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| TacoSortError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("taco-sort").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        validate_val_ratio(self.val_ratio)?;
        validate_threshold("confidence", self.confidence)?;
        validate_threshold("iou", self.iou)?;
        Ok(())
    }

    // データディレクトリ配下の既定パス

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn annotations_file(&self) -> PathBuf {
        self.raw_dir().join("annotations.json")
    }

    pub fn raw_labels_dir(&self) -> PathBuf {
        self.raw_dir().join("labels")
    }

    pub fn prepared_dir(&self) -> PathBuf {
        self.data_dir.join("prepared")
    }

    pub fn reference_file(&self) -> PathBuf {
        self.data_dir.join("reference_data.jsonl")
    }

    pub fn prediction_log_file(&self) -> PathBuf {
        self.data_dir.join("logs").join("prediction_logs.jsonl")
    }

    pub fn drift_report_file(&self) -> PathBuf {
        self.data_dir.join("reports").join("drift_report.html")
    }

    pub fn verification_dir(&self) -> PathBuf {
        self.data_dir.join("verification_output")
    }

    /// 検出器コマンドを取得
    pub fn get_detector_command(&self) -> Option<Vec<String>> {
        // 環境変数を優先
        if let Ok(cmd) = std::env::var(DETECTOR_ENV) {
            let parts = split_command(&cmd);
            if !parts.is_empty() {
                return Some(parts);
            }
        }

        self.detector_command.clone().filter(|c| !c.is_empty())
    }

    pub fn set_detector_command(&mut self, command: &str) -> Result<()> {
        let parts = split_command(command);
        if parts.is_empty() {
            return Err(TacoSortError::Config("検出器コマンドが空です".into()));
        }
        self.detector_command = Some(parts);
        self.save()
    }
}

pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

pub fn validate_val_ratio(ratio: f64) -> Result<()> {
    if ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(TacoSortError::Config(format!(
            "検証データ比率は0より大きく1未満で指定してください: {}",
            ratio
        )))
    }
}

pub fn validate_threshold(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TacoSortError::Config(format!(
            "{}は0.0〜1.0で指定してください: {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.annotations_file(), PathBuf::from("data/raw/annotations.json"));
        assert_eq!(config.prediction_log_file(), PathBuf::from("data/logs/prediction_logs.jsonl"));
        assert_eq!(config.drift_report_file(), PathBuf::from("data/reports/drift_report.html"));
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.val_ratio, 0.2);
        assert_eq!(config.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_save_and_load_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            seed: 7,
            detector_command: Some(vec!["python".into(), "predict.py".into()]),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.detector_command, config.detector_command);

        std::fs::write(&path, r#"{"val_ratio": 0.1}"#).unwrap();
        let partial = Config::load_from(&path).unwrap();
        assert_eq!(partial.val_ratio, 0.1);
        assert_eq!(partial.seed, 42);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"val_ratio": 1.0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(TacoSortError::Config(_))));

        assert!(validate_threshold("iou", 1.5).is_err());
        assert!(validate_threshold("iou", 0.0).is_ok());
        assert!(validate_val_ratio(0.0).is_err());
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  python  yolo_predict.py --weights best.pt "), vec![
            "python", "yolo_predict.py", "--weights", "best.pt"
        ]);
        assert!(split_command("   ").is_empty());
    }
}
