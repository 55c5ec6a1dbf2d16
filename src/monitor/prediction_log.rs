//! 予測ログの書き込みと読み込み
//!
//! 現行ログは追記専用（1推論1行）。読み出し側は壊れた行を飛ばして続行する。

use crate::error::{Result, TacoSortError};
use crate::fs_util::{append_line, write_atomic};
use crate::skipped::Skipped;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use taco_sort_common::{parse_log_lines, LogTimestamp, PredictionLogRecord};

/// 現在時刻（RFC 3339）
pub fn now_timestamp() -> LogTimestamp {
    LogTimestamp::Iso(chrono::Utc::now().to_rfc3339())
}

/// 追記専用の予測ログ
///
/// 同一プロセス内の同時リクエストはロックで直列化し、各行は追記モードの1回の書き込みで出す。
pub struct PredictionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &PredictionLogRecord) -> Result<()> {
        let line = record.to_json_line()?;
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        append_line(&self.path, &line)
    }
}

/// 読み込んだログ
#[derive(Debug, Default)]
pub struct LoadedLog {
    pub records: Vec<PredictionLogRecord>,
    pub skipped: Skipped,
}

/// JSONLログを読み込む
///
/// ファイルが無い場合は `FileNotFound`。壊れた行はスキップ記録する。
pub fn read_log(path: &Path) -> Result<LoadedLog> {
    if !path.is_file() {
        return Err(TacoSortError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let (records, errors) = parse_log_lines(&content);

    let mut skipped = Skipped::new();
    for (line_no, err) in errors {
        skipped.record(
            format!("{}:{}", path.display(), line_no),
            TacoSortError::MalformedInput(err.to_string()),
        );
    }

    Ok(LoadedLog { records, skipped })
}

/// ログ全体を一括で書き出す（参照データ用）
pub fn write_log(path: &Path, records: &[PredictionLogRecord]) -> Result<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&record.to_json_line()?);
    }
    write_atomic(path, content.as_bytes())
}
