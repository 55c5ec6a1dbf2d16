//! ドリフト監視
//!
//! 参照ログと現行ログを読み込み、列を揃えてからドリフト検定を行い、
//! レポートを書き出す。終了コードで外部スケジューラに結果を伝える。

pub mod drift;
pub mod prediction_log;
pub mod reconcile;
pub mod reference;
pub mod report;

pub use drift::{detect_dataset_drift, ColumnDrift, DatasetDrift, StatTest};
pub use prediction_log::{read_log, LoadedLog, PredictionLog};
pub use reconcile::{reconcile, Reconciled};
pub use reference::{generate_reference, ReferenceSummary};
pub use report::{save_report, DriftReport};

use crate::error::{Result, TacoSortError};
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_INSUFFICIENT_DATA: i32 = 2;
pub const EXIT_DRIFT_DETECTED: i32 = 3;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub reference: PathBuf,
    pub current: PathBuf,
    pub report: PathBuf,
}

#[derive(Debug)]
pub enum MonitorOutcome {
    /// 比較できなかった（レポートは書かない）
    InsufficientData { reason: TacoSortError },
    Completed {
        report: DriftReport,
        report_path: PathBuf,
    },
}

impl MonitorOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            MonitorOutcome::InsufficientData { .. } => EXIT_INSUFFICIENT_DATA,
            MonitorOutcome::Completed { report, .. } if report.drift_detected() => EXIT_DRIFT_DETECTED,
            MonitorOutcome::Completed { .. } => EXIT_OK,
        }
    }
}

/// ログ読み込み（ファイル無しは「データ不足」として扱う）
fn load_side(path: &Path, label: &str) -> Result<std::result::Result<LoadedLog, TacoSortError>> {
    match read_log(path) {
        Ok(loaded) => Ok(Ok(loaded)),
        Err(TacoSortError::FileNotFound(p)) => Ok(Err(TacoSortError::InsufficientData(format!(
            "{}ログがありません: {}",
            label, p
        )))),
        Err(e) => Err(e),
    }
}

pub fn run_monitor(options: &MonitorOptions) -> Result<MonitorOutcome> {
    println!("[1/3] ログを読み込み中...");
    let reference = match load_side(&options.reference, "参照")? {
        Ok(loaded) => loaded,
        Err(reason) => return Ok(insufficient(reason)),
    };
    let current = match load_side(&options.current, "現行")? {
        Ok(loaded) => loaded,
        Err(reason) => return Ok(insufficient(reason)),
    };
    println!(
        "✔ 参照{}行・現行{}行\n",
        reference.records.len(),
        current.records.len()
    );

    let skipped_lines = reference.skipped.len() + current.skipped.len();
    reference.skipped.print_summary("参照ログ");
    current.skipped.print_summary("現行ログ");

    println!("[2/3] 列を揃えてドリフト検定中...");
    let (ref_table, cur_table) = match reconcile(&reference.records, &current.records) {
        Reconciled::Ready { reference, current } => (reference, current),
        Reconciled::InsufficientData { reference_rows, current_rows } => {
            return Ok(insufficient(TacoSortError::InsufficientData(format!(
                "比較できる行がありません（参照{}行・現行{}行）",
                reference_rows, current_rows
            ))));
        }
    };
    let drift = detect_dataset_drift(&ref_table, &cur_table);
    println!(
        "✔ {}列中{}列でドリフト\n",
        drift.number_of_columns, drift.number_of_drifted_columns
    );

    for col in drift.primary_columns() {
        println!(
            "  {}: {} = {:.4} ({})",
            col.column,
            col.stattest,
            col.score,
            if col.drift_detected { "ドリフトあり" } else { "ドリフトなし" }
        );
    }

    println!("[3/3] レポートを保存中...");
    let report = DriftReport::new(
        &options.reference,
        &options.current,
        ref_table.len(),
        cur_table.len(),
        skipped_lines,
        drift,
    );
    let json_path = save_report(&report, &options.report)?;
    println!("✔ {}", options.report.display());
    println!("✔ {}", json_path.display());

    if report.drift_detected() {
        alert(&report);
    }

    Ok(MonitorOutcome::Completed {
        report,
        report_path: options.report.clone(),
    })
}

fn insufficient(reason: TacoSortError) -> MonitorOutcome {
    log::warn!("ドリフト検定を中止: {}", reason);
    eprintln!("⚠ {}", reason);
    MonitorOutcome::InsufficientData { reason }
}

fn alert(report: &DriftReport) {
    let drift = &report.drift;
    log::warn!(
        "データドリフトを検出: {}/{}列",
        drift.number_of_drifted_columns,
        drift.number_of_columns
    );
    eprintln!();
    eprintln!("==================================================");
    eprintln!("🚨 ALERT: データドリフトを検出しました");
    eprintln!(
        "   ドリフト列: {}/{} (割合 {:.2} ≥ {})",
        drift.number_of_drifted_columns,
        drift.number_of_columns,
        drift.share_of_drifted_columns,
        drift.drift_share
    );
    for col in drift.columns.iter().filter(|c| c.drift_detected) {
        eprintln!("   - {}", col.column);
    }
    eprintln!("==================================================");
}
