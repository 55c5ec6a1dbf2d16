//! ドリフトレポート出力
//!
//! 単体で開けるHTMLと、同名の `.json`（機械可読）を並べて書き出す。

use super::drift::{ColumnDrift, DatasetDrift};
use crate::error::Result;
use crate::fs_util::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: String,
    pub reference_path: String,
    pub current_path: String,
    pub reference_rows: usize,
    pub current_rows: usize,
    /// 読み込み時にスキップした行数（参照 + 現行）
    pub skipped_lines: usize,
    pub drift: DatasetDrift,
}

impl DriftReport {
    pub fn new(
        reference_path: &Path,
        current_path: &Path,
        reference_rows: usize,
        current_rows: usize,
        skipped_lines: usize,
        drift: DatasetDrift,
    ) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            reference_path: reference_path.display().to_string(),
            current_path: current_path.display().to_string(),
            reference_rows,
            current_rows,
            skipped_lines,
            drift,
        }
    }

    pub fn drift_detected(&self) -> bool {
        self.drift.dataset_drift
    }

    pub fn to_html(&self) -> String {
        build_html(self)
    }
}

/// HTMLと同じ場所に置くJSONのパス
///
/// レポートパス自体が `.json` のときは `<名前>.report.json` にしてHTMLを上書きしない。
pub fn json_path_for(html_path: &Path) -> PathBuf {
    let is_json = html_path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        html_path.with_extension("report.json")
    } else {
        html_path.with_extension("json")
    }
}

/// レポートを保存（HTML, JSON）
pub fn save_report(report: &DriftReport, html_path: &Path) -> Result<PathBuf> {
    write_atomic(html_path, report.to_html().as_bytes())?;

    let json_path = json_path_for(html_path);
    let json = serde_json::to_string_pretty(report)?;
    write_atomic(&json_path, json.as_bytes())?;

    Ok(json_path)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin-top:1em}\
th,td{border:1px solid #ccc;padding:4px 10px;text-align:right}\
th:first-child,td:first-child{text-align:left}\
.drift{background:#fde2e2}.ok{background:#e3f6e3}\
.verdict{font-size:1.3em;font-weight:bold;padding:8px}";

fn column_rows(html: &mut String, columns: &[&ColumnDrift]) {
    for col in columns {
        let class = if col.drift_detected { "drift" } else { "ok" };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{:.4}</td><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{}</td></tr>\n",
            class,
            escape_html(&col.column),
            escape_html(&col.stattest.to_string()),
            col.score,
            col.threshold,
            col.reference_mean,
            col.current_mean,
            if col.drift_detected { "Detected" } else { "Not detected" },
        ));
    }
}

fn table_header(html: &mut String) {
    html.push_str("<table>\n<tr><th>Column</th><th>Stat test</th><th>Score</th><th>Threshold</th>");
    html.push_str("<th>Reference mean</th><th>Current mean</th><th>Drift</th></tr>\n");
}

fn build_html(report: &DriftReport) -> String {
    let drift = &report.drift;

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Drift Report</title>\n");
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str("<h1>Data Drift Report</h1>\n");
    html.push_str(&format!(
        "<p>生成日時: {}<br>参照: {} ({}行)<br>現行: {} ({}行)<br>スキップ行: {}</p>\n",
        escape_html(&report.generated_at),
        escape_html(&report.reference_path),
        report.reference_rows,
        escape_html(&report.current_path),
        report.current_rows,
        report.skipped_lines,
    ));

    let (class, verdict) = if drift.dataset_drift {
        ("drift", "Dataset drift detected")
    } else {
        ("ok", "No dataset drift")
    };
    html.push_str(&format!(
        "<div class=\"verdict {}\">{}: {}/{} columns drifted (share {:.2}, threshold {})</div>\n",
        class,
        verdict,
        drift.number_of_drifted_columns,
        drift.number_of_columns,
        drift.share_of_drifted_columns,
        drift.drift_share,
    ));

    html.push_str("<h2>Primary columns</h2>\n");
    table_header(&mut html);
    column_rows(&mut html, &drift.primary_columns());
    html.push_str("</table>\n");

    html.push_str("<h2>All columns</h2>\n");
    table_header(&mut html);
    let all: Vec<&ColumnDrift> = drift.columns.iter().collect();
    column_rows(&mut html, &all);
    html.push_str("</table>\n</body>\n</html>\n");

    html
}
