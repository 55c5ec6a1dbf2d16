//! 検出器出力パーサー
//!
//! 外部の推論コマンドの標準出力からJSON配列を抽出し、
//! 検出結果としてパースする

use crate::error::{Error, Result};
use crate::prediction::Detection;

/// 出力からJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の [...] 配列
/// 3. エラー
///
/// 推論ライブラリが進捗ログを標準出力に混ぜてくることがあるため、前後のテキストは捨てる。
///
/// # Examples
/// ```
/// use taco_sort_common::extract_json;
///
/// let output = "loading weights...\n[{\"key\": \"value\"}]\n";
/// let json = extract_json(output).unwrap();
/// assert!(json.starts_with('['));
/// ```
pub fn extract_json(output: &str) -> Result<&str> {
    if let Some(start_marker) = output.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = output[start..].find("```") {
            let end = start + end_offset;
            return Ok(output[start..end].trim());
        }
    }

    if let Some(start) = output.find('[') {
        if let Some(end) = output.rfind(']') {
            if end >= start {
                return Ok(&output[start..=end]);
            }
        }
    }

    Err(Error::Parse("no JSON array found in detector output".into()))
}

/// 検出結果をパース
///
/// # Arguments
/// * `output` - 推論コマンドの標準出力
///
/// # Returns
/// * `Ok(Vec<Detection>)` - パース成功（0件も含む）
/// * `Err` - JSONが見つからないかパース失敗
pub fn parse_detections(output: &str) -> Result<Vec<Detection>> {
    let json_str = extract_json(output)?;
    let detections: Vec<Detection> = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("detections JSON: {}", e)))?;
    Ok(detections)
}
