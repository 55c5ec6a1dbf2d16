//! 外部コマンド検出器
//!
//! 学習ツール側の推論スクリプトを子プロセスで実行し、
//! 標準出力のJSON配列を検出結果として受け取る。
//!
//! 呼び出し形式: `<command...> --image <path> --conf <c> --iou <i>`

use super::{DetectParams, Detector};
use crate::error::{Result, TacoSortError};
use std::path::Path;
use std::process::Command;
use taco_sort_common::{parse_detections, Detection};

pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    display_name: String,
}

impl CommandDetector {
    /// コマンド（プログラム + 固定引数）から作成
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TacoSortError::Config("検出器コマンドが設定されていません".into()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            display_name: command.join(" "),
        })
    }

    fn run(&self, image: &Path, params: &DetectParams) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--image")
            .arg(image)
            .arg("--conf")
            .arg(params.confidence.to_string())
            .arg("--iou")
            .arg(params.iou.to_string())
            .output()
            .map_err(|e| TacoSortError::Detector(format!("{} を実行できません: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TacoSortError::Detector(format!(
                "{} failed (code {:?}): {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        log::debug!(
            "検出器出力: {}",
            stdout.chars().take(500).collect::<String>()
        );
        Ok(stdout)
    }
}

impl Detector for CommandDetector {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn detect(&self, image: &Path, params: &DetectParams) -> Result<Vec<Detection>> {
        params.validate()?;
        let stdout = self.run(image, params)?;
        parse_detections(&stdout).map_err(|e| TacoSortError::DetectorParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(CommandDetector::new(&[]), Err(TacoSortError::Config(_))));
    }

    #[test]
    fn test_name_is_full_command() {
        let d = CommandDetector::new(&["python".into(), "predict.py".into()]).unwrap();
        assert_eq!(d.name(), "python predict.py");
    }

    #[test]
    fn test_missing_program_is_detector_error() {
        let d = CommandDetector::new(&["/nonexistent/taco-detector-12345".into()]).unwrap();
        let err = d.detect(Path::new("x.jpg"), &DetectParams::default()).unwrap_err();
        assert!(matches!(err, TacoSortError::Detector(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_parses_stdout_of_command() {
        // sh -c '<script>' sh --image ... の形で固定出力を返す
        let script = r#"echo 'loading'; echo '[{"x1":1,"y1":2,"x2":3,"y2":4,"confidence":0.9,"class_name":"Can"}]'"#;
        let d = CommandDetector::new(&["sh".into(), "-c".into(), script.into(), "sh".into()]).unwrap();
        let dets = d.detect(Path::new("x.jpg"), &DetectParams::default()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "Can");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_error() {
        let d = CommandDetector::new(&["sh".into(), "-c".into(), "echo boom >&2; exit 3".into(), "sh".into()]).unwrap();
        let err = d.detect(Path::new("x.jpg"), &DetectParams::default()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
