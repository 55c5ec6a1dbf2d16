use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taco-sort")]
#[command(about = "ゴミ分別検出モデルのデータセット準備・推論API・ドリフト監視ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// データディレクトリ（設定ファイルの data_dir より優先）
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// COCO変換→学習/検証分割→dataset.yaml を一括実行
    Prepare {
        /// COCOアノテーションJSON（デフォルト: data/raw/annotations.json）
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// 元画像フォルダ（デフォルト: data/raw）
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// 出力先（デフォルト: data/prepared）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 検証データの比率 (0〜1)
        #[arg(long)]
        val_ratio: Option<f64>,

        /// 分割の乱数シード
        #[arg(long)]
        seed: Option<u64>,

        /// 前回の分割結果を消さずに残す
        #[arg(long)]
        keep_existing: bool,
    },

    /// COCOアノテーションをYOLOラベルに変換
    Convert {
        /// COCOアノテーションJSON
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// ラベル出力先（デフォルト: data/raw/labels）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 変換済みラベルと画像を学習/検証に分割
    Split {
        /// COCOアノテーションJSON（画像一覧の取得に使用）
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// 元画像フォルダ
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// 変換済みラベルフォルダ
        #[arg(long)]
        labels: Option<PathBuf>,

        /// 出力先
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 検証データの比率 (0〜1)
        #[arg(long)]
        val_ratio: Option<f64>,

        /// 分割の乱数シード
        #[arg(long)]
        seed: Option<u64>,

        /// 前回の分割結果を消さずに残す
        #[arg(long)]
        keep_existing: bool,
    },

    /// 検証用画像にラベルを描画して目視確認
    Verify {
        /// 分割済みデータセット（デフォルト: data/prepared）
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// 描画する枚数
        #[arg(short, long, default_value_t = crate::verify::DEFAULT_VERIFY_COUNT)]
        count: usize,

        /// 画像選択の乱数シード（省略時は毎回ランダム）
        #[arg(long)]
        seed: Option<u64>,

        /// 出力先（デフォルト: data/verification_output）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// クラス名描画用のフォント（TTF/OTF）
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// 検証用画像を推論して参照データを作成
    Reference {
        /// 画像フォルダ（デフォルト: data/prepared/images/val）
        #[arg(long)]
        images: Option<PathBuf>,

        /// 出力JSONL（デフォルト: data/reference_data.jsonl）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 信頼度しきい値
        #[arg(long)]
        conf: Option<f64>,

        /// NMSのIoUしきい値
        #[arg(long)]
        iou: Option<f64>,
    },

    /// 推論APIを起動
    Serve {
        /// 待ち受けアドレス（デフォルト: 0.0.0.0:8000）
        #[arg(short, long)]
        bind: Option<String>,

        /// 予測ログ（デフォルト: data/logs/prediction_logs.jsonl）
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// 参照データと予測ログを比較してドリフトを検出
    Monitor {
        /// 参照データ（デフォルト: data/reference_data.jsonl）
        #[arg(long)]
        reference: Option<PathBuf>,

        /// 予測ログ（デフォルト: data/logs/prediction_logs.jsonl）
        #[arg(long)]
        current: Option<PathBuf>,

        /// HTMLレポート（デフォルト: data/reports/drift_report.html）
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 検出器コマンドを設定（例: "python predict.py --weights best.pt"）
        #[arg(long)]
        set_detector: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::DEFAULT_VERIFY_COUNT;

    #[test]
    fn test_verify_count_default() {
        let cli = Cli::try_parse_from(["taco-sort", "verify"]).unwrap();
        let Commands::Verify { count, .. } = cli.command else {
            panic!("verify のはず");
        };
        assert_eq!(count, DEFAULT_VERIFY_COUNT);

        let cli = Cli::try_parse_from(["taco-sort", "verify", "-c", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Verify { count: 2, .. }));
    }
}
