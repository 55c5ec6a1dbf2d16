use thiserror::Error;

#[derive(Error, Debug)]
pub enum TacoSortError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("入力データが不正: {0}")]
    MalformedInput(String),

    #[error("座標が不正: {0}")]
    InvalidGeometry(String),

    #[error("元画像が見つかりません: {0}")]
    MissingSourceAsset(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("検出器の実行エラー: {0}")]
    Detector(String),

    #[error("検出器出力のパースに失敗: {0}")]
    DetectorParse(String),

    #[error("データ不足: {0}")]
    InsufficientData(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML解析エラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("メトリクスエラー: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] taco_sort_common::Error),
}

pub type Result<T> = std::result::Result<T, TacoSortError>;
