use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptScanError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("Gemini APIキーが設定されていません。`receipt-scan config --set-gemini-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("ログイン情報がありません。`receipt-scan login` でログインしてください")]
    NotSignedIn,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("カメラが使用できません: {0}")]
    CameraUnavailable(String),

    #[error("画像の取得に失敗: {0}")]
    AcquisitionFailed(String),

    #[error("APIエラー ({context}): ステータス {status}")]
    ApiStatus { status: u16, context: String },

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] receipt_scan_common::Error),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error("この操作はできません: {action}（現在の状態: {step}）")]
    InvalidTransition { step: String, action: String },
}

pub type Result<T> = std::result::Result<T, ReceiptScanError>;
