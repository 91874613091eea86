use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("環境変数 {0} が設定されていません")]
    MissingEnv(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("入力レポートが不正: {0}")]
    InvalidReport(String),

    #[error("HTTP {status} ({url}): {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("通信エラー: {0}")]
    Network(String),

    #[error("画像変換エラー: {0}")]
    ImageDecode(String),

    #[error("キャリブレーション実行エラー: {0}")]
    Sweep(String),

    #[error("キャリブレーションが {0} 秒でタイムアウトしました")]
    SweepTimeout(u64),

    #[error("合意候補がありません: {0}")]
    NoConsensus(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] gelato_calib_common::Error),
}

impl CalibError {
    /// 再試行で回復しうるエラーか
    pub fn is_transient(&self) -> bool {
        match self {
            CalibError::Network(_) => true,
            CalibError::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// プロファイル単位の失敗理由コード（レポートの `reason`）
    pub fn reason_code(&self) -> &'static str {
        match self {
            CalibError::Http { .. } | CalibError::Network(_) => "image_fetch_failed",
            CalibError::ImageDecode(_) => "image_decode_failed",
            CalibError::Sweep(_) => "sweep_failed",
            CalibError::SweepTimeout(_) => "sweep_timeout",
            CalibError::NoConsensus(_) => "no_consensus",
            CalibError::Io(_) => "io_error",
            _ => "error",
        }
    }
}

impl From<reqwest::Error> for CalibError {
    fn from(e: reqwest::Error) -> Self {
        CalibError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CalibError>;
