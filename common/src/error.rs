//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// 手動補正で存在しないコンテナ名が指定された
    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    /// 手動補正で存在しない行番号が指定された
    #[error("Unknown row: {0}")]
    UnknownRow(u32),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
