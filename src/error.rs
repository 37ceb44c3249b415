//! クレート共通のエラー型

use thiserror::Error;

use crate::api::FetchError;

/// トラッカー全体のエラー
#[derive(Error, Debug)]
pub enum TrackerError {
    /// プラットフォームAPIの取得失敗
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// 永続化層のエラー
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// ドキュメントのシリアライズ/デシリアライズ失敗
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 設定エラー（起動時のみ致命的）
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// 期待したフィールドが存在しない
    #[error("Missing field '{field}' in payload for '{id}'")]
    DataShape { id: String, field: String },

    /// ファイルI/O
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn data_shape(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::DataShape {
            id: id.into(),
            field: field.into(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
