use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum PoolDirectoryError {
    #[error("画像プールの一覧取得に失敗: {0}")]
    ListError(String),

    #[error("画像プールのファイル '{name}' の読み込みに失敗: {message}")]
    ReadError { name: String, message: String },

    #[error("画像プールへのファイル '{name}' の書き込みに失敗: {message}")]
    WriteError { name: String, message: String },

    #[error("不正なファイル名です: {0}")]
    InvalidName(String),
}

/// フラットなディレクトリで構成される画像プール
#[async_trait]
pub trait PoolDirectory: Send + Sync {
    /// 直下のエントリ名を返す（再帰しない）
    async fn list_entries(&self) -> Result<Vec<String>, PoolDirectoryError>;

    async fn read_entry(&self, name: &str) -> Result<Bytes, PoolDirectoryError>;

    async fn store_entry(&self, name: &str, data: Bytes) -> Result<(), PoolDirectoryError>;
}
