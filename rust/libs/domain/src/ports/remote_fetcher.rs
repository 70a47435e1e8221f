use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum RemoteFetcherError {
    #[error("URLの取得に失敗: {0}")]
    FetchError(String),

    #[error("予期しないステータスコード {status}: {url}")]
    StatusError { url: String, status: u16 },

    #[error("レスポンスの解析に失敗: {0}")]
    ParseError(String),
}

/// リモートのメタデータ・画像を取得するトランスポート
///
/// 2xx 以外のステータスは空のレスポンスではなくエラーとして返す。
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, RemoteFetcherError>;

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, RemoteFetcherError>;
}
