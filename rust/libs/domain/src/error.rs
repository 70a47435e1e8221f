use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("画像を用意できませんでした: {0}")]
    Unavailable(String),

    #[error("不正なリクエスト: {0}")]
    InvalidRequest(String),

    #[error("画像の取得に失敗: {0}")]
    FetchFailed(String),

    #[error("画像プールへの保存に失敗: {0}")]
    StoreFailed(String),
}
