use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::model::Canvas;

#[derive(Clone, Debug, Error)]
pub enum ImageTransformError {
    #[error("画像のデコードに失敗: {0}")]
    DecodeError(String),

    #[error("画像のエンコードに失敗: {0}")]
    EncodeError(String),

    #[error("変換タスクが中断されました: {0}")]
    TaskError(String),
}

#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(
        &self,
        image_data: Bytes,
        canvas: &Canvas,
    ) -> Result<Vec<u8>, ImageTransformError>;
}
