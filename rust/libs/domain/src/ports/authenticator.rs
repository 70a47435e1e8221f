use async_trait::async_trait;

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, provided_secret: Option<&str>) -> bool;
}
