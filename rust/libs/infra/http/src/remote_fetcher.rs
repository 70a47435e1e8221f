use async_trait::async_trait;
use bytes::Bytes;
use domain::ports::{RemoteFetcher, RemoteFetcherError};
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const USER_AGENT: &str = concat!("ink/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP クライアントの構築に失敗: {0}")]
    BuildError(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct ReqwestRemoteFetcher {
    client: Client,
}

impl ReqwestRemoteFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Response, RemoteFetcherError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            error!("URLの取得に失敗: {:?}", e);
            RemoteFetcherError::FetchError(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("予期しないステータスコード: {} {}", status, url);
            return Err(RemoteFetcherError::StatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteFetcher for ReqwestRemoteFetcher {
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, RemoteFetcherError> {
        self.get(url)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RemoteFetcherError::ParseError(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, RemoteFetcherError> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| RemoteFetcherError::FetchError(e.to_string()))
    }
}
