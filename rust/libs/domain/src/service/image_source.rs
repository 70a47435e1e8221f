use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use rand::{Rng, seq::IndexedRandom};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    model::CandidateImage,
    ports::{PoolDirectory, RemoteFetcher},
};

#[derive(Clone, Debug, Error)]
pub enum ImageSourceError {
    #[error("画像ソースに候補がありません")]
    NotAvailable,

    #[error("候補画像の取得に失敗: {0}")]
    FetchError(String),

    #[error("候補画像のデコードに失敗: {0}")]
    DecodeError(String),
}

/// 候補画像を1枚取得する能力
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidate(&self) -> Result<CandidateImage, ImageSourceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Remote,
    LocalPool,
}

/// ソース種別ごとの変換設定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformProfile {
    pub crop: bool,
    pub padding: u32,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Remote, SourceKind::LocalPool];

    pub fn transform_profile(self) -> TransformProfile {
        match self {
            // 漫画は切り抜くとコマが欠けるため余白付きで収める
            SourceKind::Remote => TransformProfile {
                crop: false,
                padding: 5,
            },
            SourceKind::LocalPool => TransformProfile {
                crop: true,
                padding: 0,
            },
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Remote => f.write_str("remote"),
            SourceKind::LocalPool => f.write_str("local"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceSelection {
    Fixed(SourceKind),
    Random,
}

impl SourceSelection {
    pub fn resolve(self) -> SourceKind {
        match self {
            SourceSelection::Fixed(kind) => kind,
            SourceSelection::Random => {
                SourceKind::ALL[rand::rng().random_range(0..SourceKind::ALL.len())]
            }
        }
    }
}

impl Default for SourceSelection {
    fn default() -> Self {
        SourceSelection::Fixed(SourceKind::Remote)
    }
}

impl FromStr for SourceSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "xkcd" => Ok(SourceSelection::Fixed(SourceKind::Remote)),
            "local" | "pool" => Ok(SourceSelection::Fixed(SourceKind::LocalPool)),
            "random" => Ok(SourceSelection::Random),
            _ => Err(format!("不明な画像ソースです: {}", s)),
        }
    }
}

/// リモートカタログからランダムな1件を取得する
pub struct RemoteRandomSource<F> {
    fetcher: Arc<F>,
    catalog_url: String,
}

impl<F> RemoteRandomSource<F>
where
    F: RemoteFetcher,
{
    pub fn new(fetcher: Arc<F>, catalog_url: &str) -> Self {
        Self {
            fetcher,
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
        }
    }

    async fn latest_number(&self) -> Result<u64, ImageSourceError> {
        let url = format!("{}/info.0.json", self.catalog_url);
        let metadata = self
            .fetcher
            .fetch_json(&url)
            .await
            .map_err(|e| ImageSourceError::FetchError(e.to_string()))?;
        metadata
            .get("num")
            .and_then(|num| num.as_u64())
            .ok_or_else(|| {
                ImageSourceError::FetchError(format!("'num' がメタデータにありません: {}", url))
            })
    }

    async fn image_url(&self, number: u64) -> Result<String, ImageSourceError> {
        let url = format!("{}/{}/info.0.json", self.catalog_url, number);
        let metadata = self
            .fetcher
            .fetch_json(&url)
            .await
            .map_err(|e| ImageSourceError::FetchError(e.to_string()))?;
        metadata
            .get("img")
            .and_then(|img| img.as_str())
            .filter(|img| !img.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ImageSourceError::FetchError(format!("'img' がメタデータにありません: {}", url))
            })
    }
}

/// `[1, upper)` から一様に選ぶ
fn pick_number(upper: u64) -> Result<u64, ImageSourceError> {
    if upper <= 1 {
        return Err(ImageSourceError::FetchError(format!(
            "カタログの上限値が不正です: {}",
            upper
        )));
    }
    Ok(rand::rng().random_range(1..upper))
}

#[async_trait]
impl<F> CandidateSource for RemoteRandomSource<F>
where
    F: RemoteFetcher,
{
    async fn fetch_candidate(&self) -> Result<CandidateImage, ImageSourceError> {
        let upper = self.latest_number().await?;
        let number = pick_number(upper)?;
        info!("カタログ No.{} を取得します", number);

        let image_url = self.image_url(number).await?;
        let data = self
            .fetcher
            .fetch_bytes(&image_url)
            .await
            .map_err(|e| ImageSourceError::FetchError(e.to_string()))?;
        debug!("画像をダウンロードしました: url={}, size={}", image_url, data.len());

        CandidateImage::from_bytes(data).map_err(|e| ImageSourceError::DecodeError(e.to_string()))
    }
}

/// ローカルの画像プールからランダムな1枚を取得する
pub struct LocalPoolSource<P> {
    pool: Arc<P>,
}

impl<P> LocalPoolSource<P>
where
    P: PoolDirectory,
{
    pub fn new(pool: Arc<P>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl<P> CandidateSource for LocalPoolSource<P>
where
    P: PoolDirectory,
{
    async fn fetch_candidate(&self) -> Result<CandidateImage, ImageSourceError> {
        let entries = self
            .pool
            .list_entries()
            .await
            .map_err(|e| ImageSourceError::FetchError(e.to_string()))?;
        let name = entries
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(ImageSourceError::NotAvailable)?;
        info!("画像プールから '{}' を選択しました ({}件中)", name, entries.len());

        let data = self
            .pool
            .read_entry(&name)
            .await
            .map_err(|e| ImageSourceError::FetchError(e.to_string()))?;

        CandidateImage::from_bytes(data).map_err(|e| ImageSourceError::DecodeError(e.to_string()))
    }
}

/// 画像ソースの各実装を1つの能力の下にまとめる
pub enum ImageSource<F, P> {
    Remote(RemoteRandomSource<F>),
    LocalPool(LocalPoolSource<P>),
}

impl<F, P> ImageSource<F, P>
where
    F: RemoteFetcher,
    P: PoolDirectory,
{
    pub fn kind(&self) -> SourceKind {
        match self {
            ImageSource::Remote(_) => SourceKind::Remote,
            ImageSource::LocalPool(_) => SourceKind::LocalPool,
        }
    }
}

#[async_trait]
impl<F, P> CandidateSource for ImageSource<F, P>
where
    F: RemoteFetcher,
    P: PoolDirectory,
{
    async fn fetch_candidate(&self) -> Result<CandidateImage, ImageSourceError> {
        match self {
            ImageSource::Remote(source) => source.fetch_candidate().await,
            ImageSource::LocalPool(source) => source.fetch_candidate().await,
        }
    }
}
