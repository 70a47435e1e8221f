use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::{
    error::DomainError,
    model::{Canvas, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, OutputFormat, ProviderConfig},
    ports::{ImageTransformer, PoolDirectory, RemoteFetcher},
    service::{
        FitPolicy, ImageSource, LocalPoolSource, RemoteRandomSource, SourceKind, SourceSelection,
    },
    usecase::{DEFAULT_MAX_ATTEMPTS, ImageAcquisition},
};

/// ランダム画像リクエスト。未指定の項目は設定値・ソースごとの既定値を使う
#[derive(Clone, Debug, Default)]
pub struct RandomImageRequest {
    pub source: Option<SourceSelection>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<OutputFormat>,
    pub crop: Option<bool>,
    pub padding: Option<u32>,
    pub deadline: Option<Instant>,
}

#[derive(Clone, Debug)]
pub struct RenderedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub source: SourceKind,
}

#[derive(Clone, Copy, Debug)]
pub struct RandomImageSettings {
    pub default_source: SourceSelection,
    pub max_attempts: usize,
    pub remote_policy: FitPolicy,
}

impl Default for RandomImageSettings {
    fn default() -> Self {
        Self {
            default_source: SourceSelection::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            remote_policy: FitPolicy::default(),
        }
    }
}

#[async_trait]
pub trait RandomImageUseCase: Send + Sync {
    async fn random_image(&self, request: RandomImageRequest)
    -> Result<RenderedImage, DomainError>;
}

pub struct RandomImageUseCaseImpl<F, P, T>
where
    F: RemoteFetcher,
    P: PoolDirectory,
    T: ImageTransformer,
{
    fetcher: Arc<F>,
    pool: Arc<P>,
    transformer: T,
    config: ProviderConfig,
    settings: RandomImageSettings,
}

impl<F, P, T> RandomImageUseCaseImpl<F, P, T>
where
    F: RemoteFetcher,
    P: PoolDirectory,
    T: ImageTransformer,
{
    pub fn new(
        fetcher: Arc<F>,
        pool: Arc<P>,
        transformer: T,
        config: ProviderConfig,
        settings: RandomImageSettings,
    ) -> Self {
        Self {
            fetcher,
            pool,
            transformer,
            config,
            settings,
        }
    }

    fn source(&self, kind: SourceKind) -> ImageSource<F, P> {
        match kind {
            SourceKind::Remote => ImageSource::Remote(RemoteRandomSource::new(
                self.fetcher.clone(),
                &self.config.catalog_url,
            )),
            SourceKind::LocalPool => {
                ImageSource::LocalPool(LocalPoolSource::new(self.pool.clone()))
            }
        }
    }

    /// ローカルプールは利用者が選んだ画像なので比率では弾かない
    fn policy(&self, kind: SourceKind) -> FitPolicy {
        match kind {
            SourceKind::Remote => self.settings.remote_policy,
            SourceKind::LocalPool => FitPolicy::unrestricted(),
        }
    }

    fn canvas(&self, kind: SourceKind, request: &RandomImageRequest) -> Result<Canvas, DomainError> {
        let profile = kind.transform_profile();
        Canvas::new(
            request.width.unwrap_or(DEFAULT_CANVAS_WIDTH),
            request.height.unwrap_or(DEFAULT_CANVAS_HEIGHT),
            request.format.unwrap_or_default(),
            request.crop.unwrap_or(profile.crop),
            request.padding.unwrap_or(profile.padding),
        )
        .map_err(|e| DomainError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl<F, P, T> RandomImageUseCase for RandomImageUseCaseImpl<F, P, T>
where
    F: RemoteFetcher,
    P: PoolDirectory,
    T: ImageTransformer,
{
    async fn random_image(
        &self,
        request: RandomImageRequest,
    ) -> Result<RenderedImage, DomainError> {
        let kind = request
            .source
            .unwrap_or(self.settings.default_source)
            .resolve();
        let canvas = self.canvas(kind, &request)?;
        debug!("画像ソース {} からキャンバス {:?} を作成します", kind, canvas);

        let acquisition = ImageAcquisition::new(self.policy(kind), self.settings.max_attempts);
        let source = self.source(kind);
        let candidate = acquisition.acquire(&source, request.deadline).await?;

        let data = match self
            .transformer
            .transform(candidate.into_data(), &canvas)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                error!("画像の変換に失敗しました: {}", e);
                return Err(DomainError::Unavailable(format!("画像の変換に失敗: {}", e)));
            }
        };

        info!(
            "画像を生成しました: source={}, {}x{} {}, {} bytes",
            kind,
            canvas.width(),
            canvas.height(),
            canvas.format(),
            data.len()
        );
        Ok(RenderedImage {
            data,
            format: canvas.format(),
            source: kind,
        })
    }
}
