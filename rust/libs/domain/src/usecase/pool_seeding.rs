use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use tracing::{error, info};
use url::Url;

use crate::{
    error::DomainError,
    model::CandidateImage,
    ports::{PoolDirectory, RemoteFetcher},
};

/// アップロードを受け付ける拡張子（大文字小文字を区別しない）
pub const ACCEPTED_UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub fn is_accepted_upload_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            ACCEPTED_UPLOAD_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// パス成分を取り除き、プールに保存できるファイル名にする
pub fn sanitize_file_name(name: &str) -> Result<String, DomainError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base.starts_with('.') {
        return Err(DomainError::InvalidRequest(format!(
            "不正なファイル名です: '{}'",
            name
        )));
    }
    Ok(base.to_string())
}

fn extension_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// URL の末尾から保存名を決める。拡張子が使えなければ実際の形式から補う
fn file_name_from_url(url: &Url, format: ImageFormat) -> Result<String, DomainError> {
    let extension = extension_for(format).ok_or_else(|| {
        DomainError::InvalidRequest(format!("受け付けない画像形式です: {:?}", format))
    })?;

    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && !segment.starts_with('.'));

    let name = match last_segment {
        Some(segment) if is_accepted_upload_name(segment) => segment.to_string(),
        Some(segment) => {
            let stem = Path::new(segment)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(segment);
            format!("{}.{}", stem, extension)
        }
        None => format!("fetched-{:08x}.{}", rand::random::<u32>(), extension),
    };
    sanitize_file_name(&name)
}

#[async_trait]
pub trait PoolSeedingUseCase: Send + Sync {
    async fn store_upload(&self, file_name: &str, data: Bytes) -> Result<String, DomainError>;

    async fn store_from_url(&self, url: &str) -> Result<String, DomainError>;
}

pub struct PoolSeedingUseCaseImpl<F, P>
where
    F: RemoteFetcher,
    P: PoolDirectory,
{
    fetcher: Arc<F>,
    pool: Arc<P>,
}

impl<F, P> PoolSeedingUseCaseImpl<F, P>
where
    F: RemoteFetcher,
    P: PoolDirectory,
{
    pub fn new(fetcher: Arc<F>, pool: Arc<P>) -> Self {
        Self { fetcher, pool }
    }

    async fn store(&self, name: &str, data: Bytes) -> Result<(), DomainError> {
        self.pool.store_entry(name, data).await.map_err(|e| {
            error!("画像プールへの保存に失敗しました: {}", e);
            DomainError::StoreFailed(e.to_string())
        })
    }
}

#[async_trait]
impl<F, P> PoolSeedingUseCase for PoolSeedingUseCaseImpl<F, P>
where
    F: RemoteFetcher,
    P: PoolDirectory,
{
    async fn store_upload(&self, file_name: &str, data: Bytes) -> Result<String, DomainError> {
        let name = sanitize_file_name(file_name)?;
        if !is_accepted_upload_name(&name) {
            return Err(DomainError::InvalidRequest(format!(
                "受け付けない拡張子です: '{}'",
                name
            )));
        }
        CandidateImage::from_bytes(data.clone())
            .map_err(|e| DomainError::InvalidRequest(format!("画像として読み込めません: {}", e)))?;

        self.store(&name, data).await?;
        info!("アップロード画像を保存しました: {}", name);
        Ok(name)
    }

    async fn store_from_url(&self, url: &str) -> Result<String, DomainError> {
        let parsed = Url::parse(url)
            .map_err(|e| DomainError::InvalidRequest(format!("不正なURLです: {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DomainError::InvalidRequest(format!(
                "未対応のスキームです: {}",
                parsed.scheme()
            )));
        }

        let data = self.fetcher.fetch_bytes(parsed.as_str()).await.map_err(|e| {
            error!("画像の取得に失敗しました: url={}, error={}", url, e);
            DomainError::FetchFailed(e.to_string())
        })?;
        let candidate = CandidateImage::from_bytes(data)
            .map_err(|e| DomainError::InvalidRequest(format!("画像として読み込めません: {}", e)))?;

        let name = file_name_from_url(&parsed, candidate.format())?;
        self.store(&name, candidate.into_data()).await?;
        info!("URLから画像を保存しました: url={}, name={}", url, name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PoolDirectoryError, RemoteFetcherError};
    use std::{collections::HashMap, sync::Mutex};
    use test_util::encode_test_image;

    struct MockRemoteFetcher {
        bytes: HashMap<String, Result<Bytes, RemoteFetcherError>>,
    }

    #[async_trait]
    impl RemoteFetcher for MockRemoteFetcher {
        async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, RemoteFetcherError> {
            Err(RemoteFetcherError::FetchError(url.to_string()))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Bytes, RemoteFetcherError> {
            self.bytes.get(url).cloned().unwrap_or(Err(RemoteFetcherError::StatusError {
                url: url.to_string(),
                status: 404,
            }))
        }
    }

    #[derive(Default)]
    struct MockPool {
        stored: Mutex<HashMap<String, Bytes>>,
    }

    #[async_trait]
    impl PoolDirectory for MockPool {
        async fn list_entries(&self) -> Result<Vec<String>, PoolDirectoryError> {
            Ok(self.stored.lock().unwrap().keys().cloned().collect())
        }

        async fn read_entry(&self, name: &str) -> Result<Bytes, PoolDirectoryError> {
            Err(PoolDirectoryError::ReadError {
                name: name.to_string(),
                message: "未使用".to_string(),
            })
        }

        async fn store_entry(&self, name: &str, data: Bytes) -> Result<(), PoolDirectoryError> {
            self.stored.lock().unwrap().insert(name.to_string(), data);
            Ok(())
        }
    }

    fn usecase(
        responses: Vec<(&str, Bytes)>,
    ) -> (
        PoolSeedingUseCaseImpl<MockRemoteFetcher, MockPool>,
        Arc<MockPool>,
    ) {
        let fetcher = MockRemoteFetcher {
            bytes: responses
                .into_iter()
                .map(|(url, data)| (url.to_string(), Ok(data)))
                .collect(),
        };
        let pool = Arc::new(MockPool::default());
        (
            PoolSeedingUseCaseImpl::new(Arc::new(fetcher), pool.clone()),
            pool,
        )
    }

    #[test]
    fn test_is_accepted_upload_name() {
        assert!(is_accepted_upload_name("cat.jpg"));
        assert!(is_accepted_upload_name("cat.JPEG"));
        assert!(is_accepted_upload_name("cat.Png"));
        assert!(is_accepted_upload_name("anim.gif"));
        assert!(is_accepted_upload_name("photo.webp"));
        assert!(!is_accepted_upload_name("photo.bmp"));
        assert!(!is_accepted_upload_name("photo"));
        assert!(!is_accepted_upload_name("archive.png.zip"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_file_name("../../etc/cat.png").unwrap(), "cat.png");
        assert_eq!(sanitize_file_name("C:\\photos\\cat.png").unwrap(), "cat.png");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name(".hidden.png").is_err());
    }

    #[tokio::test]
    async fn test_store_upload() {
        let (usecase, pool) = usecase(vec![]);
        let png = Bytes::from(encode_test_image(10, 10, ImageFormat::Png));

        let name = usecase.store_upload("uploads/Cat.PNG", png.clone()).await.unwrap();

        assert_eq!(name, "Cat.PNG");
        assert_eq!(pool.stored.lock().unwrap().get("Cat.PNG"), Some(&png));
    }

    #[tokio::test]
    async fn test_store_upload_rejects_extension() {
        let (usecase, pool) = usecase(vec![]);
        let png = Bytes::from(encode_test_image(10, 10, ImageFormat::Png));

        let result = usecase.store_upload("cat.bmp", png).await;

        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
        assert!(pool.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_upload_rejects_non_image() {
        let (usecase, pool) = usecase(vec![]);

        let result = usecase
            .store_upload("cat.png", Bytes::from_static(b"plain text"))
            .await;

        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
        assert!(pool.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_from_url() {
        let jpeg = Bytes::from(encode_test_image(10, 10, ImageFormat::Jpeg));
        let (usecase, pool) = usecase(vec![("https://img.test/comics/barrel.jpg", jpeg.clone())]);

        let name = usecase
            .store_from_url("https://img.test/comics/barrel.jpg")
            .await
            .unwrap();

        assert_eq!(name, "barrel.jpg");
        assert_eq!(pool.stored.lock().unwrap().get("barrel.jpg"), Some(&jpeg));
    }

    #[tokio::test]
    async fn test_store_from_url_fixes_extension() {
        let png = Bytes::from(encode_test_image(10, 10, ImageFormat::Png));
        let (usecase, _pool) = usecase(vec![("https://img.test/render?id=3", png)]);

        let name = usecase
            .store_from_url("https://img.test/render?id=3")
            .await
            .unwrap();

        assert_eq!(name, "render.png");
    }

    #[tokio::test]
    async fn test_store_from_url_without_path() {
        let png = Bytes::from(encode_test_image(10, 10, ImageFormat::Png));
        let (usecase, _pool) = usecase(vec![("https://img.test/", png)]);

        let name = usecase.store_from_url("https://img.test/").await.unwrap();

        assert!(name.starts_with("fetched-"), "想定外の名前: {}", name);
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_store_from_url_errors() {
        let (usecase, pool) = usecase(vec![(
            "https://img.test/page.html",
            Bytes::from_static(b"<html></html>"),
        )]);

        assert!(matches!(
            usecase.store_from_url("not a url").await,
            Err(DomainError::InvalidRequest(_))
        ));
        assert!(matches!(
            usecase.store_from_url("ftp://img.test/a.png").await,
            Err(DomainError::InvalidRequest(_))
        ));
        assert!(matches!(
            usecase.store_from_url("https://img.test/missing.png").await,
            Err(DomainError::FetchFailed(_))
        ));
        assert!(matches!(
            usecase.store_from_url("https://img.test/page.html").await,
            Err(DomainError::InvalidRequest(_))
        ));
        assert!(pool.stored.lock().unwrap().is_empty());
    }
}
