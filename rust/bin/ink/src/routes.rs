use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::{BufMut, Bytes};
use domain::{
    error::DomainError,
    model::OutputFormat,
    ports::Authenticator,
    service::SourceSelection,
    usecase::{PoolSeedingUseCase, RandomImageRequest, RandomImageUseCase},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{Instrument, Span, error, info, info_span, warn};
use warp::{
    Filter, Rejection, Reply,
    http::{StatusCode, header},
    multipart::FormData,
    reply::Response,
};

const FETCH_FAILED: &str = "image fetch failed";
const UNAUTHORIZED: &str = "Unauthorized";

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct AppState {
    pub random_image: Arc<dyn RandomImageUseCase>,
    pub pool_seeding: Arc<dyn PoolSeedingUseCase>,
    pub authenticator: Arc<dyn Authenticator>,
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    secret: Option<String>,
    width: Option<u32>,
    #[serde(alias = "heigth")]
    height: Option<u32>,
    format: Option<String>,
    source: Option<String>,
    crop: Option<bool>,
    padding: Option<u32>,
}

impl RandomQuery {
    fn into_request(self, deadline: Instant) -> Result<RandomImageRequest, String> {
        let format = self
            .format
            .as_deref()
            .map(str::parse::<OutputFormat>)
            .transpose()
            .map_err(|e| e.to_string())?;
        let source = self
            .source
            .as_deref()
            .map(str::parse::<SourceSelection>)
            .transpose()?;

        Ok(RandomImageRequest {
            source,
            width: self.width,
            height: self.height,
            format,
            crop: self.crop,
            padding: self.padding,
            deadline: Some(deadline),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SecretQuery {
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    secret: Option<String>,
    url: String,
}

#[derive(Debug, Serialize)]
struct StoredImage {
    name: String,
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let max_upload_bytes = state.max_upload_bytes;
    let with_state = warp::any().map(move || state.clone());

    let root = warp::path::end().and(warp::get()).map(handle_root);

    let random = warp::path!("random")
        .and(warp::get())
        .and(warp::query::<RandomQuery>())
        .and(with_state.clone())
        .and_then(handle_random);

    let upload = warp::path!("upload")
        .and(warp::post())
        .and(warp::query::<SecretQuery>())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_state.clone())
        .and_then(handle_upload);

    let fetch = warp::path!("fetch")
        .and(warp::post())
        .and(warp::query::<FetchQuery>())
        .and(with_state)
        .and_then(handle_fetch);

    root.or(random).or(upload).or(fetch)
}

fn request_span(route: &'static str) -> Span {
    info_span!(
        "request",
        id = REQUEST_ID.fetch_add(1, Ordering::Relaxed),
        route
    )
}

fn text_response(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(message.to_string(), status).into_response()
}

fn domain_error_response(e: DomainError) -> Response {
    match e {
        DomainError::InvalidRequest(message) => text_response(StatusCode::BAD_REQUEST, &message),
        DomainError::FetchFailed(message) => text_response(StatusCode::BAD_GATEWAY, &message),
        other @ (DomainError::StoreFailed(_) | DomainError::Unavailable(_)) => {
            text_response(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string())
        }
    }
}

fn stored_response(name: String) -> Response {
    warp::reply::with_status(warp::reply::json(&StoredImage { name }), StatusCode::CREATED)
        .into_response()
}

fn handle_root() -> &'static str {
    info!("/ へのリクエスト");
    "Use /random to return a random image."
}

async fn handle_random(query: RandomQuery, state: AppState) -> Result<Response, Infallible> {
    Ok(random_response(query, state)
        .instrument(request_span("/random"))
        .await)
}

async fn random_response(query: RandomQuery, state: AppState) -> Response {
    info!("/random へのリクエスト");
    if !state.authenticator.authenticate(query.secret.as_deref()).await {
        info!("/random への認証されていないリクエスト");
        return text_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED);
    }

    let deadline = Instant::now() + state.request_timeout;
    let request = match query.into_request(deadline) {
        Ok(request) => request,
        Err(message) => return text_response(StatusCode::BAD_REQUEST, &message),
    };

    match tokio::time::timeout_at(deadline, state.random_image.random_image(request)).await {
        Ok(Ok(rendered)) => {
            let reply = warp::reply::with_header(
                rendered.data,
                header::CONTENT_TYPE,
                rendered.format.content_type(),
            );
            warp::reply::with_header(reply, header::CACHE_CONTROL, "no-store").into_response()
        }
        Ok(Err(DomainError::InvalidRequest(message))) => {
            text_response(StatusCode::BAD_REQUEST, &message)
        }
        Ok(Err(e)) => {
            error!("画像の取得に失敗しました: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED)
        }
        Err(_) => {
            error!(
                "{:?} 以内に画像を用意できませんでした",
                state.request_timeout
            );
            text_response(StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED)
        }
    }
}

async fn handle_upload(
    query: SecretQuery,
    form: FormData,
    state: AppState,
) -> Result<Response, Infallible> {
    Ok(upload_response(query, form, state)
        .instrument(request_span("/upload"))
        .await)
}

async fn upload_response(query: SecretQuery, form: FormData, state: AppState) -> Response {
    info!("/upload へのリクエスト");
    if !state.authenticator.authenticate(query.secret.as_deref()).await {
        info!("/upload への認証されていないリクエスト");
        return text_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED);
    }

    let (file_name, data) = match read_file_part(form).await {
        Ok(Some(part)) => part,
        Ok(None) => {
            return text_response(StatusCode::BAD_REQUEST, "'file' フィールドがありません");
        }
        Err(e) => {
            warn!("マルチパートの読み込みに失敗しました: {}", e);
            return text_response(StatusCode::BAD_REQUEST, "マルチパートの読み込みに失敗しました");
        }
    };

    match state.pool_seeding.store_upload(&file_name, data).await {
        Ok(name) => stored_response(name),
        Err(e) => {
            warn!("アップロードを保存できませんでした: {}", e);
            domain_error_response(e)
        }
    }
}

/// `file` フィールドを最初の1つだけ読み込む
async fn read_file_part(mut form: FormData) -> Result<Option<(String, Bytes)>, warp::Error> {
    while let Some(part) = form.try_next().await? {
        if part.name() != "file" {
            continue;
        }
        let file_name = part.filename().unwrap_or_default().to_string();
        let data = part
            .stream()
            .try_fold(Vec::new(), |mut data, buf| async move {
                data.put(buf);
                Ok(data)
            })
            .await?;
        return Ok(Some((file_name, Bytes::from(data))));
    }
    Ok(None)
}

async fn handle_fetch(query: FetchQuery, state: AppState) -> Result<Response, Infallible> {
    Ok(fetch_response(query, state)
        .instrument(request_span("/fetch"))
        .await)
}

async fn fetch_response(query: FetchQuery, state: AppState) -> Response {
    info!("/fetch へのリクエスト: url={}", query.url);
    if !state.authenticator.authenticate(query.secret.as_deref()).await {
        info!("/fetch への認証されていないリクエスト");
        return text_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED);
    }

    let result = tokio::time::timeout(
        state.request_timeout,
        state.pool_seeding.store_from_url(&query.url),
    )
    .await;
    match result {
        Ok(Ok(name)) => stored_response(name),
        Ok(Err(e)) => {
            warn!("URLから画像を保存できませんでした: {}", e);
            domain_error_response(e)
        }
        Err(_) => {
            error!("{:?} 以内に画像を取得できませんでした", state.request_timeout);
            text_response(StatusCode::GATEWAY_TIMEOUT, FETCH_FAILED)
        }
    }
}
