mod auth;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use domain::{
    service::CanvasImageTransformer,
    usecase::{PoolSeedingUseCaseImpl, RandomImageUseCaseImpl},
};
use http::ReqwestRemoteFetcher;
use pool::FsPoolDirectory;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{auth::FileSecretAuthenticator, config::Args, routes::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let provider_config = args.provider_config();
    let pool = Arc::new(FsPoolDirectory::new(&provider_config.pool_root));
    pool.prepare()
        .await
        .with_context(|| format!("画像プールを用意できません: {:?}", pool.root()))?;

    let fetcher = Arc::new(
        ReqwestRemoteFetcher::with_timeout(args.http_timeout())
            .context("HTTP クライアントを作成できません")?,
    );

    let random_image = RandomImageUseCaseImpl::new(
        fetcher.clone(),
        pool.clone(),
        CanvasImageTransformer,
        provider_config.clone(),
        args.random_image_settings(),
    );
    let pool_seeding = PoolSeedingUseCaseImpl::new(fetcher, pool);

    let state = AppState {
        random_image: Arc::new(random_image),
        pool_seeding: Arc::new(pool_seeding),
        authenticator: Arc::new(
            FileSecretAuthenticator::new(&args.secret_file).with_env_var(&args.secret_env),
        ),
        request_timeout: args.request_timeout(),
        max_upload_bytes: args.max_upload_bytes,
    };

    let (addr, server) = warp::serve(routes::routes(state))
        .try_bind_with_graceful_shutdown(args.listen, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("シグナルを待機できません: {}", e);
            }
            info!("シャットダウンします");
        })
        .with_context(|| format!("{} で待ち受けできません", args.listen))?;

    info!(
        "ink を起動しました: addr={}, source={:?}, catalog={}, pool={:?}",
        addr, args.source, provider_config.catalog_url, provider_config.pool_root
    );
    server.await;
    Ok(())
}
