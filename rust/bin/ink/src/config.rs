use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use domain::{
    model::{DEFAULT_CATALOG_URL, DEFAULT_POOL_ROOT, Dimensions, ProviderConfig},
    service::{
        DEFAULT_MAX_DEVIATION, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH, FitPolicy,
        SourceSelection,
    },
    usecase::{DEFAULT_MAX_ATTEMPTS, RandomImageSettings},
};

use crate::auth::DEFAULT_SECRET_ENV;

pub const DEFAULT_SECRET_FILE: &str = "/run/secrets/auth_secret";

#[derive(Debug, Parser)]
#[command(name = "ink", about = "E-ink ディスプレイ向けにランダムな画像を配信するサーバー")]
pub struct Args {
    /// 待ち受けアドレス
    #[arg(long, env = "INK_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// ローカル画像プールのディレクトリ
    #[arg(long, env = "INK_POOL_DIR", default_value = DEFAULT_POOL_ROOT)]
    pub pool_dir: PathBuf,

    /// リモートカタログのベースURL
    #[arg(long, env = "INK_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    pub catalog_url: String,

    /// 共有シークレットのファイル。読めない場合は AUTH_SECRET を使う
    #[arg(long, env = "INK_SECRET_FILE", default_value = DEFAULT_SECRET_FILE)]
    pub secret_file: PathBuf,

    /// シークレットファイルが読めない場合に参照する環境変数
    #[arg(long, env = "INK_SECRET_ENV", default_value = DEFAULT_SECRET_ENV)]
    pub secret_env: String,

    /// 画像ソース (remote, local, random)
    #[arg(long, env = "INK_SOURCE", default_value = "remote", value_parser = parse_source)]
    pub source: SourceSelection,

    #[arg(long, env = "INK_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    #[arg(long, env = "INK_SCREEN_WIDTH", default_value_t = DEFAULT_SCREEN_WIDTH)]
    pub screen_width: u32,

    #[arg(long, env = "INK_SCREEN_HEIGHT", default_value_t = DEFAULT_SCREEN_HEIGHT)]
    pub screen_height: u32,

    /// 画面のアスペクト比からの許容差
    #[arg(long, env = "INK_MAX_DEVIATION", default_value_t = DEFAULT_MAX_DEVIATION)]
    pub max_deviation: f64,

    /// 1リクエスト全体（取得と変換）の期限
    #[arg(long, env = "INK_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// リモートへの個々のHTTPリクエストの期限
    #[arg(long, env = "INK_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "INK_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: u64,
}

fn parse_source(value: &str) -> Result<SourceSelection, String> {
    value.parse()
}

impl Args {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.pool_dir, &self.catalog_url)
    }

    pub fn random_image_settings(&self) -> RandomImageSettings {
        RandomImageSettings {
            default_source: self.source,
            max_attempts: self.max_attempts,
            remote_policy: FitPolicy::new(
                Dimensions::new(self.screen_width, self.screen_height),
                self.max_deviation,
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::service::SourceKind;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ink"]).unwrap();

        assert_eq!(args.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.pool_dir, PathBuf::from("data"));
        assert_eq!(args.source, SourceSelection::Fixed(SourceKind::Remote));

        let settings = args.random_image_settings();
        assert_eq!(settings.max_attempts, 10);
        assert_eq!(settings.remote_policy, FitPolicy::default());
        assert_eq!(args.provider_config().catalog_url, "https://xkcd.com");
        assert_eq!(args.request_timeout(), Duration::from_secs(60));
        assert_eq!(args.secret_env, "AUTH_SECRET");
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "ink",
            "--source",
            "random",
            "--max-attempts",
            "3",
            "--screen-width",
            "1200",
            "--screen-height",
            "825",
            "--max-deviation",
            "0.2",
            "--catalog-url",
            "http://localhost:9000/",
        ])
        .unwrap();

        assert_eq!(args.source, SourceSelection::Random);
        let settings = args.random_image_settings();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.remote_policy.screen(), Dimensions::new(1200, 825));
        assert_eq!(settings.remote_policy.max_deviation(), 0.2);
        assert_eq!(args.provider_config().catalog_url, "http://localhost:9000");
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(Args::try_parse_from(["ink", "--source", "ftp"]).is_err());
    }
}
