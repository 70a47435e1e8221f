use std::path::PathBuf;

use async_trait::async_trait;
use domain::ports::Authenticator;
use tokio::fs;
use tracing::{debug, error};

pub const DEFAULT_SECRET_ENV: &str = "AUTH_SECRET";

/// 共有シークレットによる認証
///
/// シークレットは差し替えられる可能性があるため、毎回ファイルから読み直す。
/// ファイルが読めない場合は環境変数を使う。
#[derive(Clone, Debug)]
pub struct FileSecretAuthenticator {
    secret_file: PathBuf,
    env_var: String,
}

impl FileSecretAuthenticator {
    pub fn new(secret_file: impl Into<PathBuf>) -> Self {
        Self {
            secret_file: secret_file.into(),
            env_var: DEFAULT_SECRET_ENV.to_string(),
        }
    }

    pub fn with_env_var(mut self, env_var: &str) -> Self {
        self.env_var = env_var.to_string();
        self
    }

    async fn load_secret(&self) -> Option<String> {
        let secret = match fs::read_to_string(&self.secret_file).await {
            Ok(content) => content,
            Err(e) => {
                debug!(
                    "{:?} を読めません ({})。環境変数 {} を使います",
                    self.secret_file, e, self.env_var
                );
                std::env::var(&self.env_var).ok()?
            }
        };
        let secret = secret.trim_end();
        (!secret.is_empty()).then(|| secret.to_string())
    }
}

#[async_trait]
impl Authenticator for FileSecretAuthenticator {
    async fn authenticate(&self, provided_secret: Option<&str>) -> bool {
        let Some(secret) = self.load_secret().await else {
            error!("{} が設定されていません", self.env_var);
            return false;
        };
        provided_secret.is_some_and(|provided| provided == secret)
    }
}
