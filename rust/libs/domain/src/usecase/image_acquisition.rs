use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    error::DomainError,
    model::CandidateImage,
    service::{CandidateSource, FitPolicy, ImageSourceError},
};

pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// 候補取得と適合判定を上限回数まで繰り返す
///
/// 取得失敗・候補なしは即座に打ち切る。デコードできない候補は
/// 不適合と同様に扱い、次の候補を試す。
#[derive(Clone, Copy, Debug)]
pub struct ImageAcquisition {
    policy: FitPolicy,
    max_attempts: usize,
}

impl ImageAcquisition {
    pub fn new(policy: FitPolicy, max_attempts: usize) -> Self {
        Self {
            policy,
            max_attempts,
        }
    }

    pub fn policy(&self) -> &FitPolicy {
        &self.policy
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub async fn acquire<S>(
        &self,
        source: &S,
        deadline: Option<Instant>,
    ) -> Result<CandidateImage, DomainError>
    where
        S: CandidateSource + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!("期限を過ぎたため取得を中止します: attempt={}", attempt);
                return Err(DomainError::Unavailable("期限切れ".to_string()));
            }

            let candidate = match source.fetch_candidate().await {
                Ok(candidate) => candidate,
                Err(ImageSourceError::NotAvailable) => {
                    info!("画像ソースに候補がありません");
                    return Err(DomainError::Unavailable(
                        ImageSourceError::NotAvailable.to_string(),
                    ));
                }
                Err(e @ ImageSourceError::FetchError(_)) => {
                    error!("候補画像の取得に失敗しました: {}", e);
                    return Err(DomainError::Unavailable(e.to_string()));
                }
                Err(e @ ImageSourceError::DecodeError(_)) => {
                    warn!(
                        "候補画像をスキップします: attempt={}/{}, error={}",
                        attempt, self.max_attempts, e
                    );
                    continue;
                }
            };

            let dimensions = candidate.oriented_dimensions();
            if self.policy.fits(&candidate) {
                info!(
                    "候補画像を採用しました: attempt={}, {}x{}",
                    attempt, dimensions.width, dimensions.height
                );
                return Ok(candidate);
            }
            debug!(
                "候補画像が画面に合いません: attempt={}/{}, {}x{}",
                attempt, self.max_attempts, dimensions.width, dimensions.height
            );
        }

        warn!("{}回試行しても適合する画像がありませんでした", self.max_attempts);
        Err(DomainError::Unavailable(format!(
            "{}回の試行で適合する画像がありません",
            self.max_attempts
        )))
    }
}

impl Default for ImageAcquisition {
    fn default() -> Self {
        Self::new(FitPolicy::default(), DEFAULT_MAX_ATTEMPTS)
    }
}
