use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::core::config::Settings;
use crate::core::shutdown::is_shutting_down;
use crate::services::grading::model::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.grading().max_retries,
            base_delay: settings.grading().retry_base_delay(),
        }
    }

    /// Backoff before retry number `retry` (1-based): `base * 2^(retry - 1)`.
    pub(crate) fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Error)]
pub(crate) enum RetryError {
    #[error("{operation}: rate limit exhausted after {attempts} attempts")]
    RateLimitExhausted { operation: String, attempts: u32 },
    #[error("{operation}: retry aborted during backoff after {attempts} attempts")]
    Aborted { operation: String, attempts: u32 },
    #[error("{operation}: {source}")]
    NonRetryable {
        operation: String,
        #[source]
        source: ModelError,
    },
}

impl RetryError {
    pub(crate) fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExhausted { .. })
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::RateLimitExhausted { .. } => "RATE_LIMIT_EXHAUSTED",
            Self::Aborted { .. } => "RETRY_ABORTED",
            Self::NonRetryable { .. } => "MODEL_ERROR",
        }
    }
}

/// Runs `call` until it succeeds, fails with something other than a rate
/// limit, or the retry budget is spent.
///
/// Backoff sleeps race against `shutdown`; a shutdown observed before or
/// during a sleep ends the loop with [`RetryError::Aborted`]. A dropped sender
/// is not a shutdown, the sleep simply runs to completion.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    shutdown: &mut watch::Receiver<bool>,
    mut call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut retries = 0_u32;

    loop {
        match call().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(operation, retries, "Call succeeded after retrying");
                }
                return Ok(value);
            }
            Err(ModelError::RateLimited) if retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for(retries);
                metrics::counter!("grading_model_retries_total").increment(1);
                tracing::warn!(
                    operation,
                    retry = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );

                if !sleep_unless_shutdown(delay, shutdown).await {
                    tracing::warn!(operation, retries, "Backoff interrupted by shutdown");
                    return Err(RetryError::Aborted {
                        operation: operation.to_string(),
                        attempts: retries,
                    });
                }
            }
            Err(ModelError::RateLimited) => {
                return Err(RetryError::RateLimitExhausted {
                    operation: operation.to_string(),
                    attempts: retries + 1,
                });
            }
            Err(source) => {
                return Err(RetryError::NonRetryable { operation: operation.to_string(), source });
            }
        }
    }
}

/// Returns `false` when shutdown was signalled before the delay elapsed.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if is_shutting_down(shutdown) {
        return false;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return false,
                Ok(()) => continue,
                Err(_) => {
                    (&mut sleep).await;
                    return true;
                }
            },
        }
    }
}
