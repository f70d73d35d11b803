use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use super::AiError;
use crate::config::AiConfig;

/// Fixed attempt budget with exponential backoff between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            base: config.retry_base,
        }
    }

    /// Delay after the given zero-based failed attempt: base * 2^attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Run `op` until it succeeds or fails with anything but a transport error.
///
/// Quota, API and parse errors are returned on first sight.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(AiError::Network(message)) if attempt + 1 < policy.attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = policy.attempts,
                    "AI network error, retrying in {:?}: {}",
                    delay,
                    message
                );
                sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            attempts: 3,
            base: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_network_errors_retried_until_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AiError> = with_retry(fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiError::Network("refused".into())) }
        })
        .await;
        assert!(matches!(result, Err(AiError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AiError::Network("timeout".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_quota_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AiError> = with_retry(fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AiError::Quota {
                    message: "429".into(),
                    retry_after: None,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(AiError::Quota { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_api_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AiError> = with_retry(fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AiError::Api {
                    status: 500,
                    message: "boom".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(AiError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
