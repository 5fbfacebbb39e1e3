use std::future::Future;
use tracing::{debug, warn};

use crate::core::errors::ServiceError;
use crate::core::params::RetryPolicy;

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. A
/// `ServiceError::Configuration` ends the loop at once since repeating the
/// call cannot fix a bad credential or endpoint. The last error is returned.
pub async fn retry_with_policy<T, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{}: succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(err) if err.is_configuration() => {
                warn!("{}: {} (not retrying)", label, err);
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                warn!("{}: giving up after {} attempts: {}", label, attempt, err);
                return Err(err);
            }
            Err(err) => {
                warn!(
                    "{}: attempt {}/{} failed: {}, retrying in {:?}",
                    label, attempt, max_attempts, err, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_policy("test", policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ServiceError::transient("translation/mock", "timeout"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuration_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_policy("test", policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::configuration("translation/deepseek", "bad api key")) }
        })
        .await;

        assert!(result.unwrap_err().is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = retry_with_policy("test", policy(3), |attempt| async move {
            Err(ServiceError::transient("ocr/ai_vision", format!("failure {attempt}")))
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 3"));
        // Two delays between three attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
