//! Retry policies for executor calls.
//!
//! Uses the `backon` crate. Every policy has jitter so that several drivers
//! retrying against the same executor do not hammer it in lockstep.
//!
//! # Example
//!
//! ```rust,no_run
//! use backon::Retryable;
//! use topomorph::cluster::{CoordinatorConfig, ExecutorError, retry};
//!
//! async fn example() -> Result<(), ExecutorError> {
//!     let config = CoordinatorConfig::default();
//!     (|| async { Ok::<_, ExecutorError>(()) })
//!         .retry(retry::operation_policy(&config))
//!         .when(ExecutorError::is_retriable)
//!         .await
//! }
//! ```

use std::time::Duration;

use backon::ExponentialBuilder;

use super::config::CoordinatorConfig;

/// Name used for operation retries in metrics and logs.
pub const OPERATION_POLICY: &str = "operation";

/// Policy for executor calls made by the change driver.
///
/// `max_apply_attempts` counts the first attempt, so the policy allows
/// `max_apply_attempts - 1` retries.
pub fn operation_policy(config: &CoordinatorConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.retry_min_delay())
        .with_max_delay(config.retry_max_delay())
        .with_max_times(config.max_apply_attempts.saturating_sub(1))
        .with_jitter()
}

/// Record a retry attempt for metrics.
pub fn record_retry_attempt(policy_name: &str, attempt: usize, delay: Duration) {
    super::metrics::RETRY_ATTEMPTS
        .with_label_values(&[policy_name, "attempt"])
        .inc();

    tracing::debug!(policy = policy_name, attempt, delay_ms = delay.as_millis() as u64, "Retry attempt");
}

/// Record a retry exhaustion (all retries failed).
pub fn record_retry_exhausted(policy_name: &str) {
    super::metrics::RETRY_ATTEMPTS
        .with_label_values(&[policy_name, "exhausted"])
        .inc();

    tracing::warn!(policy = policy_name, "Retry policy exhausted");
}

/// Record a retry success.
pub fn record_retry_success(policy_name: &str) {
    super::metrics::RETRY_ATTEMPTS
        .with_label_values(&[policy_name, "success"])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::error::ExecutorError;
    use backon::Retryable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(attempts: usize) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .with_retry_delays(1, 2)
            .with_max_apply_attempts(attempts)
    }

    #[tokio::test]
    async fn test_policy_attempts_match_config() {
        let calls = AtomicUsize::new(0);
        let result = (|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ExecutorError::Transient("down".into()))
        })
        .retry(operation_policy(&fast_config(3)))
        .when(ExecutorError::is_retriable)
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result = (|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ExecutorError::Rejected("no".into()))
        })
        .retry(operation_policy(&fast_config(5)))
        .when(ExecutorError::is_retriable)
        .await;

        assert_eq!(result, Err(ExecutorError::Rejected("no".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let calls = AtomicUsize::new(0);
        let _ = (|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ExecutorError::Timeout(Duration::from_millis(1)))
        })
        .retry(operation_policy(&fast_config(1)))
        .when(ExecutorError::is_retriable)
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = (|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ExecutorError::Transient("flaky".into()))
            } else {
                Ok(7)
            }
        })
        .retry(operation_policy(&fast_config(5)))
        .when(ExecutorError::is_retriable)
        .await;

        assert_eq!(result, Ok(7));
        record_retry_success(OPERATION_POLICY);
    }
}
