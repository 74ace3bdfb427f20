//! Centralized configuration constants.
//!
//! Defaults used by [`CoordinatorConfig`](crate::cluster::CoordinatorConfig)
//! and the change driver live here so they can be found and changed in one
//! place.
//!
//! # Categories
//!
//! - **Retry Constants**: backoff bounds for executor calls
//! - **Driver Constants**: executor call timeout and shutdown
//! - **Storage Constants**: snapshot naming in the object store

// =============================================================================
// Retry Constants
// =============================================================================

/// First backoff delay after a transient executor failure.
pub const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 100;

/// Upper bound for the backoff delay between executor attempts.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// How many times one operation is attempted before its plan is failed.
///
/// Counts the first attempt, so 5 means one call plus four retries.
pub const DEFAULT_MAX_APPLY_ATTEMPTS: usize = 5;

// =============================================================================
// Driver Constants
// =============================================================================

/// Bound on a single executor call. Elapsed calls count as transient failures.
pub const DEFAULT_APPLY_TIMEOUT_MS: u64 = 30_000;

/// How long shutdown waits for background tasks before aborting them.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Name of the background task running the change driver.
pub const CHANGE_DRIVER_TASK: &str = "topology_change_driver";

// =============================================================================
// Storage Constants
// =============================================================================

/// Object store key prefix under which `topology.bin` is written.
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "topology";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn test_retry_bounds_are_ordered() {
        assert!(DEFAULT_RETRY_MIN_DELAY_MS < DEFAULT_RETRY_MAX_DELAY_MS);
        assert!(DEFAULT_MAX_APPLY_ATTEMPTS >= 1);
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn test_timeout_exceeds_max_backoff() {
        assert!(DEFAULT_APPLY_TIMEOUT_MS >= DEFAULT_RETRY_MAX_DELAY_MS);
    }
}
