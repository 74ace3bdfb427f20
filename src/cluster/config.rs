//! Configuration for the change coordinator and its driver.
//!
//! ```rust,no_run
//! use topomorph::cluster::CoordinatorConfig;
//!
//! // Defaults, overridden from TOPOMORPH_* environment variables
//! let config = CoordinatorConfig::from_env().expect("invalid configuration");
//!
//! // Or built by hand
//! let config = CoordinatorConfig::default()
//!     .with_max_apply_attempts(3)
//!     .with_apply_timeout_ms(5_000);
//! config.validate().expect("invalid configuration");
//! ```

use std::time::Duration;

use crate::constants::{
    DEFAULT_APPLY_TIMEOUT_MS, DEFAULT_MAX_APPLY_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_RETRY_MIN_DELAY_MS, DEFAULT_SNAPSHOT_PREFIX,
};

/// Coordinator and driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// First backoff delay after a transient executor failure.
    pub retry_min_delay_ms: u64,
    /// Upper bound on the backoff delay.
    pub retry_max_delay_ms: u64,
    /// Attempts per operation, including the first one.
    pub max_apply_attempts: usize,
    /// Bound on one executor call.
    pub apply_timeout_ms: u64,
    /// Object store prefix for persisted snapshots.
    pub snapshot_prefix: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry_min_delay_ms: DEFAULT_RETRY_MIN_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            max_apply_attempts: DEFAULT_MAX_APPLY_ATTEMPTS,
            apply_timeout_ms: DEFAULT_APPLY_TIMEOUT_MS,
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TOPOMORPH_RETRY_MIN_DELAY_MS`: first backoff delay (default: 100)
    /// - `TOPOMORPH_RETRY_MAX_DELAY_MS`: maximum backoff delay (default: 10000)
    /// - `TOPOMORPH_MAX_APPLY_ATTEMPTS`: attempts per operation (default: 5)
    /// - `TOPOMORPH_APPLY_TIMEOUT_MS`: executor call timeout (default: 30000)
    /// - `TOPOMORPH_SNAPSHOT_PREFIX`: object store prefix (default: `topology`)
    ///
    /// Unset variables keep their default; malformed numbers are an error.
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::default();

        let config = Self {
            retry_min_delay_ms: env_number("TOPOMORPH_RETRY_MIN_DELAY_MS")?
                .unwrap_or(defaults.retry_min_delay_ms),
            retry_max_delay_ms: env_number("TOPOMORPH_RETRY_MAX_DELAY_MS")?
                .unwrap_or(defaults.retry_max_delay_ms),
            max_apply_attempts: env_number("TOPOMORPH_MAX_APPLY_ATTEMPTS")?
                .unwrap_or(defaults.max_apply_attempts),
            apply_timeout_ms: env_number("TOPOMORPH_APPLY_TIMEOUT_MS")?
                .unwrap_or(defaults.apply_timeout_ms),
            snapshot_prefix: std::env::var("TOPOMORPH_SNAPSHOT_PREFIX")
                .unwrap_or(defaults.snapshot_prefix),
        };

        config
            .validate()
            .map_err(|errors| format!("Invalid coordinator configuration: {}", errors.join("; ")))?;
        Ok(config)
    }

    /// Validate the configuration and return every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.retry_min_delay_ms == 0 {
            errors.push("retry_min_delay_ms must be at least 1".to_string());
        }

        if self.retry_min_delay_ms > self.retry_max_delay_ms {
            errors.push(format!(
                "retry_min_delay_ms ({}) must not exceed retry_max_delay_ms ({})",
                self.retry_min_delay_ms, self.retry_max_delay_ms
            ));
        }

        if self.max_apply_attempts == 0 {
            errors.push("max_apply_attempts must be at least 1".to_string());
        }

        if self.apply_timeout_ms == 0 {
            errors.push("apply_timeout_ms must be at least 1".to_string());
        }

        if self.snapshot_prefix.trim_matches('/').is_empty() {
            errors.push("snapshot_prefix must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn with_retry_delays(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.retry_min_delay_ms = min_ms;
        self.retry_max_delay_ms = max_ms;
        self
    }

    pub fn with_max_apply_attempts(mut self, attempts: usize) -> Self {
        self.max_apply_attempts = attempts;
        self
    }

    pub fn with_apply_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.apply_timeout_ms = timeout_ms;
        self
    }

    pub fn with_snapshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_prefix = prefix.into();
        self
    }

    pub fn retry_min_delay(&self) -> Duration {
        Duration::from_millis(self.retry_min_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }
}

fn env_number<T>(name: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid {name}: {e}")),
        Err(_) => Ok(None),
    }
}
