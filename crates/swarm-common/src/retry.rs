//! Retry utilities with exponential backoff and jitter.
//!
//! Used by the background resync loops to back off after a failed tick and by
//! one-shot startup calls (CRD install, API discovery) that may race an API
//! server that is still coming up.
//!
//! # Example
//!
//! ```ignore
//! use swarm_common::retry::{retry_with_backoff, RetryConfig};
//!
//! let crds = retry_with_backoff(
//!     &RetryConfig::with_max_attempts(5),
//!     "install_crds",
//!     || async { install_crds(&client).await },
//! ).await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Configuration for operations that may fail transiently.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Create a config that retries forever
    pub fn infinite() -> Self {
        Self::default()
    }

    /// Un-jittered delay before retry number `failures` (1-based), capped at `max_delay`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exp = self
            .backoff_multiplier
            .powi(failures.saturating_sub(1).min(32) as i32);
        let secs = (self.initial_delay.as_secs_f64() * exp).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Jittered delay (0.5x to 1.5x) before retry number `failures`.
    pub fn jittered_delay_for(&self, failures: u32) -> Duration {
        jitter(self.delay_for(failures))
    }
}

fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Execute an async operation with exponential backoff and jitter.
///
/// Retries indefinitely (or up to max_attempts if set) until success.
/// Returns the last error once max_attempts is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = config.jittered_delay_for(attempt);
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts: attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_immediately() {
        let result: Result<i32, &str> =
            retry_with_backoff(&fast_config(3), "op", || async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let result: Result<u32, String> = retry_with_backoff(&fast_config(5), "op", || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_after_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let result: Result<(), String> = retry_with_backoff(&fast_config(2), "op", || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", n))
            }
        })
        .await;
        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let config = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for(0), Duration::ZERO);
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(5), Duration::from_secs(10));
        assert_eq!(config.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(2),
            ..Default::default()
        };
        for _ in 0..50 {
            let d = config.jittered_delay_for(1);
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_secs(3));
        }
    }
}
