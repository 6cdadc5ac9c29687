//! Exponential backoff for FoxWQ requests.
//!
//! Retrying belongs to the transport layer: the sync engine issues each call
//! once and treats whatever comes back as final.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Decision returned by the error classifier passed to [`retry_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Backoff settings. Jitter is drawn from `0..base_delay_secs`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    /// A configuration that never sleeps and never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    /// Delay before retry number `retry` (0-indexed):
    /// `min(base * 2^retry, max) + jitter`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let capped = self
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs);
        let jitter = match self.base_delay_secs {
            0 => 0,
            base => rand::thread_rng().gen_range(0..base),
        };
        Duration::from_secs(capped + jitter)
    }
}

/// Run `operation` until it succeeds, the classifier aborts, or
/// `max_retries` retries have been spent. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: &RetryConfig,
    label: &str,
    classifier: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let mut retry = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if classifier(&err) == RetryAction::Abort || retry >= config.max_retries {
            return Err(err);
        }
        let delay = config.delay_for_retry(retry);
        retry += 1;
        tracing::warn!(
            request = label,
            attempt = retry,
            max_retries = config.max_retries,
            delay_secs = delay.as_secs(),
            error = %err,
            "Transient error, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_secs: 1,
            max_delay_secs: 4,
        };
        // jitter is 0..1, i.e. always 0 with a base of 1
        assert_eq!(config.delay_for_retry(0).as_secs(), 1);
        assert_eq!(config.delay_for_retry(1).as_secs(), 2);
        assert_eq!(config.delay_for_retry(2).as_secs(), 4);
        assert_eq!(config.delay_for_retry(3).as_secs(), 4);
        assert_eq!(config.delay_for_retry(64).as_secs(), 4);
    }

    #[test]
    fn test_delay_includes_bounded_jitter() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_secs: 3,
            max_delay_secs: 60,
        };
        let d = config.delay_for_retry(1).as_secs();
        assert!((6..9).contains(&d), "delay {d} out of range");
    }

    #[test]
    fn test_none_has_zero_delay() {
        assert_eq!(RetryConfig::none().delay_for_retry(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_returns_first_success() {
        let result: Result<&str, String> =
            retry_with_backoff(&instant(3), "t", |_| RetryAction::Retry, || async { Ok("sgf") })
                .await;
        assert_eq!(result.unwrap(), "sgf");
    }

    #[tokio::test]
    async fn test_abort_stops_after_one_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), String> = retry_with_backoff(
            &instant(5),
            "t",
            |_| RetryAction::Abort,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("not found".to_string())
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "not found");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, String> = retry_with_backoff(
            &instant(3),
            "t",
            |_| RetryAction::Retry,
            || {
                let c = c.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err("timeout".to_string()),
                        n => Ok(n),
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), String> = retry_with_backoff(
            &instant(2),
            "t",
            |_| RetryAction::Retry,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("502".to_string())
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "502");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
