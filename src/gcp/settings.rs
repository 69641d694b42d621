//! Call settings and retry
//!
//! Every method resolves a [`CallSettings`] from the client's immutable
//! settings table, optionally adjusted per call with [`CallOptions`]. Retries
//! run through `tokio-retry` with an exponential [`Backoff`] and jitter, and
//! only for codes in the method's allowlist.

use super::error::{Error, Result};
use super::status::Code;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;

/// Per-attempt timeout used by every method unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Retry policy for one method
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub retry_codes: Vec<Code>,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Deadline across all attempts and backoff sleeps
    pub total_timeout: Duration,
}

impl RetrySettings {
    pub fn new(retry_codes: &[Code]) -> Self {
        Self {
            retry_codes: retry_codes.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.backoff_multiplier = multiplier;
        self.max_backoff = max;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    /// Whether a failed attempt may be retried.
    ///
    /// DEADLINE_EXCEEDED is never retried, even when listed: a mutating call
    /// that timed out may already have been applied.
    pub fn is_retryable(&self, error: &Error) -> bool {
        let code = error.code();
        code != Code::DeadlineExceeded && self.retry_codes.contains(&code)
    }

    /// Sleep durations between attempts, before jitter
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_backoff,
            multiplier: self.backoff_multiplier,
            max: self.max_backoff,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_codes: Vec::new(),
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 1.3,
            max_backoff: Duration::from_secs(60),
            max_attempts: 5,
            total_timeout: Duration::from_secs(600),
        }
    }
}

/// Exponential backoff capped at a maximum delay
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    multiplier: f64,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.max);
        // Overflow and non-finite growth saturate at the cap
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier.max(1.0))
            .map_or(self.max, |next| next.min(self.max));
        Some(current)
    }
}

/// Resolved settings for one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSettings {
    pub timeout: Duration,
    pub retry: Option<RetrySettings>,
}

impl CallSettings {
    pub fn no_retry() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: None,
        }
    }

    pub fn retrying(codes: &[Code]) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: Some(RetrySettings::new(codes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RetryOverride {
    Disable,
    Replace(RetrySettings),
}

/// Per-call overrides on top of the method's settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    timeout: Option<Duration>,
    retry: Option<RetryOverride>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(RetryOverride::Replace(retry));
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = Some(RetryOverride::Disable);
        self
    }

    pub fn resolve(&self, base: &CallSettings) -> CallSettings {
        CallSettings {
            timeout: self.timeout.unwrap_or(base.timeout),
            retry: match &self.retry {
                None => base.retry.clone(),
                Some(RetryOverride::Disable) => None,
                Some(RetryOverride::Replace(retry)) => Some(retry.clone()),
            },
        }
    }
}

/// Run `attempt` under the retry policy in `settings`
pub async fn execute<T, F, Fut>(method: &str, settings: &CallSettings, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let Some(retry) = &settings.retry else {
        return attempt().await;
    };

    let strategy = retry
        .backoff()
        .map(jitter)
        .take(retry.max_attempts.saturating_sub(1) as usize);

    let condition = |error: &Error| {
        let retryable = retry.is_retryable(error);
        if retryable {
            tracing::warn!("{} failed with {}, retrying", method, error.code());
        }
        retryable
    };

    match tokio::time::timeout(retry.total_timeout, RetryIf::start(strategy, attempt, condition)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("{} exceeded its total deadline of {:?}", method, retry.total_timeout);
            Err(Error::Timeout(retry.total_timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::status::Status;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(codes: &[Code], attempts: u32) -> CallSettings {
        CallSettings {
            timeout: DEFAULT_TIMEOUT,
            retry: Some(
                RetrySettings::new(codes)
                    .with_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(4))
                    .with_max_attempts(attempts),
            ),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetrySettings::default().with_backoff(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(500),
        );
        let delays: Vec<_> = retry.backoff().take(5).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_backoff_saturates_on_huge_multiplier() {
        let retry = RetrySettings::default().with_backoff(
            Duration::from_millis(100),
            1e21,
            Duration::from_secs(60),
        );
        let delays: Vec<_> = retry.backoff().take(3).collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(100), Duration::from_secs(60), Duration::from_secs(60)]
        );

        let unbounded = RetrySettings::default().with_backoff(Duration::from_secs(1), f64::INFINITY, Duration::MAX);
        let delays: Vec<_> = unbounded.backoff().take(3).collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::MAX, Duration::MAX]);
    }

    #[test]
    fn test_deadline_exceeded_is_never_retryable() {
        let retry = RetrySettings::new(&[Code::Unavailable, Code::DeadlineExceeded]);
        assert!(retry.is_retryable(&Status::new(Code::Unavailable, "").into()));
        assert!(!retry.is_retryable(&Status::new(Code::DeadlineExceeded, "").into()));
        assert!(!retry.is_retryable(&Error::Timeout(Duration::from_secs(1))));
        assert!(!retry.is_retryable(&Status::new(Code::NotFound, "").into()));
    }

    #[test]
    fn test_call_options_resolve() {
        let base = CallSettings::retrying(&[Code::Unavailable]);

        assert_eq!(CallOptions::new().resolve(&base), base);

        let resolved = CallOptions::new()
            .with_timeout(Duration::from_secs(5))
            .without_retry()
            .resolve(&base);
        assert_eq!(resolved.timeout, Duration::from_secs(5));
        assert!(resolved.retry.is_none());

        let replacement = RetrySettings::new(&[Code::Internal]).with_max_attempts(2);
        let resolved = CallOptions::new()
            .with_retry(replacement.clone())
            .resolve(&CallSettings::no_retry());
        assert_eq!(resolved.retry, Some(replacement));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = execute("test", &fast_retry(&[Code::Unavailable], 5), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Status::new(Code::Unavailable, "try again").into())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = execute("test", &fast_retry(&[Code::Unavailable], 4), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Status::new(Code::Unavailable, "down").into())
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Code::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_retry_settings_make_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = execute("test", &CallSettings::no_retry(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Status::new(Code::Unavailable, "down").into())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_deadline() {
        let settings = CallSettings {
            timeout: DEFAULT_TIMEOUT,
            retry: Some(RetrySettings::new(&[Code::Unavailable]).with_total_timeout(Duration::from_millis(20))),
        };
        let result: Result<()> = execute("test", &settings, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
