//! Bounded retry with exponential backoff.
//!
//! A [`RetryPolicy`] re-runs a fallible async operation while its errors are
//! transient (rate limits, 5xx, overload, timeouts, connection failures) and
//! gives up immediately on anything else (auth, billing, validation,
//! configuration, open circuits).
//!
//! Retries compose *inside* a circuit breaker attempt:
//!
//! ```text
//! breaker.call(timeout, || policy.run("chat", || provider.chat(..)))
//! ```
//!
//! so a whole retried sequence is a single success or failure as far as the
//! breaker is concerned.
//!
//! Sleeping goes through a [`Sleeper`] so tests can observe the backoff
//! schedule without waiting for it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{BreakwaterError, Result};

/// Patterns in untyped error messages that indicate a transient failure.
const RETRYABLE_PATTERNS: &[&str] = &[
    "429",
    "500",
    "502",
    "503",
    "504",
    "rate limit",
    "rate_limit",
    "overloaded",
    "too many requests",
    "server error",
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "connection reset",
];

/// Client errors that are never worth repeating, even if a retryable pattern
/// also appears in the message.
const NON_RETRYABLE_PATTERNS: &[&str] = &["400", "401", "403", "404"];

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of backoff delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Check whether an error represents a transient failure that should be retried.
///
/// Structured errors delegate to [`BreakwaterError::is_retryable`]. Untyped
/// `Provider`/`Tool` messages fall back to substring matching.
pub fn is_retryable(err: &BreakwaterError) -> bool {
    match err {
        BreakwaterError::Provider(_) | BreakwaterError::Tool(_) => {
            let msg = err.to_string().to_lowercase();
            if NON_RETRYABLE_PATTERNS.iter().any(|p| msg.contains(p)) {
                return false;
            }
            RETRYABLE_PATTERNS.iter().any(|p| msg.contains(p))
        }
        other => other.is_retryable(),
    }
}

/// Compute the backoff delay for a given attempt (without sleeping).
///
/// Delay formula: `min(base_delay_ms * 2^attempt + jitter_ms, max_delay_ms)`
///
/// # Arguments
/// * `attempt` - The current retry attempt (0-indexed)
/// * `base_delay_ms` - Base delay in milliseconds
/// * `max_delay_ms` - Maximum delay cap in milliseconds
/// * `jitter_ms` - Jitter value to add
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

/// Jitter in `[0, base_delay_ms)` taken from the sub-second part of the
/// system time.
fn clock_jitter_ms(base_delay_ms: u64) -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % base_delay_ms.max(1))
        .unwrap_or(0)
}

/// Retry schedule and classifier.
///
/// # Example
///
/// ```
/// use breakwater::resilience::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .with_max_retries(5)
///     .with_base_delay_ms(200)
///     .without_jitter();
/// assert_eq!(policy.max_attempts(), 6);
/// assert_eq!(policy.delay_for(2).as_millis(), 800);
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3.
    max_retries: u32,
    /// Base delay in milliseconds for exponential backoff. Default: 1000.
    base_delay_ms: u64,
    /// Maximum delay cap in milliseconds. Default: 30000.
    max_delay_ms: u64,
    jitter: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// Create a policy with 3 retries, 1s base delay, 30s cap and jitter.
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter: true,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::new().with_max_retries(0)
    }

    /// Build from the `retry` config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new()
            .with_max_retries(config.max_retries)
            .with_base_delay_ms(config.base_delay_ms)
            .with_max_delay_ms(config.max_delay_ms)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Use the bare exponential schedule.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt + 1` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter {
            clock_jitter_ms(self.base_delay_ms)
        } else {
            0
        };
        Duration::from_millis(compute_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            jitter,
        ))
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retryable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        operation = label,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}

/// Run `operation` under `policy`.
///
/// Free-function form of [`RetryPolicy::run`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    policy.run(label, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Records requested delays and returns immediately.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> SleepFuture {
            self.delays.lock().unwrap().push(duration);
            Box::pin(async {})
        }
    }

    fn policy(max_retries: u32) -> (RetryPolicy, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let policy = RetryPolicy::new()
            .with_max_retries(max_retries)
            .with_base_delay_ms(100)
            .with_max_delay_ms(1_000)
            .without_jitter()
            .with_sleeper(sleeper.clone());
        (policy, sleeper)
    }

    // ====================================================================
    // Classifier
    // ====================================================================

    #[test]
    fn test_is_retryable_untyped_patterns() {
        assert!(is_retryable(&BreakwaterError::Provider("HTTP 429".into())));
        assert!(is_retryable(&BreakwaterError::Provider("503 Service Unavailable".into())));
        assert!(is_retryable(&BreakwaterError::Provider("model is overloaded".into())));
        assert!(!is_retryable(&BreakwaterError::Provider("HTTP 401 unauthorized".into())));
        assert!(!is_retryable(&BreakwaterError::Provider("something broke".into())));
    }

    #[test]
    fn test_client_error_wins_over_retryable_pattern() {
        // "400" excludes even though "rate limit" is present
        let err = BreakwaterError::Provider("400 rate limit field invalid".into());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_is_retryable_typed() {
        assert!(is_retryable(&ProviderError::RateLimit("x".into()).into()));
        assert!(is_retryable(&ProviderError::Overloaded("x".into()).into()));
        assert!(!is_retryable(&ProviderError::Auth("x".into()).into()));
        assert!(!is_retryable(&ProviderError::Billing("x".into()).into()));
    }

    #[test]
    fn test_circuit_open_and_config_are_not_retryable() {
        assert!(!is_retryable(&BreakwaterError::CircuitOpen {
            name: "chat_api".into(),
            cooldown_remaining: Duration::from_secs(3),
        }));
        assert!(!is_retryable(&BreakwaterError::Config("bad".into())));
    }

    // ====================================================================
    // Delay schedule
    // ====================================================================

    #[test]
    fn test_delay_calculation() {
        assert_eq!(compute_delay(0, 1000, 30_000, 0), 1000);
        assert_eq!(compute_delay(1, 1000, 30_000, 0), 2000);
        assert_eq!(compute_delay(3, 1000, 30_000, 0), 8000);
        assert_eq!(compute_delay(1, 1000, 30_000, 500), 2500);
    }

    #[test]
    fn test_delay_capped_at_max() {
        assert_eq!(compute_delay(10, 1000, 30_000, 0), 30_000);
        assert_eq!(compute_delay(4, 1000, 30_000, 999_999), 30_000);
    }

    #[test]
    fn test_delay_large_attempt_does_not_overflow() {
        assert_eq!(compute_delay(u32::MAX, u64::MAX, 5_000, 0), 5_000);
    }

    #[test]
    fn test_jittered_delay_stays_in_bounds() {
        let policy = RetryPolicy::new().with_base_delay_ms(100).with_max_delay_ms(10_000);
        let d = policy.delay_for(1).as_millis() as u64;
        assert!((200..300).contains(&d));
    }

    #[test]
    fn test_from_config_disabled() {
        let config = RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts(), 1);
    }

    // ====================================================================
    // run()
    // ====================================================================

    #[tokio::test]
    async fn test_success_first_try_does_not_sleep() {
        let (policy, sleeper) = policy(3);
        let value = policy.run("op", || async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let (policy, sleeper) = policy(3);
        let calls = AtomicU32::new(0);
        let value = policy
            .run("op", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::ServerError("502".into()).into())
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let (policy, sleeper) = policy(3);
        let calls = AtomicU32::new(0);
        let err = with_retry(&policy, "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ProviderError::Auth("bad key".into()).into())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BreakwaterError::ProviderTyped(ProviderError::Auth(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_returns_last_error() {
        let (policy, sleeper) = policy(2);
        let calls = AtomicU32::new(0);
        let err = policy
            .run("op", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderError::RateLimit(format!("attempt {}", n)).into())
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("attempt 2"));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delays_are_capped() {
        let (policy, sleeper) = policy(6);
        let _ = policy
            .run("op", || async {
                Err::<(), _>(BreakwaterError::Timeout {
                    operation: "op".into(),
                    elapsed: Duration::from_millis(1),
                })
            })
            .await;
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 6);
        assert_eq!(delays[5], Duration::from_millis(1_000));
    }
}
