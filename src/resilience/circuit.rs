//! Named circuit breaker around a single external dependency.
//!
//! # States
//!
//! ```text
//! Closed --(failures >= threshold)--> Open
//! Open --(cooldown elapsed, observed lazily)--> HalfOpen
//! HalfOpen --(trial call succeeds)--> Closed
//! HalfOpen --(trial call fails)--> Open (fresh cooldown)
//! ```
//!
//! HalfOpen is never stored. The breaker keeps a raw `Closed`/`Open` state and
//! the instant it opened; [`effective_state`] derives what an observer sees at
//! any moment, so a breaker whose cooldown has elapsed reads as HalfOpen
//! without anyone calling it.
//!
//! All bookkeeping happens under a per-breaker `std::sync::Mutex` that is
//! never held across an `.await`. Only one trial call is admitted at a time
//! while HalfOpen; others fail fast with `CircuitOpen`.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{BreakwaterError, Result};
use crate::utils::string::preview;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls fail fast until the cooldown elapses.
    Open,
    /// Cooldown elapsed; the next call is a trial.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Derive the observable state from the stored state and the clock.
///
/// `raw` is only ever `Closed` or `Open`. An `Open` breaker reads as
/// `HalfOpen` from `opened_at + cooldown` onwards.
pub fn effective_state(
    raw: CircuitState,
    opened_at: Option<Instant>,
    cooldown: Duration,
    now: Instant,
) -> CircuitState {
    match (raw, opened_at) {
        (CircuitState::Open, Some(at)) if now.saturating_duration_since(at) >= cooldown => {
            CircuitState::HalfOpen
        }
        (CircuitState::Open, _) => CircuitState::Open,
        (other, _) => other,
    }
}

/// Point-in-time view of a breaker, as reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub failures: u32,
}

struct Inner {
    raw: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// Bumped on every transition to Open or Closed and on reset.
    generation: u64,
    /// Generation of the trial call currently in flight, if any.
    probe: Option<u64>,
}

/// Ticket handed out when a call is admitted.
#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
    probe: bool,
}

/// A named failure gate around one dependency.
///
/// # Example
///
/// ```
/// use breakwater::resilience::{CircuitBreaker, CircuitState};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::new("search_api", 2, Duration::from_secs(30));
/// let value = breaker
///     .call(Duration::from_secs(1), || async { Ok::<_, breakwater::BreakwaterError>(7) })
///     .await
///     .unwrap();
/// assert_eq!(value, 7);
/// assert_eq!(breaker.state(), CircuitState::Closed);
/// # });
/// ```
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker on the system clock.
    ///
    /// A threshold of zero is treated as one.
    pub fn new(name: impl Into<String>, threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            cooldown,
            clock: Arc::new(SystemClock),
            inner: Mutex::new(Inner {
                raw: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                generation: 0,
                probe: None,
            }),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current observable state, evaluated against the clock.
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        effective_state(inner.raw, inner.opened_at, self.cooldown, self.clock.now())
    }

    /// Consecutive failures recorded since the last reset or close.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        BreakerStats {
            state: effective_state(inner.raw, inner.opened_at, self.cooldown, self.clock.now()),
            failures: inner.failure_count,
        }
    }

    /// Force the breaker closed with zero failures.
    ///
    /// Outcomes of calls admitted before the reset are ignored.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.raw = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.generation += 1;
        inner.probe = None;
        info!(breaker = %self.name, "Circuit reset");
    }

    /// Run `operation` through the breaker with a deadline.
    ///
    /// Fails with [`BreakwaterError::CircuitOpen`] without invoking
    /// `operation` while the breaker is open. Otherwise the operation's own
    /// result is returned after bookkeeping; a missed deadline becomes
    /// [`BreakwaterError::Timeout`] and counts as a failure. Errors for which
    /// [`BreakwaterError::counts_toward_breaker`] is false pass through
    /// without touching the breaker.
    pub async fn call<T, F, Fut>(&self, timeout: Duration, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = self.admit()?;
        let _probe = ProbeGuard {
            breaker: self,
            admission,
        };

        let result = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(BreakwaterError::Timeout {
                operation: self.name.clone(),
                elapsed: timeout,
            }),
        };

        match &result {
            Ok(_) => self.record_success(admission),
            Err(e) if e.counts_toward_breaker() => self.record_failure(admission, e),
            Err(e) => {
                debug!(breaker = %self.name, error = %e, "Error not counted by circuit")
            }
        }

        result
    }

    fn admit(&self) -> Result<Admission> {
        let mut inner = self.lock();
        let now = self.clock.now();
        match effective_state(inner.raw, inner.opened_at, self.cooldown, now) {
            CircuitState::Closed => Ok(Admission {
                generation: inner.generation,
                probe: false,
            }),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                Err(BreakwaterError::CircuitOpen {
                    name: self.name.clone(),
                    cooldown_remaining: self.cooldown.saturating_sub(elapsed),
                })
            }
            CircuitState::HalfOpen => {
                if inner.probe.is_some() {
                    return Err(BreakwaterError::CircuitOpen {
                        name: self.name.clone(),
                        cooldown_remaining: Duration::ZERO,
                    });
                }
                inner.probe = Some(inner.generation);
                info!(breaker = %self.name, "Circuit half-open: admitting trial call");
                Ok(Admission {
                    generation: inner.generation,
                    probe: true,
                })
            }
        }
    }

    fn record_success(&self, admission: Admission) {
        let mut inner = self.lock();
        if admission.generation != inner.generation {
            debug!(breaker = %self.name, "Ignoring late success from a previous generation");
            return;
        }
        if inner.raw == CircuitState::Open {
            info!(
                breaker = %self.name,
                previous_failures = inner.failure_count,
                "Circuit closed: trial call succeeded"
            );
            inner.raw = CircuitState::Closed;
            inner.opened_at = None;
            inner.generation += 1;
            inner.probe = None;
        }
        inner.failure_count = 0;
    }

    fn record_failure(&self, admission: Admission, error: &BreakwaterError) {
        let mut inner = self.lock();
        if admission.generation != inner.generation {
            debug!(
                breaker = %self.name,
                failures = inner.failure_count,
                "Ignoring late failure from a previous generation"
            );
            return;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);

        let now = self.clock.now();
        let reopen = inner.raw == CircuitState::Open;
        if reopen || inner.failure_count >= self.threshold {
            inner.raw = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.generation += 1;
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                threshold = self.threshold,
                cooldown_secs = self.cooldown.as_secs_f64(),
                error = %preview(&error.to_string(), 120),
                "{}",
                if reopen {
                    "Circuit re-opened: trial call failed"
                } else {
                    "Circuit opened: failure threshold reached"
                }
            );
        } else {
            debug!(
                breaker = %self.name,
                failures = inner.failure_count,
                threshold = self.threshold,
                "Circuit recorded failure"
            );
        }
    }

    fn release_probe(&self, admission: Admission) {
        let mut inner = self.lock();
        if inner.probe == Some(admission.generation) {
            inner.probe = None;
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &stats.state)
            .field("failure_count", &stats.failures)
            .field("threshold", &self.threshold)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

/// Frees the trial-call slot when the call finishes or its future is dropped.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.admission.probe {
            self.breaker.release_probe(self.admission);
        }
    }
}
