//! Resilience primitives: circuit breakers, their catalogue, and retries.
//!
//! - [`CircuitBreaker`]: per-dependency failure gate with lazy half-open
//! - [`CircuitManager`]: the named breakers declared at startup
//! - [`RetryPolicy`]: bounded exponential backoff for transient errors
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])

pub mod circuit;
pub mod clock;
pub mod manager;
pub mod retry;

pub use circuit::{effective_state, BreakerStats, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CircuitManager, Dependency};
pub use retry::{
    compute_delay, is_retryable, with_retry, RetryPolicy, SleepFuture, Sleeper, TokioSleeper,
};
