//! Error types for Breakwater
//!
//! This module defines all error types used throughout the crate. Uses
//! `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Two questions are answered here for every failure: should the retry layer
//! try again ([`BreakwaterError::is_retryable`]), and should a circuit breaker
//! count it ([`BreakwaterError::counts_toward_breaker`]).

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides fine-grained categorization of upstream HTTP errors, enabling
/// retry decisions without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401/403: Invalid API key or authentication failure
    Auth(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 402: Payment required or billing issue
    Billing(String),
    /// 500/502/503/504: Server-side errors
    ServerError(String),
    /// 400: Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Provider is overloaded (e.g. Anthropic `overloaded_error`): retry with backoff
    Overloaded(String),
    /// Response body could not be decoded into the expected shape
    Format(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Format(msg) => write!(f, "Malformed response: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Overloaded(_) => Some(503),
            ProviderError::Timeout(_) | ProviderError::Format(_) | ProviderError::Unknown(_) => {
                None
            }
        }
    }
}

impl From<ProviderError> for BreakwaterError {
    fn from(err: ProviderError) -> Self {
        BreakwaterError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Breakwater operations.
#[derive(Error, Debug)]
pub enum BreakwaterError {
    /// Configuration-related errors (invalid config, missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider errors.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// The named breaker is open; the call was not attempted.
    #[error(
        "Circuit '{name}' is open, retry in {}s",
        cooldown_remaining.as_secs_f64().ceil() as u64
    )]
    CircuitOpen {
        /// Breaker (dependency) name
        name: String,
        /// Time left until a trial call is allowed; never exceeds the cooldown
        cooldown_remaining: Duration,
    },

    /// An external call exceeded its deadline.
    #[error("Timed out after {}ms: {operation}", elapsed.as_millis())]
    Timeout {
        /// What was being waited on (breaker or tool name)
        operation: String,
        /// The deadline that was exceeded
        elapsed: Duration,
    },

    /// A command name was registered twice.
    #[error("Duplicate command registration: {0}")]
    DuplicateCommand(String),

    /// Resource not found (breakers, tools, commands, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Security violations (blocked hosts, etc.)
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for Breakwater operations.
pub type Result<T> = std::result::Result<T, BreakwaterError>;

impl BreakwaterError {
    /// Returns `true` if the failure is transient and worth another attempt.
    ///
    /// Configuration, validation and authorization failures are never retried,
    /// and neither is an open circuit.
    pub fn is_retryable(&self) -> bool {
        match self {
            BreakwaterError::ProviderTyped(pe) => pe.is_retryable(),
            BreakwaterError::Timeout { .. } => true,
            BreakwaterError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            BreakwaterError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Returns `true` if a circuit breaker should record this as a failure.
    ///
    /// Configuration errors and local policy rejections are never gated by a
    /// breaker, and a nested `CircuitOpen` is not a new observation of the
    /// dependency's health.
    pub fn counts_toward_breaker(&self) -> bool {
        !matches!(
            self,
            BreakwaterError::Config(_)
                | BreakwaterError::CircuitOpen { .. }
                | BreakwaterError::DuplicateCommand(_)
                | BreakwaterError::SecurityViolation(_)
        )
    }

    /// Returns `true` for the open-circuit fast-fail.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakwaterError::CircuitOpen { .. })
    }
}
