//! Providers module - LLM providers
//!
//! This module defines the `LLMProvider` trait and common types for
//! interacting with LLM providers, the Anthropic implementation, and the
//! [`GuardedProvider`] decorator that puts any provider behind the
//! `chat_api` circuit breaker with retries inside it.
//!
//! # Example
//!
//! ```rust,ignore
//! use breakwater::providers::{LLMProvider, ChatOptions};
//! use breakwater::providers::claude::ClaudeProvider;
//! use breakwater::session::Message;
//!
//! async fn example() -> breakwater::Result<()> {
//!     let provider = ClaudeProvider::new("your-api-key")?;
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await?;
//!     println!("Response: {}", response.content);
//!     Ok(())
//! }
//! ```

pub mod claude;
pub mod guarded;
mod types;

use crate::error::ProviderError;

pub use claude::ClaudeProvider;
pub use guarded::GuardedProvider;
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, StopReason, ToolDefinition, Usage,
};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
///
/// This centralizes the mapping from HTTP status codes to error classifications
/// so that the chat provider and the HTTP-backed tools produce consistent
/// typed errors.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    if body.contains("overloaded_error") {
        return ProviderError::Overloaded(body.to_string());
    }
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        529 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status_code(), Some(401));
        assert!(matches!(
            parse_provider_error(403, "forbidden"),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_402() {
        let err = parse_provider_error(402, "payment required");
        assert!(matches!(err, ProviderError::Billing(_)));
    }

    #[test]
    fn test_parse_provider_error_429() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_5xx() {
        for status in [500, 502, 503, 504] {
            let err = parse_provider_error(status, "oops");
            assert!(matches!(err, ProviderError::ServerError(_)));
        }
    }

    #[test]
    fn test_parse_provider_error_overloaded_body() {
        let err = parse_provider_error(
            500,
            "Claude API error: overloaded_error - Overloaded",
        );
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert!(matches!(
            parse_provider_error(529, ""),
            ProviderError::Overloaded(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
