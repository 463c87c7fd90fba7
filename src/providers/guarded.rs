//! Circuit-breaker and retry decorator for any [`LLMProvider`].
//!
//! Composition order is breaker outside, retries inside:
//!
//! ```text
//! chat_api breaker (one outcome, one deadline)
//!   └── RetryPolicy (up to N attempts with backoff)
//!         └── inner provider.chat(..)
//! ```
//!
//! A burst of retried rate-limit errors therefore counts as a single failure
//! toward the breaker threshold, and an open breaker fails the call without
//! touching the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::resilience::{CircuitBreaker, RetryPolicy};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// A provider gated by a circuit breaker, retrying transient errors inside
/// each breaker attempt.
pub struct GuardedProvider {
    inner: Arc<dyn LLMProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    /// Deadline for one breaker attempt, retries and backoff included.
    timeout: Duration,
}

impl std::fmt::Debug for GuardedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedProvider")
            .field("inner", &self.inner.name())
            .field("breaker", &self.breaker.name())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GuardedProvider {
    pub fn new(
        inner: Arc<dyn LLMProvider>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            inner,
            breaker,
            retry,
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl LLMProvider for GuardedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let label = self.breaker.name();
        let (inner, retry) = (&self.inner, &self.retry);
        let (messages, tools, options) = (&messages, &tools, &options);
        self.breaker
            .call(self.timeout, move || {
                retry.run(label, move || {
                    inner.chat(messages.clone(), tools.clone(), model, options.clone())
                })
            })
            .await
    }
}
