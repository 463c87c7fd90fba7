//! The bounded model/tool loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{BreakwaterError, Result};
use crate::providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
use crate::session::{Message, ToolCall, ToolResult};
use crate::tools::{ToolContext, ToolRegistry, MAX_TOOL_ERROR_CHARS};
use crate::utils::string::truncate_chars;

use super::context::{ContextBuilder, RuntimeContext, DEFAULT_HISTORY_WINDOW};

/// Appended to the reply when a run stops at `max_iterations`.
pub const ITERATION_LIMIT_NOTICE: &str =
    "[Stopped: reached iteration limit before the task was finished.]";

/// Default cap on model round-trips per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Slack added on top of the model timeout for the loop's own deadline, so
/// the provider's breaker-level timeout fires first and is counted there.
pub const MODEL_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Knobs for one [`AgenticLoop`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Model override; `None` uses the provider default
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Cap on model round-trips per run
    pub max_iterations: u32,
    /// Prior messages seeded into each run
    pub history_window: usize,
    /// Deadline for one model call
    pub model_timeout: Duration,
    /// Default system prompt when the caller passes none
    pub system_prompt: String,
    /// Channel name surfaced to tools and the system prompt
    pub channel: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: Some(config.model.clone()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_iterations: config.max_iterations,
            history_window: config.history_window,
            model_timeout: config.model_timeout(),
            system_prompt: config.system_prompt.clone(),
            channel: "cli".to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }
}

/// The outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// Final text, including the iteration-limit notice when applicable
    pub text: String,
    /// Model round-trips performed
    pub iterations: u32,
    /// Tool calls executed across all iterations
    pub tool_calls: usize,
    /// Whether the run stopped at `max_iterations`
    pub hit_iteration_limit: bool,
    /// Token usage summed over every model call
    pub usage: Usage,
}

/// Drives a model through bounded rounds of reasoning and tool use.
///
/// Each run is independent: its message list lives only as long as the call.
/// The provider is expected to be gated by the `chat_api` breaker (see
/// [`GuardedProvider`](crate::providers::GuardedProvider)); tool I/O is gated
/// inside each tool.
pub struct AgenticLoop {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    settings: LoopSettings,
}

impl AgenticLoop {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run to completion and return the final text.
    ///
    /// `system_prompt` overrides the configured prompt. `prior_context` is
    /// windowed to the last `history_window` messages.
    pub async fn run(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        prior_context: &[Message],
    ) -> Result<String> {
        Ok(self
            .run_detailed(user_message, system_prompt, prior_context)
            .await?
            .text)
    }

    /// Like [`run`](Self::run), returning iteration and tool statistics.
    pub async fn run_detailed(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        prior_context: &[Message],
    ) -> Result<AgentReply> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "agent_run",
            request_id = %request_id,
            channel = %self.settings.channel,
        );
        self.run_inner(user_message, system_prompt, prior_context, &request_id)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        prior_context: &[Message],
        request_id: &str,
    ) -> Result<AgentReply> {
        let start = Instant::now();
        let max_iterations = self.settings.max_iterations.max(1);
        let tool_names: Vec<String> = self.tools.names().into_iter().map(String::from).collect();
        let builder = ContextBuilder::new(system_prompt.unwrap_or(&self.settings.system_prompt))
            .with_history_window(self.settings.history_window)
            .with_runtime_context(
                RuntimeContext::new()
                    .with_channel(&self.settings.channel)
                    .with_tools(tool_names)
                    .with_current_time(),
            );

        let mut messages = builder.build_messages(prior_context, user_message);
        let definitions = self.tools.definitions();
        let options = ChatOptions::new()
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        let tool_ctx = ToolContext::new()
            .with_channel(&self.settings.channel, "local")
            .with_request_id(request_id);

        info!(
            tools = definitions.len(),
            seeded = messages.len(),
            "Agent run started"
        );

        let mut pieces: Vec<String> = Vec::new();
        let mut usage = Usage::default();
        let mut tool_calls = 0usize;
        let mut iterations = 0u32;
        let mut finished = false;

        while iterations < max_iterations {
            iterations += 1;
            debug!(iteration = iterations, max_iterations, "Calling model");

            let response = self
                .call_model(messages.clone(), definitions.clone(), options.clone())
                .await?;
            if let Some(u) = response.usage.as_ref() {
                usage.accumulate(u);
            }

            let text = response.content.trim();
            if !text.is_empty() {
                pieces.push(text.to_string());
            }

            if !response.is_tool_request() {
                finished = true;
                break;
            }

            debug!(
                iteration = iterations,
                calls = response.tool_calls.len(),
                "Model requested tools"
            );
            messages.push(Message::assistant_with_tools(
                &response.content,
                response
                    .tool_calls
                    .iter()
                    .map(|tc| ToolCall::new(&tc.id, &tc.name, &tc.arguments))
                    .collect(),
            ));

            let results = join_all(
                response
                    .tool_calls
                    .iter()
                    .map(|call| self.execute_call(call, &tool_ctx)),
            )
            .await;
            tool_calls += results.len();
            messages.push(Message::tool_results(results));
        }

        let hit_iteration_limit = !finished;
        if hit_iteration_limit {
            warn!(iterations, "Agent run reached iteration limit");
            pieces.push(ITERATION_LIMIT_NOTICE.to_string());
        }

        info!(
            iterations,
            tool_calls,
            hit_iteration_limit,
            duration_ms = start.elapsed().as_millis() as u64,
            "Agent run finished"
        );

        Ok(AgentReply {
            text: pieces.join("\n\n"),
            iterations,
            tool_calls,
            hit_iteration_limit,
            usage,
        })
    }

    async fn call_model(
        &self,
        messages: Vec<Message>,
        definitions: Vec<ToolDefinition>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let deadline = self.settings.model_timeout + MODEL_TIMEOUT_GRACE;
        let call = self.provider.chat(
            messages,
            definitions,
            self.settings.model.as_deref(),
            options,
        );
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(BreakwaterError::Timeout {
                operation: format!("model call ({})", self.provider.name()),
                elapsed: deadline,
            }),
        }
    }

    async fn execute_call(&self, call: &LLMToolCall, ctx: &ToolContext) -> ToolResult {
        let raw = call.arguments.trim();
        let args = if raw.is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str::<Value>(raw)
        };

        match args {
            Ok(args) => {
                let output = self.tools.execute_with_context(&call.name, args, ctx).await;
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: output.content,
                    is_error: output.is_error,
                }
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                let message = format!("Invalid arguments for '{}': {}", call.name, e);
                ToolResult::error(&call.id, &truncate_chars(&message, MAX_TOOL_ERROR_CHARS))
            }
        }
    }
}
