//! Context builder for agent runs
//!
//! This module provides the `ContextBuilder` for constructing the system prompt
//! and the seed message list of a run. It also provides `RuntimeContext` for
//! injecting environment-awareness (channel, tools, current time) into the
//! system prompt.

use crate::session::{Message, Role};

/// Default number of prior messages seeded into a run.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Runtime context appended to the system prompt.
///
/// # Example
///
/// ```rust
/// use breakwater::agent::RuntimeContext;
///
/// let ctx = RuntimeContext::new()
///     .with_channel("cli")
///     .with_tools(vec!["web_search".to_string(), "read_url".to_string()]);
///
/// let rendered = ctx.render().unwrap();
/// assert!(rendered.contains("Channel: cli"));
/// assert!(rendered.contains("web_search, read_url"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    /// The channel the agent is running on (e.g., "cli")
    pub channel: Option<String>,
    /// Names of available tools
    pub available_tools: Vec<String>,
    /// Current timestamp (RFC 3339)
    pub current_time: Option<String>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    /// Set the current time to now (UTC, RFC 3339).
    pub fn with_current_time(mut self) -> Self {
        self.current_time = Some(chrono::Utc::now().to_rfc3339());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_none() && self.available_tools.is_empty() && self.current_time.is_none()
    }

    /// Render as a markdown section, or `None` when nothing is set.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if let Some(ref channel) = self.channel {
            parts.push(format!("- Channel: {}", channel));
        }
        if !self.available_tools.is_empty() {
            parts.push(format!(
                "- Available tools: {}",
                self.available_tools.join(", ")
            ));
        }
        if let Some(ref time) = self.current_time {
            parts.push(format!("- Current time: {}", time));
        }

        Some(format!("## Runtime Context\n\n{}", parts.join("\n")))
    }
}

/// Builds the seed messages of one agent run.
///
/// # Example
///
/// ```rust
/// use breakwater::agent::ContextBuilder;
/// use breakwater::session::Message;
///
/// let builder = ContextBuilder::new("You are terse.").with_history_window(2);
/// let prior = vec![
///     Message::user("one"),
///     Message::assistant("two"),
///     Message::user("three"),
/// ];
/// let messages = builder.build_messages(&prior, "four");
/// // system + last 2 prior + new user message
/// assert_eq!(messages.len(), 4);
/// assert_eq!(messages[1].content, "two");
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    runtime_context: Option<RuntimeContext>,
    history_window: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            runtime_context: None,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Add runtime context; an empty context is ignored.
    pub fn with_runtime_context(mut self, ctx: RuntimeContext) -> Self {
        if !ctx.is_empty() {
            self.runtime_context = Some(ctx);
        }
        self
    }

    /// Number of prior messages to keep.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build_system_message(&self) -> Message {
        let mut content = self.system_prompt.clone();
        if let Some(rendered) = self.runtime_context.as_ref().and_then(|c| c.render()) {
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            content.push_str(&rendered);
        }
        Message::system(&content)
    }

    /// System message, the last `history_window` prior messages, then the
    /// user message.
    ///
    /// System messages in the prior context are skipped, and tool-result
    /// messages at the start of the window are dropped since the tool calls
    /// they answer fell outside it.
    pub fn build_messages(&self, prior: &[Message], user_input: &str) -> Vec<Message> {
        let conversational: Vec<&Message> =
            prior.iter().filter(|m| m.role != Role::System).collect();
        let start = conversational.len().saturating_sub(self.history_window);
        let window = conversational[start..]
            .iter()
            .skip_while(|m| m.role == Role::Tool)
            .map(|m| (*m).clone());

        let mut messages = vec![self.build_system_message()];
        messages.extend(window);
        messages.push(Message::user(user_input));
        messages
    }
}
