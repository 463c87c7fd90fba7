//! Tool types for Breakwater
//!
//! The [`Tool`] trait, its structured [`ToolOutput`], and the per-call
//! [`ToolContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Broad grouping used when listing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Read-only network operations (web search, fetch).
    NetworkRead,
    /// Memory / note lookups.
    Memory,
    /// Pure computation, no external I/O.
    General,
}

impl ToolCategory {
    /// Return an array of all category variants.
    pub fn all() -> [ToolCategory; 3] {
        [
            ToolCategory::NetworkRead,
            ToolCategory::Memory,
            ToolCategory::General,
        ]
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkRead => write!(f, "network_read"),
            Self::Memory => write!(f, "memory"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Result of a tool execution.
///
/// Success and failure are carried by `is_error`, never by a text prefix, so
/// the agent loop and the provider can forward the flag to the model as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text returned to the model.
    pub content: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful result.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Trait that all tools must implement.
///
/// Tools are executable functions that the LLM can call to perform actions
/// like searching the web or looking up notes. Tools that do external I/O
/// wrap it in their dependency's circuit breaker.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use breakwater::tools::{Tool, ToolContext, ToolOutput};
/// use breakwater::error::Result;
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str { "my_tool" }
///     fn description(&self) -> &str { "Does something useful" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": {},
///             "required": []
///         })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::success("Done!"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    ///
    /// This name is used to identify the tool when the LLM requests it.
    /// It should be unique within a registry.
    fn name(&self) -> &str;

    /// Get the tool description sent to the LLM.
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returning `Err` is fine: the registry converts it into a short error
    /// output for the model.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;

    /// Tool category, used for grouping in listings.
    fn category(&self) -> ToolCategory {
        ToolCategory::General
    }
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The channel name (e.g., "cli")
    pub channel: Option<String>,
    /// The chat/conversation ID within the channel
    pub chat_id: Option<String>,
    /// Identifier of the agent run that issued the call
    pub request_id: Option<String>,
}

impl ToolContext {
    /// Create a new empty tool context.
    ///
    /// # Example
    /// ```
    /// use breakwater::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_channel("cli", "local");
    /// assert_eq!(ctx.channel.as_deref(), Some("cli"));
    /// assert_eq!(ctx.chat_id.as_deref(), Some("local"));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel and chat ID.
    pub fn with_channel(mut self, channel: &str, chat_id: &str) -> Self {
        self.channel = Some(channel.to_string());
        self.chat_id = Some(chat_id.to_string());
        self
    }

    /// Set the agent run identifier.
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}
