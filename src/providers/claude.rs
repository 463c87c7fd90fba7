//! Claude (Anthropic) LLM provider implementation
//!
//! This module implements the `LLMProvider` trait for Anthropic's Messages
//! API, handling message conversion, tool calls, and response parsing.
//!
//! # Example
//!
//! ```rust,ignore
//! use breakwater::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//! use breakwater::session::Message;
//!
//! async fn example() -> breakwater::Result<()> {
//!     let provider = ClaudeProvider::new("your-api-key")?;
//!
//!     let messages = vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Hello!"),
//!     ];
//!
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::default())
//!         .await?;
//!
//!     println!("Claude: {}", response.content);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{BreakwaterError, ProviderError, Result};
use crate::session::{Message, Role};

use super::{
    parse_provider_error, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, StopReason,
    ToolDefinition, Usage,
};

/// The Claude API base URL.
const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

/// The default Claude model to use.
const DEFAULT_MODEL: &str = crate::config::DEFAULT_MODEL;

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude/Anthropic LLM provider.
///
/// Implements the `LLMProvider` trait for Anthropic's Claude API.
/// Handles message format conversion, tool calling, and response parsing.
pub struct ClaudeProvider {
    /// API key for authentication
    api_key: String,
    /// Base URL; `/v1/messages` is appended
    api_base: String,
    /// HTTP client for making requests
    client: Client,
}

impl std::fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// An empty key is a configuration error, reported here rather than on
    /// the first request.
    ///
    /// # Example
    /// ```
    /// use breakwater::providers::claude::ClaudeProvider;
    /// use breakwater::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx").unwrap();
    /// assert_eq!(provider.name(), "claude");
    /// assert!(ClaudeProvider::new("").is_err());
    /// ```
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(api_key, client)
    }

    /// Create a new Claude provider with a custom HTTP client.
    pub fn with_client(api_key: &str, client: Client) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(BreakwaterError::Config(
                "Anthropic API key is not configured (providers.anthropic.api_key)".into(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            api_base: CLAUDE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different base URL (proxies, gateways).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(DEFAULT_MODEL);

        // Convert messages to Claude format, extracting system message
        let (system, claude_messages) = convert_messages(messages)?;

        let request = ClaudeRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(8192),
            messages: claude_messages,
            system,
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
            top_p: options.top_p,
            stop_sequences: options.stop,
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BreakwaterError::from(parse_provider_error(
                status,
                &describe_error_body(&error_text),
            )));
        }

        let body = response.text().await?;
        let claude_response: ClaudeResponse = serde_json::from_str(&body)
            .map_err(|e| BreakwaterError::from(ProviderError::Format(e.to_string())))?;
        Ok(convert_response(claude_response))
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Human-readable body for a typed error.
fn describe_error_body(error_text: &str) -> String {
    match serde_json::from_str::<ClaudeErrorResponse>(error_text) {
        Ok(error_response) => format!(
            "Claude API error: {} - {}",
            error_response.error.r#type, error_response.error.message
        ),
        Err(_) => format!("Claude API error: {}", error_text),
    }
}

// ============================================================================
// Claude API Request Types
// ============================================================================

/// Claude API request body.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    /// Conversation messages (excluding system)
    messages: Vec<ClaudeMessage>,
    /// System prompt (separate from messages in Claude API)
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

/// A message in Claude's format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    /// Role: "user" or "assistant"
    role: String,
    content: ClaudeContent,
}

/// Claude message content - can be simple text or content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

/// A content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Tool use (assistant requesting to call a tool)
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Tool result (user providing result of tool execution)
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Claude tool definition.
#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

/// Claude API response body.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    usage: ClaudeUsage,
    /// Stop reason (e.g., "end_turn", "tool_use")
    stop_reason: Option<String>,
}

/// Claude API error response.
#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert Breakwater messages to Claude's format.
///
/// System messages are joined into the separate `system` field. A tool
/// results message becomes one user message of `tool_result` blocks. Leading
/// assistant messages (a history window that starts mid-exchange) are
/// dropped, since the API requires the first turn to come from the user.
fn convert_messages(messages: Vec<Message>) -> Result<(Option<String>, Vec<ClaudeMessage>)> {
    let mut system_parts: Vec<String> = Vec::new();
    let mut claude_messages: Vec<ClaudeMessage> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(msg.content),
            Role::User => claude_messages.push(ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeContent::Text(msg.content),
            }),
            Role::Assistant => {
                if claude_messages.is_empty() {
                    continue;
                }
                match msg.tool_calls {
                    Some(tool_calls) if !tool_calls.is_empty() => {
                        let mut blocks: Vec<ClaudeContentBlock> = Vec::new();
                        if !msg.content.is_empty() {
                            blocks.push(ClaudeContentBlock::Text { text: msg.content });
                        }
                        for tc in tool_calls {
                            let input: serde_json::Value = serde_json::from_str(&tc.arguments)
                                .unwrap_or_else(|_| serde_json::json!({}));
                            blocks.push(ClaudeContentBlock::ToolUse {
                                id: tc.id,
                                name: tc.name,
                                input,
                            });
                        }
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Blocks(blocks),
                        });
                    }
                    _ => claude_messages.push(ClaudeMessage {
                        role: "assistant".to_string(),
                        content: ClaudeContent::Text(msg.content),
                    }),
                }
            }
            Role::Tool => {
                let results = msg.tool_results.unwrap_or_default();
                if results.is_empty() {
                    continue;
                }
                let blocks = results
                    .into_iter()
                    .map(|r| ClaudeContentBlock::ToolResult {
                        tool_use_id: r.tool_call_id,
                        content: r.content,
                        is_error: r.is_error.then_some(true),
                    })
                    .collect();
                claude_messages.push(ClaudeMessage {
                    role: "user".to_string(),
                    content: ClaudeContent::Blocks(blocks),
                });
            }
        }
    }

    if claude_messages.is_empty() {
        return Err(BreakwaterError::Provider(
            "Claude request needs at least one user message".into(),
        ));
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    Ok((system, claude_messages))
}

/// Convert Breakwater tool definitions to Claude API format.
fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|t| ClaudeTool {
            name: t.name,
            description: t.description,
            input_schema: t.parameters,
        })
        .collect()
}

/// Convert Claude API response to Breakwater LLMResponse.
fn convert_response(response: ClaudeResponse) -> LLMResponse {
    let mut content = String::new();
    let mut tool_calls: Vec<LLMToolCall> = Vec::new();

    for block in response.content {
        match block {
            ClaudeContentBlock::Text { text } => {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&text);
            }
            ClaudeContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_string());
                tool_calls.push(LLMToolCall::new(&id, &name, &arguments));
            }
            ClaudeContentBlock::ToolResult { .. } => {}
        }
    }

    LLMResponse {
        content,
        tool_calls,
        stop_reason: StopReason::from_api(response.stop_reason.as_deref()),
        usage: Some(Usage::new(
            response.usage.input_tokens,
            response.usage.output_tokens,
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
