//! Conversation types for Breakwater
//!
//! Messages, roles, tool calls and tool results, plus a small in-memory
//! [`Conversation`] used by interactive front ends to carry history between
//! agent runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An in-memory conversation: the prior context handed to each agent run.
///
/// Nothing is persisted; the conversation lives as long as its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier for this conversation (e.g. "cli:local")
    pub key: String,
    /// Ordered list of messages
    pub messages: Vec<Message>,
    /// When this conversation was created
    pub created_at: DateTime<Utc>,
    /// When this conversation was last modified
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    ///
    /// # Example
    /// ```
    /// use breakwater::session::Conversation;
    ///
    /// let conversation = Conversation::new("cli:local");
    /// assert!(conversation.is_empty());
    /// ```
    pub fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump `updated_at`.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Record one completed exchange (user turn and final assistant reply).
    pub fn record_exchange(&mut self, user: &str, reply: &str) {
        self.add_message(Message::user(user));
        self.add_message(Message::assistant(reply));
    }

    /// The last `n` messages, oldest first.
    ///
    /// # Example
    /// ```
    /// use breakwater::session::{Conversation, Message};
    ///
    /// let mut conversation = Conversation::new("test");
    /// for i in 0..8 {
    ///     conversation.add_message(Message::user(&format!("msg {i}")));
    /// }
    /// let recent = conversation.recent(5);
    /// assert_eq!(recent.len(), 5);
    /// assert_eq!(recent[0].content, "msg 3");
    /// ```
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Drop all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or carry tool
/// results back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Results for every tool call of the preceding assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
}

impl Message {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_results: None,
        }
    }

    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use breakwater::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create an assistant message with tool calls.
    ///
    /// # Example
    /// ```
    /// use breakwater::session::{Message, ToolCall};
    ///
    /// let tool_call = ToolCall::new("call_1", "web_search", r#"{"query": "rust"}"#);
    /// let msg = Message::assistant_with_tools("Let me search for that.", vec![tool_call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_results: None,
        }
    }

    /// Create the single message that carries every tool result of one
    /// iteration back to the model.
    ///
    /// # Example
    /// ```
    /// use breakwater::session::{Message, Role, ToolResult};
    ///
    /// let msg = Message::tool_results(vec![
    ///     ToolResult::success("call_1", "3 results"),
    ///     ToolResult::error("call_2", "Unknown tool: nope"),
    /// ]);
    /// assert_eq!(msg.role, Role::Tool);
    /// assert!(msg.is_tool_results());
    /// ```
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: String::new(),
            tool_calls: None,
            tool_results: Some(results),
        }
    }

    /// Check if this message has tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool results message.
    pub fn is_tool_results(&self) -> bool {
        self.role == Role::Tool && self.tool_results.is_some()
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// The outcome of one tool call, as sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this answers
    pub tool_call_id: String,
    /// Result text (or error text)
    pub content: String,
    /// Whether the call failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            content: content.to_string(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            content: content.to_string(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_new() {
        let conversation = Conversation::new("test");
        assert_eq!(conversation.key, "test");
        assert!(conversation.is_empty());
        assert!(conversation.created_at <= conversation.updated_at);
    }

    #[test]
    fn test_record_exchange_and_recent() {
        let mut conversation = Conversation::new("test");
        conversation.record_exchange("hi", "hello");
        conversation.record_exchange("how are you", "fine");
        assert_eq!(conversation.message_count(), 4);

        let recent = conversation.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].role, Role::Assistant);
        assert_eq!(recent[2].content, "fine");
        assert_eq!(conversation.recent(100).len(), 4);
        assert!(conversation.recent(0).is_empty());
    }

    #[test]
    fn test_conversation_clear() {
        let mut conversation = Conversation::new("test");
        conversation.add_message(Message::user("Hello"));
        conversation.clear();
        assert!(conversation.is_empty());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("a").role, Role::User);
        assert_eq!(Message::assistant("b").role, Role::Assistant);
        assert_eq!(Message::system("c").role, Role::System);
        assert!(!Message::user("a").has_tool_calls());
    }

    #[test]
    fn test_tool_results_message() {
        let msg = Message::tool_results(vec![
            ToolResult::success("call_1", "ok"),
            ToolResult::error("call_2", "boom"),
        ]);
        assert!(msg.is_tool_results());
        let results = msg.tool_results.unwrap();
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_results").is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Tool.to_string(), "tool");
    }
}
