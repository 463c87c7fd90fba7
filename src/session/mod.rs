//! Session module - conversation state
//!
//! Provides the message model shared by providers, tools and the agent loop,
//! and an in-memory [`Conversation`] for carrying prior context between runs.
//!
//! # Example
//!
//! ```
//! use breakwater::session::{Conversation, Message, Role};
//!
//! let mut conversation = Conversation::new("cli:local");
//! conversation.add_message(Message::user("Hello!"));
//! conversation.add_message(Message::assistant("Hi there!"));
//! assert_eq!(conversation.recent(1)[0].role, Role::Assistant);
//! ```

pub mod types;

pub use types::{Conversation, Message, Role, ToolCall, ToolResult};
