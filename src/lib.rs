//! Breakwater - resilience-gated agent runtime
//!
//! Circuit breakers and retries around every external dependency, a bounded
//! tool-calling agent loop and permission-tiered slash commands.

pub mod agent;
pub mod commands;
pub mod config;
pub mod error;
pub mod providers;
pub mod resilience;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentReply, AgenticLoop, LoopSettings};
pub use commands::{CommandRouter, DispatchOutcome, PermissionTier};
pub use config::Config;
pub use error::{BreakwaterError, ProviderError, Result};
pub use providers::{ChatOptions, ClaudeProvider, LLMProvider, LLMResponse, LLMToolCall, Usage};
pub use resilience::{CircuitBreaker, CircuitManager, CircuitState, RetryPolicy};
pub use runtime::Runtime;
pub use session::{Conversation, Message, Role, ToolCall};
pub use tools::{Tool, ToolOutput, ToolRegistry};
