//! Agent module - the bounded model/tool loop
//!
//! An [`AgenticLoop`] run seeds a message list from the prior context, then
//! alternates model calls and tool calls until the model gives a terminal
//! answer or `max_iterations` is reached.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │   caller    │────>│ AgenticLoop  │────>│ GuardedProvider  │
//! │ (CLI, ...)  │     │              │     │ chat_api + retry │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐     ┌──────────────────┐
//!                     │ ToolRegistry │────>│ tool breakers    │
//!                     └──────────────┘     └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use breakwater::agent::{AgenticLoop, LoopSettings};
//! use breakwater::tools::ToolRegistry;
//!
//! async fn ask(provider: Arc<dyn breakwater::providers::LLMProvider>) -> breakwater::Result<()> {
//!     let tools = Arc::new(ToolRegistry::new());
//!     let agent = AgenticLoop::new(provider, tools, LoopSettings::default());
//!     let reply = agent.run("What changed in Rust 1.80?", None, &[]).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

mod context;
mod r#loop;

pub use context::{ContextBuilder, RuntimeContext, DEFAULT_HISTORY_WINDOW};
pub use r#loop::{
    AgentReply, AgenticLoop, LoopSettings, DEFAULT_MAX_ITERATIONS, ITERATION_LIMIT_NOTICE,
    MODEL_TIMEOUT_GRACE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn test_loop_settings_follow_agent_config() {
        let mut config = AgentConfig::default();
        config.max_iterations = 7;
        config.model_timeout_secs = 12;

        let settings = LoopSettings::from_config(&config);
        assert_eq!(settings.max_iterations, 7);
        assert_eq!(settings.model_timeout.as_secs(), 12);
        assert_eq!(settings.history_window, DEFAULT_HISTORY_WINDOW);
        assert_eq!(settings.channel, "cli");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LoopSettings::default().max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(DEFAULT_MAX_ITERATIONS, 5);
    }
}
