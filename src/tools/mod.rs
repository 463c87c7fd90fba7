//! Tools module - Tool definitions and execution for LLM function calling
//!
//! This module provides the infrastructure for defining and executing tools
//! that the model can call during an agent run.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolOutput`: Result text plus an explicit error flag
//! - `ToolContext`: Execution context (channel, chat_id, request_id)
//! - `ToolRegistry`: Catalogue of tools, dispatch by name
//!
//! # Built-in Tools
//!
//! - `WebSearchTool` (`web_search`): Brave Search, `search_api` breaker
//! - `ReadUrlTool` (`read_url`): page reader, `search_api` breaker
//! - `MemoryLookupTool` (`memory_lookup`): note lookup, `vector_store` breaker
//!
//! Nothing registers itself: [`register_builtin_tools`] builds the catalogue
//! from configuration.

pub mod memory;
mod registry;
mod types;
pub mod web;

pub use memory::{InMemoryStore, MemoryEntry, MemoryLookupTool, MemoryStore};
pub use registry::{ToolRegistry, DEFAULT_TOOL_TIMEOUT, MAX_TOOL_ERROR_CHARS};
pub use types::{Tool, ToolCategory, ToolContext, ToolOutput};
pub use web::{ReadUrlTool, WebSearchTool};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::resilience::{CircuitManager, Dependency};

/// Register the built-in tools enabled by `config`.
///
/// `web_search` is skipped when no API key is configured. A memory file that
/// cannot be read or parsed fails startup.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    config: &ToolsConfig,
    circuits: &CircuitManager,
) -> Result<()> {
    let search_api = circuits.dependency(Dependency::SearchApi)?;

    match config
        .web_search
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
    {
        Some(key) => {
            let tool = WebSearchTool::new(key, search_api.clone())?
                .with_max_results(config.web_search.max_results as usize)
                .with_timeout(Duration::from_secs(config.web_search.timeout_secs));
            registry.register(Box::new(tool));
        }
        None => info!(tool = "web_search", "No Brave Search API key; tool disabled"),
    }

    if config.read_url.enabled {
        let tool = ReadUrlTool::new(search_api)
            .with_max_chars(config.read_url.max_chars)
            .with_timeout(Duration::from_secs(config.read_url.timeout_secs));
        registry.register(Box::new(tool));
    }

    if config.memory.enabled {
        let store = match config.memory.file.as_deref() {
            Some(path) => InMemoryStore::load(Path::new(path))?,
            None => InMemoryStore::default(),
        };
        let tool = MemoryLookupTool::new(
            Arc::new(store),
            circuits.dependency(Dependency::VectorStore)?,
        )
        .with_timeout(Duration::from_secs(config.memory.timeout_secs));
        registry.register(Box::new(tool));
    }

    Ok(())
}
