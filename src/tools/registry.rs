//! Tool registry for Breakwater
//!
//! This module provides the `ToolRegistry` struct for managing and executing tools.
//! Tools are registered once at startup, then the registry is shared read-only.
//! Execution never fails: unknown tools, tool errors, panics and timeouts all
//! come back as an error [`ToolOutput`] the model can read.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tracing::{info, warn};

use crate::providers::ToolDefinition;
use crate::utils::string::truncate_chars;

use super::{Tool, ToolCategory, ToolContext, ToolOutput};

/// Upper bound on the length of error text fed back to the model.
pub const MAX_TOOL_ERROR_CHARS: usize = 100;

/// Default ceiling for one tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A registry for managing and executing tools.
///
/// # Example
///
/// ```rust
/// use breakwater::tools::ToolRegistry;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let registry = ToolRegistry::new();
/// let output = registry.execute("nope", json!({})).await;
/// assert!(output.is_error);
/// assert!(output.content.contains("Unknown tool"));
/// # });
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    tool_timeout: Duration,
}

impl ToolRegistry {
    /// Create a new empty tool registry with the default execution ceiling.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set the ceiling applied to every tool execution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Register a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replacing previously registered tool");
        } else {
            info!(tool = %name, "Registering tool");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool with an empty context.
    pub async fn execute(&self, name: &str, args: Value) -> ToolOutput {
        self.execute_with_context(name, args, &ToolContext::default())
            .await
    }

    /// Execute a tool by name.
    ///
    /// The call is bounded by the registry timeout. Errors, panics and
    /// timeouts become error outputs, and every error output (including one
    /// a tool returns itself) is cut to [`MAX_TOOL_ERROR_CHARS`] characters.
    pub async fn execute_with_context(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> ToolOutput {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "Model requested unknown tool");
                return error_output(format!("Unknown tool: {}", name));
            }
        };

        let start = Instant::now();
        let guarded = AssertUnwindSafe(tool.execute(args, ctx)).catch_unwind();
        let outcome = tokio::time::timeout(self.tool_timeout, guarded).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(output))) => {
                info!(
                    tool = name,
                    duration_ms,
                    is_error = output.is_error,
                    "Tool executed"
                );
                if output.is_error {
                    error_output(output.content)
                } else {
                    output
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(tool = name, error = %e, duration_ms, "Tool execution failed");
                error_output(format!("Tool '{}' failed: {}", name, e))
            }
            Ok(Err(panic)) => {
                let detail = panic_message(panic.as_ref());
                warn!(tool = name, panic = %detail, duration_ms, "Tool panicked");
                error_output(format!("Tool '{}' crashed: {}", name, detail))
            }
            Err(_) => {
                warn!(
                    tool = name,
                    duration_ms,
                    timeout_ms = self.tool_timeout.as_millis() as u64,
                    "Tool timed out"
                );
                error_output(format!(
                    "Tool '{}' timed out after {}ms",
                    name,
                    self.tool_timeout.as_millis()
                ))
            }
        }
    }

    /// Full catalogue in model schema shape, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// `(name, category, description)` for every tool, sorted by name.
    pub fn summaries(&self) -> Vec<(&str, ToolCategory, &str)> {
        let mut rows: Vec<_> = self
            .tools
            .values()
            .map(|t| (t.name(), t.category(), t.description()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn error_output(text: String) -> ToolOutput {
    ToolOutput::error(truncate_chars(&text, MAX_TOOL_ERROR_CHARS))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
