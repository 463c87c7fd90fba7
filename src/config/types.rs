//! Configuration type definitions for Breakwater
//!
//! This module defines all configuration structs used throughout the crate.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::commands::PermissionTier;

/// Main configuration struct for Breakwater
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent loop configuration (model, tokens, iterations, timeouts)
    pub agent: AgentConfig,
    /// LLM provider configurations
    pub providers: ProvidersConfig,
    /// Circuit breaker thresholds and cooldowns
    pub breakers: BreakersConfig,
    /// Retry/backoff policy for the chat provider
    pub retry: RetryConfig,
    /// Built-in tool configuration
    pub tools: ToolsConfig,
    /// Command permission tiers
    pub permissions: PermissionsConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier passed to the provider
    pub model: String,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum model round-trips per run
    pub max_iterations: u32,
    /// Number of prior conversation messages seeded into each run
    pub history_window: usize,
    /// Deadline for a single model call, retries included
    pub model_timeout_secs: u64,
    /// Ceiling for a single tool execution
    pub tool_timeout_secs: u64,
    /// Base system prompt
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_iterations: crate::agent::DEFAULT_MAX_ITERATIONS,
            history_window: crate::agent::DEFAULT_HISTORY_WINDOW,
            model_timeout_secs: 90,
            tool_timeout_secs: 30,
            system_prompt: "You are a helpful assistant. Use the available tools when they \
                            help answer the user, and answer directly when they do not."
                .to_string(),
        }
    }
}

impl AgentConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for all LLM providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Anthropic Messages API
    pub anthropic: Option<ProviderConfig>,
}

/// Generic provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

// ============================================================================
// Circuit Breaker Configuration
// ============================================================================

/// Threshold and cooldown for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker
    pub threshold: u32,
    /// Seconds an open breaker waits before a trial call
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_secs: 60,
        }
    }
}

impl BreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Breaker settings: a default plus per-dependency overrides keyed by
/// dependency name (`search_api`, `chat_api`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakersConfig {
    pub default: BreakerSettings,
    pub overrides: HashMap<String, BreakerSettings>,
}

impl BreakersConfig {
    /// Settings for `name`, falling back to the default.
    pub fn settings_for(&self, name: &str) -> BreakerSettings {
        self.overrides.get(name).copied().unwrap_or(self.default)
    }
}

// ============================================================================
// Retry Configuration
// ============================================================================

/// Retry/backoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether model calls are retried at all
    pub enabled: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Tools configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub web_search: WebSearchConfig,
    pub read_url: ReadUrlConfig,
    pub memory: MemoryToolConfig,
}

/// Brave web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Brave Search API key; the tool is not registered without one
    pub api_key: Option<String>,
    /// Results returned when the model does not ask for a count
    pub max_results: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: 5,
            timeout_secs: 15,
        }
    }
}

/// URL reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadUrlConfig {
    pub enabled: bool,
    /// Maximum characters of page text returned to the model
    pub max_chars: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ReadUrlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: 20_000,
            timeout_secs: 20,
        }
    }
}

/// Memory lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryToolConfig {
    pub enabled: bool,
    /// Optional JSON file of notes (`[{"key": "...", "text": "...", "tags": [...]}]`)
    pub file: Option<String>,
    /// Per-lookup timeout
    pub timeout_secs: u64,
}

impl Default for MemoryToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
            timeout_secs: 5,
        }
    }
}

// ============================================================================
// Permissions Configuration
// ============================================================================

/// User-id lists per permission tier. Unlisted callers are guests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub admins: Vec<String>,
    pub developers: Vec<String>,
    pub users: Vec<String>,
    /// Tier granted to the local CLI operator
    pub cli_tier: PermissionTier,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            developers: Vec::new(),
            users: Vec::new(),
            cli_tier: PermissionTier::Admin,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Component,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default level/filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Append log lines to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
