//! Configuration management for Breakwater
//!
//! Configuration is loaded from `~/.breakwater/config.json` (or an explicit
//! path) with `BREAKWATER_*` environment variable overrides applied on top.
//! There is no global configuration instance: the loaded [`Config`] is handed
//! to [`crate::runtime::Runtime::from_config`] once at startup.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{BreakwaterError, Result};
use crate::resilience::Dependency;

impl Config {
    /// Returns the Breakwater configuration directory path (~/.breakwater)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".breakwater")
    }

    /// Returns the path to the config file (~/.breakwater/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// Environment variables can override config values using the pattern:
    /// `BREAKWATER_SECTION_KEY`
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                BreakwaterError::Config(format!("invalid config {}: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Keys follow the pattern `BREAKWATER_SECTION_KEY`. Unparseable numeric
    /// values are ignored, leaving the file or default value in place.
    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|v| v.trim().parse().ok())
        }

        // Agent
        if let Some(val) = lookup("BREAKWATER_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_MAX_TOKENS")) {
            self.agent.max_tokens = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_TEMPERATURE")) {
            self.agent.temperature = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_MAX_ITERATIONS")) {
            self.agent.max_iterations = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_HISTORY_WINDOW")) {
            self.agent.history_window = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_MODEL_TIMEOUT_SECS")) {
            self.agent.model_timeout_secs = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_AGENT_TOOL_TIMEOUT_SECS")) {
            self.agent.tool_timeout_secs = v;
        }

        // Provider
        if let Some(val) = lookup("BREAKWATER_PROVIDERS_ANTHROPIC_API_KEY") {
            self.providers
                .anthropic
                .get_or_insert_with(ProviderConfig::default)
                .api_key = Some(val);
        }
        if let Some(val) = lookup("BREAKWATER_PROVIDERS_ANTHROPIC_API_BASE") {
            self.providers
                .anthropic
                .get_or_insert_with(ProviderConfig::default)
                .api_base = Some(val);
        }

        // Breakers
        if let Some(v) = parsed(lookup("BREAKWATER_BREAKERS_THRESHOLD")) {
            self.breakers.default.threshold = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_BREAKERS_COOLDOWN_SECS")) {
            self.breakers.default.cooldown_secs = v;
        }

        // Retry
        if let Some(v) = parsed(lookup("BREAKWATER_RETRY_ENABLED")) {
            self.retry.enabled = v;
        }
        if let Some(v) = parsed(lookup("BREAKWATER_RETRY_MAX_RETRIES")) {
            self.retry.max_retries = v;
        }

        // Tools
        if let Some(val) = lookup("BREAKWATER_TOOLS_WEB_SEARCH_API_KEY") {
            self.tools.web_search.api_key = Some(val);
        }
        if let Some(val) = lookup("BREAKWATER_TOOLS_MEMORY_FILE") {
            self.tools.memory.file = Some(val);
        }

        // Logging
        if let Some(val) = lookup("BREAKWATER_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check semantic constraints the type system cannot express.
    ///
    /// Returns the first violation as a `Config` error.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(BreakwaterError::Config(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.agent.model.trim().is_empty() {
            return Err(BreakwaterError::Config("agent.model must not be empty".into()));
        }
        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(BreakwaterError::Config(
                "agent timeouts must be greater than zero".into(),
            ));
        }
        let tool_timeouts = [
            ("tools.web_search.timeout_secs", self.tools.web_search.timeout_secs),
            ("tools.read_url.timeout_secs", self.tools.read_url.timeout_secs),
            ("tools.memory.timeout_secs", self.tools.memory.timeout_secs),
        ];
        for (field, secs) in tool_timeouts {
            if secs >= self.agent.tool_timeout_secs {
                return Err(BreakwaterError::Config(format!(
                    "{} ({}s) must be below agent.tool_timeout_secs ({}s)",
                    field, secs, self.agent.tool_timeout_secs
                )));
            }
        }
        if self.breakers.default.threshold == 0 {
            return Err(BreakwaterError::Config(
                "breakers.default.threshold must be at least 1".into(),
            ));
        }
        for (name, settings) in &self.breakers.overrides {
            if Dependency::from_name(name).is_none() {
                return Err(BreakwaterError::Config(format!(
                    "breakers.overrides: unknown dependency '{}'",
                    name
                )));
            }
            if settings.threshold == 0 {
                return Err(BreakwaterError::Config(format!(
                    "breakers.overrides.{}.threshold must be at least 1",
                    name
                )));
            }
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(BreakwaterError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// The Anthropic API key, if one is configured and non-empty.
    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.providers
            .anthropic
            .as_ref()
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.history_window, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.agent.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "agent": {"max_iterations": 3},
                "breakers": {"overrides": {"search_api": {"threshold": 2, "cooldown_secs": 1}}}
            }"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.history_window, 5);
        let search = config.breakers.settings_for("search_api");
        assert_eq!(search.threshold, 2);
        assert_eq!(search.cooldown_secs, 1);
        assert_eq!(config.breakers.settings_for("chat_api").threshold, 5);
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, BreakwaterError::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.permissions.admins.push("42".into());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.permissions.admins, vec!["42".to_string()]);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("BREAKWATER_AGENT_MAX_ITERATIONS", "7"),
            ("BREAKWATER_PROVIDERS_ANTHROPIC_API_KEY", "sk-test"),
            ("BREAKWATER_BREAKERS_THRESHOLD", "3"),
            ("BREAKWATER_RETRY_ENABLED", "false"),
            ("BREAKWATER_TOOLS_WEB_SEARCH_API_KEY", "brave"),
        ]));
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.anthropic_api_key(), Some("sk-test"));
        assert_eq!(config.breakers.default.threshold, 3);
        assert!(!config.retry.enabled);
        assert_eq!(config.tools.web_search.api_key.as_deref(), Some("brave"));
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[("BREAKWATER_AGENT_MAX_ITERATIONS", "many")]));
        assert_eq!(config.agent.max_iterations, 5);
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = Config::default();
        config.agent.max_iterations = 0;
        assert!(matches!(
            config.validate(),
            Err(BreakwaterError::Config(msg)) if msg.contains("max_iterations")
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_override() {
        let mut config = Config::default();
        config
            .breakers
            .overrides
            .insert("serch_api".into(), BreakerSettings::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.breakers.default.threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_tool_ceiling_below_per_tool_timeout() {
        let mut config = Config::default();
        config.agent.tool_timeout_secs = 10;
        assert!(matches!(
            config.validate(),
            Err(BreakwaterError::Config(msg)) if msg.contains("tools.web_search.timeout_secs")
        ));

        config.tools.web_search.timeout_secs = 5;
        assert!(matches!(
            config.validate(),
            Err(BreakwaterError::Config(msg)) if msg.contains("tools.read_url.timeout_secs")
        ));

        config.tools.read_url.timeout_secs = 9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_equal_tool_timeouts() {
        let mut config = Config::default();
        config.tools.memory.timeout_secs = config.agent.tool_timeout_secs;
        assert!(matches!(
            config.validate(),
            Err(BreakwaterError::Config(msg)) if msg.contains("tools.memory.timeout_secs")
        ));
    }

    #[test]
    fn test_empty_api_key_is_treated_as_missing() {
        let mut config = Config::default();
        config.providers.anthropic = Some(ProviderConfig {
            api_key: Some("  ".into()),
            api_base: None,
        });
        assert_eq!(config.anthropic_api_key(), None);
    }
}
