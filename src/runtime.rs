//! Process wiring.
//!
//! [`Runtime`] builds every long-lived component once from a [`Config`] and
//! hands them out as `Arc`s: the circuit manager, the tool registry, the
//! command router and the agent loop. Nothing is global.

use std::sync::Arc;

use tracing::info;

use crate::agent::{AgenticLoop, LoopSettings};
use crate::commands::{register_builtin_commands, CommandRouter, PermissionResolver};
use crate::config::Config;
use crate::error::{BreakwaterError, Result};
use crate::providers::{ClaudeProvider, GuardedProvider, LLMProvider};
use crate::resilience::{CircuitManager, Clock, Dependency, RetryPolicy, SystemClock};
use crate::tools::{register_builtin_tools, ToolRegistry};

/// Every component of a running process.
pub struct Runtime {
    circuits: Arc<CircuitManager>,
    tools: Arc<ToolRegistry>,
    commands: Arc<CommandRouter>,
    permissions: PermissionResolver,
    agent: Option<AgenticLoop>,
}

impl Runtime {
    /// Build from configuration with the system clock.
    ///
    /// A missing Anthropic key leaves the agent unavailable (see
    /// [`Runtime::agent`]) so breaker and command tooling still work.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Option<Arc<dyn LLMProvider>> = match config.anthropic_api_key() {
            Some(key) => {
                let mut claude = ClaudeProvider::new(key)?;
                if let Some(base) = config
                    .providers
                    .anthropic
                    .as_ref()
                    .and_then(|p| p.api_base.as_deref())
                {
                    claude = claude.with_api_base(base);
                }
                Some(Arc::new(claude))
            }
            None => None,
        };
        Self::with_provider(config, provider, Arc::new(SystemClock))
    }

    /// Build with an explicit (unguarded) provider and clock.
    ///
    /// The provider is wrapped in the `chat_api` breaker with the configured
    /// retry policy inside it.
    pub fn with_provider(
        config: &Config,
        provider: Option<Arc<dyn LLMProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let circuits = Arc::new(CircuitManager::with_defaults(&config.breakers, clock));

        let mut registry = ToolRegistry::new().with_timeout(config.agent.tool_timeout());
        register_builtin_tools(&mut registry, &config.tools, &circuits)?;
        let tools = Arc::new(registry);

        let mut router = CommandRouter::new();
        register_builtin_commands(&mut router, circuits.clone(), tools.clone())?;
        let commands = Arc::new(router);

        let agent = match provider {
            Some(inner) => {
                let guarded = GuardedProvider::new(
                    inner,
                    circuits.dependency(Dependency::ChatApi)?,
                    RetryPolicy::from_config(&config.retry),
                    config.agent.model_timeout(),
                );
                Some(AgenticLoop::new(
                    Arc::new(guarded),
                    tools.clone(),
                    LoopSettings::from_config(&config.agent),
                ))
            }
            None => None,
        };

        info!(
            breakers = circuits.len(),
            tools = tools.len(),
            commands = commands.len(),
            agent = agent.is_some(),
            "Runtime ready"
        );

        Ok(Self {
            circuits,
            tools,
            commands,
            permissions: PermissionResolver::from_config(&config.permissions),
            agent,
        })
    }

    pub fn circuits(&self) -> &Arc<CircuitManager> {
        &self.circuits
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn commands(&self) -> &Arc<CommandRouter> {
        &self.commands
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    /// The agent loop, or a configuration error when no provider is set up.
    pub fn agent(&self) -> Result<&AgenticLoop> {
        self.agent.as_ref().ok_or_else(|| {
            BreakwaterError::Config(
                "Anthropic API key is not configured (providers.anthropic.api_key or \
                 BREAKWATER_PROVIDERS_ANTHROPIC_API_KEY)"
                    .into(),
            )
        })
    }

    pub fn has_agent(&self) -> bool {
        self.agent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_runtime_without_key_has_no_agent() {
        let runtime = Runtime::from_config(&Config::default()).unwrap();
        assert!(!runtime.has_agent());
        assert!(matches!(
            runtime.agent().err(),
            Some(BreakwaterError::Config(_))
        ));
        assert_eq!(runtime.circuits().len(), 5);
        assert_eq!(runtime.commands().len(), 5);
        assert!(runtime.tools().has("read_url"));
    }

    #[test]
    fn test_runtime_with_key_has_agent() {
        let mut config = Config::default();
        config.providers.anthropic = Some(ProviderConfig {
            api_key: Some("sk-ant-test".into()),
            api_base: Some("http://localhost:9999/".into()),
        });
        let runtime = Runtime::from_config(&config).unwrap();
        assert!(runtime.agent().is_ok());
    }

    #[test]
    fn test_invalid_config_fails_startup() {
        let mut config = Config::default();
        config.agent.max_iterations = 0;
        assert!(Runtime::from_config(&config).is_err());
    }

    #[test]
    fn test_tool_ceiling_below_read_url_timeout_fails_startup() {
        let mut config = Config::default();
        config.agent.tool_timeout_secs = 18;
        config.tools.web_search.timeout_secs = 10;
        assert!(matches!(
            Runtime::from_config(&config).err(),
            Some(BreakwaterError::Config(msg)) if msg.contains("tools.read_url.timeout_secs")
        ));
    }
}
