//! Built-in commands.
//!
//! | command          | tier      |
//! |------------------|-----------|
//! | `help`           | guest     |
//! | `whoami`         | guest     |
//! | `status`         | user      |
//! | `tools`          | developer |
//! | `reset_circuits` | admin     |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::resilience::CircuitManager;
use crate::tools::ToolRegistry;

use super::{CommandDefinition, CommandHandler, CommandInvocation, CommandRouter, PermissionTier};

/// Register every built-in command. Fails on a name clash.
pub fn register_builtin_commands(
    router: &mut CommandRouter,
    circuits: Arc<CircuitManager>,
    tools: Arc<ToolRegistry>,
) -> Result<()> {
    router.register(
        CommandDefinition::new(
            "help",
            "List the commands you can run",
            PermissionTier::Guest,
            Arc::new(HelpCommand),
        )
        .with_category("general"),
    )?;
    router.register(
        CommandDefinition::new(
            "whoami",
            "Show your id and permission tier",
            PermissionTier::Guest,
            Arc::new(WhoamiCommand),
        )
        .with_category("general"),
    )?;
    router.register(
        CommandDefinition::new(
            "status",
            "Show circuit breaker states",
            PermissionTier::User,
            Arc::new(StatusCommand {
                circuits: circuits.clone(),
            }),
        )
        .with_category("diagnostics"),
    )?;
    router.register(
        CommandDefinition::new(
            "tools",
            "List the tools available to the agent",
            PermissionTier::Developer,
            Arc::new(ToolsCommand { tools }),
        )
        .with_category("diagnostics"),
    )?;
    router.register(
        CommandDefinition::new(
            "reset_circuits",
            "Close every circuit breaker and clear failure counts",
            PermissionTier::Admin,
            Arc::new(ResetCircuitsCommand { circuits }),
        )
        .with_category("admin"),
    )?;
    Ok(())
}

struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn handle(&self, invocation: CommandInvocation<'_>) -> Result<String> {
        let tier = invocation.caller.tier;
        let mut by_category: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for def in invocation.router.definitions() {
            if def.required_tier <= tier {
                by_category
                    .entry(def.category.as_str())
                    .or_default()
                    .push(format!("  /{} - {}", def.name, def.description));
            }
        }

        let mut out = format!("Commands available to {}:", tier);
        for (category, lines) in by_category {
            out.push_str(&format!("\n\n[{}]\n{}", category, lines.join("\n")));
        }
        Ok(out)
    }
}

struct WhoamiCommand;

#[async_trait]
impl CommandHandler for WhoamiCommand {
    async fn handle(&self, invocation: CommandInvocation<'_>) -> Result<String> {
        Ok(format!(
            "{} ({}) on {}",
            invocation.caller.id, invocation.caller.tier, invocation.context.channel
        ))
    }
}

struct StatusCommand {
    circuits: Arc<CircuitManager>,
}

#[async_trait]
impl CommandHandler for StatusCommand {
    async fn handle(&self, _invocation: CommandInvocation<'_>) -> Result<String> {
        let stats = self.circuits.stats();
        if stats.is_empty() {
            return Ok("No circuit breakers declared.".to_string());
        }
        let width = stats.keys().map(|k| k.len()).max().unwrap_or(0);
        let rows: Vec<String> = stats
            .iter()
            .map(|(name, s)| {
                format!(
                    "{:<width$}  {:<9}  failures={}",
                    name,
                    s.state.to_string(),
                    s.failures,
                    width = width
                )
            })
            .collect();
        Ok(format!("Circuit breakers:\n{}", rows.join("\n")))
    }
}

struct ToolsCommand {
    tools: Arc<ToolRegistry>,
}

#[async_trait]
impl CommandHandler for ToolsCommand {
    async fn handle(&self, _invocation: CommandInvocation<'_>) -> Result<String> {
        if self.tools.is_empty() {
            return Ok("No tools registered.".to_string());
        }
        let rows: Vec<String> = self
            .tools
            .summaries()
            .into_iter()
            .map(|(name, category, description)| {
                format!("  {} [{}] - {}", name, category, description)
            })
            .collect();
        Ok(format!("Tools ({}):\n{}", rows.len(), rows.join("\n")))
    }
}

struct ResetCircuitsCommand {
    circuits: Arc<CircuitManager>,
}

#[async_trait]
impl CommandHandler for ResetCircuitsCommand {
    async fn handle(&self, invocation: CommandInvocation<'_>) -> Result<String> {
        self.circuits.reset_all();
        tracing::info!(caller = %invocation.caller.id, "Circuits reset by command");
        Ok(format!("Reset {} circuit breaker(s).", self.circuits.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Caller, CommandContext, DispatchOutcome};
    use crate::error::BreakwaterError;
    use crate::resilience::{CircuitState, Dependency};
    use std::time::Duration;

    fn setup() -> (CommandRouter, Arc<CircuitManager>) {
        let circuits = Arc::new(CircuitManager::default());
        let mut router = CommandRouter::new();
        register_builtin_commands(&mut router, circuits.clone(), Arc::new(ToolRegistry::new()))
            .unwrap();
        (router, circuits)
    }

    async fn run(router: &CommandRouter, name: &str, tier: PermissionTier) -> DispatchOutcome {
        let caller = Caller::new("tester", tier);
        router
            .dispatch(name, &[], &caller, &CommandContext::new("cli", "local"))
            .await
    }

    #[test]
    fn test_registers_all_builtins() {
        let (router, _) = setup();
        assert_eq!(
            router.names(),
            vec!["help", "reset_circuits", "status", "tools", "whoami"]
        );
    }

    #[test]
    fn test_double_registration_fails() {
        let (mut router, circuits) = setup();
        let err = register_builtin_commands(&mut router, circuits, Arc::new(ToolRegistry::new()))
            .unwrap_err();
        assert!(matches!(err, BreakwaterError::DuplicateCommand(_)));
    }

    #[tokio::test]
    async fn test_help_lists_only_visible_commands() {
        let (router, _) = setup();
        let text = run(&router, "help", PermissionTier::User).await.render();
        assert!(text.starts_with("Commands available to user:"));
        assert!(text.contains("/status"));
        assert!(!text.contains("/reset_circuits"));
        assert!(!text.contains("/tools"));

        let text = run(&router, "help", PermissionTier::Admin).await.render();
        assert!(text.contains("[admin]\n  /reset_circuits"));
    }

    #[tokio::test]
    async fn test_whoami() {
        let (router, _) = setup();
        let text = run(&router, "whoami", PermissionTier::Guest).await.render();
        assert_eq!(text, "tester (guest) on cli");
    }

    #[tokio::test]
    async fn test_status_shows_every_breaker() {
        let (router, _) = setup();
        let text = run(&router, "status", PermissionTier::User).await.render();
        for dep in Dependency::all() {
            assert!(text.contains(dep.as_str()), "{text}");
        }
        assert!(text.contains("closed"));
    }

    #[tokio::test]
    async fn test_reset_circuits_requires_admin_and_resets() {
        let (router, circuits) = setup();
        let breaker = circuits.dependency(Dependency::ChatApi).unwrap();
        for _ in 0..breaker.threshold() {
            let _ = breaker
                .call(Duration::from_secs(1), || async {
                    Err::<(), _>(BreakwaterError::Provider("down".into()))
                })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let denied = run(&router, "reset_circuits", PermissionTier::Developer).await;
        assert!(matches!(denied, DispatchOutcome::PermissionDenied { .. }));
        assert_eq!(breaker.state(), CircuitState::Open);

        let reply = run(&router, "reset_circuits", PermissionTier::Admin).await;
        assert_eq!(reply, DispatchOutcome::Reply("Reset 5 circuit breaker(s).".into()));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_tools_with_empty_registry() {
        let (router, _) = setup();
        let text = run(&router, "tools", PermissionTier::Developer).await.render();
        assert_eq!(text, "No tools registered.");
    }
}
