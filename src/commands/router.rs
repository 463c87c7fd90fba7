//! Permission-tiered command dispatch table.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{info, warn};

use crate::error::{BreakwaterError, Result};

use super::{Caller, CommandContext, CommandDefinition, CommandInvocation, DispatchOutcome};

/// Split a chat line like `/status@my_bot arg1 arg2` into a lowercase name
/// and its arguments. Returns `None` for lines that are not commands.
///
/// # Example
/// ```
/// use breakwater::commands::parse_command;
///
/// let (name, args) = parse_command("/Help@breakwater_bot tools").unwrap();
/// assert_eq!(name, "help");
/// assert_eq!(args, vec!["tools".to_string()]);
/// assert!(parse_command("hello").is_none());
/// ```
pub fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some((name, parts.map(String::from).collect()))
}

/// Dispatch table keyed by command name.
///
/// Built once at startup through `&mut self`, then shared read-only.
#[derive(Default)]
pub struct CommandRouter {
    commands: HashMap<String, CommandDefinition>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A second registration of the same name fails.
    pub fn register(&mut self, definition: CommandDefinition) -> Result<()> {
        if self.commands.contains_key(&definition.name) {
            return Err(BreakwaterError::DuplicateCommand(definition.name));
        }
        info!(
            command = %definition.name,
            tier = %definition.required_tier,
            "Registering command"
        );
        self.commands.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(&name.to_lowercase())
    }

    /// All definitions sorted by name.
    pub fn definitions(&self) -> Vec<&CommandDefinition> {
        let mut defs: Vec<&CommandDefinition> = self.commands.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions().into_iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run `name` for `caller`.
    ///
    /// The handler is only invoked when the caller's tier meets the
    /// command's requirement. Handler errors and panics become
    /// [`DispatchOutcome::Failed`].
    pub async fn dispatch(
        &self,
        name: &str,
        args: &[String],
        caller: &Caller,
        context: &CommandContext,
    ) -> DispatchOutcome {
        let name = name.trim().trim_start_matches('/').to_lowercase();
        let Some(definition) = self.commands.get(&name) else {
            info!(command = %name, caller = %caller.id, "Unknown command");
            return DispatchOutcome::UnknownCommand(name);
        };

        if caller.tier < definition.required_tier {
            warn!(
                command = %name,
                caller = %caller.id,
                required = %definition.required_tier,
                actual = %caller.tier,
                "Command permission denied"
            );
            return DispatchOutcome::PermissionDenied {
                command: name,
                required: definition.required_tier,
                actual: caller.tier,
            };
        }

        let start = Instant::now();
        let invocation = CommandInvocation {
            args,
            caller,
            context,
            router: self,
        };
        let outcome = AssertUnwindSafe(definition.handler.handle(invocation))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(reply)) => {
                info!(command = %name, caller = %caller.id, duration_ms, "Command handled");
                DispatchOutcome::Reply(reply)
            }
            Ok(Err(e)) => {
                warn!(command = %name, error = %e, duration_ms, "Command failed");
                DispatchOutcome::Failed { command: name }
            }
            Err(_) => {
                warn!(command = %name, duration_ms, "Command handler panicked");
                DispatchOutcome::Failed { command: name }
            }
        }
    }

    /// Parse and dispatch a chat line. `None` when the line is not a command.
    pub async fn dispatch_text(
        &self,
        text: &str,
        caller: &Caller,
        context: &CommandContext,
    ) -> Option<DispatchOutcome> {
        let (name, args) = parse_command(text)?;
        Some(self.dispatch(&name, &args, caller, context).await)
    }
}
