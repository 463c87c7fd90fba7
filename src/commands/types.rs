//! Command types: tiers, callers, definitions and dispatch outcomes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PermissionsConfig;
use crate::error::{BreakwaterError, Result};

use super::CommandRouter;

/// Ordered permission tiers: `Guest < User < Developer < Admin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    #[default]
    Guest,
    User,
    Developer,
    Admin,
}

impl PermissionTier {
    pub fn all() -> [PermissionTier; 4] {
        [
            PermissionTier::Guest,
            PermissionTier::User,
            PermissionTier::Developer,
            PermissionTier::Admin,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionTier::Guest => "guest",
            PermissionTier::User => "user",
            PermissionTier::Developer => "developer",
            PermissionTier::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionTier {
    type Err = BreakwaterError;

    fn from_str(s: &str) -> Result<Self> {
        PermissionTier::all()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BreakwaterError::Config(format!("Unknown permission tier '{}'", s)))
    }
}

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub tier: PermissionTier,
}

impl Caller {
    pub fn new(id: &str, tier: PermissionTier) -> Self {
        Self {
            id: id.to_string(),
            tier,
        }
    }
}

/// Where a command was issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandContext {
    /// The channel name (e.g., "cli")
    pub channel: String,
    /// The chat ID within the channel
    pub chat_id: String,
}

impl CommandContext {
    pub fn new(channel: &str, chat_id: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
        }
    }
}

/// Everything a handler receives for one dispatch.
pub struct CommandInvocation<'a> {
    /// Whitespace-split arguments after the command name
    pub args: &'a [String],
    pub caller: &'a Caller,
    pub context: &'a CommandContext,
    /// The router doing the dispatch, for commands that list other commands
    pub router: &'a CommandRouter,
}

/// Implemented by every command.
///
/// An `Err` (or a panic) is reported to the caller as a generic failure; the
/// detail only goes to the log.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, invocation: CommandInvocation<'_>) -> Result<String>;
}

/// A registered command.
#[derive(Clone)]
pub struct CommandDefinition {
    /// Lowercase name without the leading slash
    pub name: String,
    /// One-line description shown by `help`
    pub description: String,
    /// Grouping shown by `help`
    pub category: String,
    /// Minimum tier allowed to run the command
    pub required_tier: PermissionTier,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDefinition {
    pub fn new(
        name: &str,
        description: &str,
        required_tier: PermissionTier,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.trim_start_matches('/').to_lowercase(),
            description: description.to_string(),
            category: "general".to_string(),
            required_tier,
            handler,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("required_tier", &self.required_tier)
            .finish()
    }
}

/// The result of a dispatch. Every variant renders to reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and produced this reply.
    Reply(String),
    /// The caller's tier is below the command's; the handler was not run.
    PermissionDenied {
        command: String,
        required: PermissionTier,
        actual: PermissionTier,
    },
    /// No command with this name.
    UnknownCommand(String),
    /// The handler returned an error or panicked.
    Failed { command: String },
}

impl DispatchOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, DispatchOutcome::Reply(_))
    }

    /// Text to send back to the caller.
    pub fn render(&self) -> String {
        match self {
            DispatchOutcome::Reply(text) => text.clone(),
            DispatchOutcome::PermissionDenied {
                command,
                required,
                actual,
            } => format!(
                "Permission denied: /{} requires {} access (you have {}).",
                command, required, actual
            ),
            DispatchOutcome::UnknownCommand(name) => {
                format!("Unknown command: /{}. Try /help.", name)
            }
            DispatchOutcome::Failed { command } => {
                format!("Command /{} failed. Please try again later.", command)
            }
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Maps user ids to tiers from configuration. Unlisted ids are guests.
#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
    admins: Vec<String>,
    developers: Vec<String>,
    users: Vec<String>,
    cli_tier: PermissionTier,
}

impl PermissionResolver {
    pub fn from_config(config: &PermissionsConfig) -> Self {
        Self {
            admins: config.admins.clone(),
            developers: config.developers.clone(),
            users: config.users.clone(),
            cli_tier: config.cli_tier,
        }
    }

    /// Highest tier the id is listed under.
    pub fn resolve(&self, user_id: &str) -> PermissionTier {
        let listed = |ids: &[String]| ids.iter().any(|id| id == user_id);
        if listed(&self.admins) {
            PermissionTier::Admin
        } else if listed(&self.developers) {
            PermissionTier::Developer
        } else if listed(&self.users) {
            PermissionTier::User
        } else {
            PermissionTier::Guest
        }
    }

    pub fn caller(&self, user_id: &str) -> Caller {
        Caller::new(user_id, self.resolve(user_id))
    }

    /// The local CLI operator.
    pub fn cli_caller(&self) -> Caller {
        Caller::new("cli", self.cli_tier)
    }
}
