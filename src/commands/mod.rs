//! Commands module - permission-tiered slash commands
//!
//! A [`CommandRouter`] maps command names to [`CommandDefinition`]s. Each
//! definition carries the minimum [`PermissionTier`] needed to run it;
//! dispatch checks the caller's tier before the handler is touched.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use breakwater::commands::{
//!     register_builtin_commands, Caller, CommandContext, CommandRouter, PermissionTier,
//! };
//! use breakwater::resilience::CircuitManager;
//! use breakwater::tools::ToolRegistry;
//!
//! # tokio_test::block_on(async {
//! let mut router = CommandRouter::new();
//! register_builtin_commands(
//!     &mut router,
//!     Arc::new(CircuitManager::default()),
//!     Arc::new(ToolRegistry::new()),
//! )
//! .unwrap();
//!
//! let guest = Caller::new("someone", PermissionTier::Guest);
//! let ctx = CommandContext::new("cli", "local");
//! let outcome = router.dispatch("status", &[], &guest, &ctx).await;
//! assert!(outcome.render().starts_with("Permission denied"));
//! # });
//! ```

mod builtin;
mod router;
mod types;

pub use builtin::register_builtin_commands;
pub use router::{parse_command, CommandRouter};
pub use types::{
    Caller, CommandContext, CommandDefinition, CommandHandler, CommandInvocation,
    DispatchOutcome, PermissionResolver, PermissionTier,
};
