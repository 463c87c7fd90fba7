//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod common;
pub mod config;
pub mod status;
pub mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "breakwater")]
#[command(version)]
#[command(about = "Resilience-gated agent runtime", long_about = None)]
struct Cli {
    /// Config file to load instead of ~/.breakwater/config.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive agent mode
    Agent {
        /// Direct message to process (non-interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Show circuit breaker states and configured integrations
    Status,
    /// List the tools registered for the agent
    Tools,
    /// Run a slash command once, as the CLI operator or a configured user
    Command {
        /// Command name, with or without the leading slash
        name: String,
        /// Arguments passed to the command
        args: Vec<String>,
        /// Resolve permissions for this user id instead of the CLI operator
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file
    Check,
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    // Logging settings come from the config; an unreadable file falls back to
    // defaults here and is reported properly by the command itself.
    let logging_cfg = common::load_config(config_path.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = breakwater::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Warning: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Agent { message }) => {
            agent::cmd_agent(config_path.as_deref(), message).await?;
        }
        Some(Commands::Status) => {
            status::cmd_status(config_path.as_deref()).await?;
        }
        Some(Commands::Tools) => {
            tools::cmd_tools(config_path.as_deref()).await?;
        }
        Some(Commands::Command { name, args, user }) => {
            status::cmd_command(config_path.as_deref(), &name, &args, user.as_deref()).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(config_path.as_deref(), action).await?;
        }
    }

    Ok(())
}
