//! Status and one-shot command handlers.

use std::path::Path;

use anyhow::Result;

use breakwater::commands::{CommandContext, DispatchOutcome};
use breakwater::config::Config;
use breakwater::runtime::Runtime;

use super::common::{build_runtime, config_path, secret_status};

/// Show breaker states and which integrations are configured.
pub(crate) async fn cmd_status(config_path_arg: Option<&Path>) -> Result<()> {
    let (config, runtime) = build_runtime(config_path_arg)?;

    println!("Breakwater Status");
    println!("=================");
    println!();
    println!("Config: {}", config_path(config_path_arg).display());
    println!();

    println!("Circuit Breakers");
    println!("----------------");
    print!("{}", breaker_table(&config, &runtime));
    println!();

    println!("Integrations");
    println!("------------");
    println!(
        "  Anthropic (Claude): {}",
        secret_status(config.anthropic_api_key())
    );
    println!("  Model:              {}", config.agent.model);
    println!(
        "  Brave Search:       {}",
        secret_status(config.tools.web_search.api_key.as_deref())
    );
    println!(
        "  Memory file:        {}",
        config.tools.memory.file.as_deref().unwrap_or("(none)")
    );
    println!();

    println!("Agent Loop");
    println!("----------");
    println!("  Max iterations:  {}", config.agent.max_iterations);
    println!("  History window:  {}", config.agent.history_window);
    println!("  Model timeout:   {}s", config.agent.model_timeout_secs);
    println!("  Tool timeout:    {}s", config.agent.tool_timeout_secs);
    println!(
        "  Retries:         {}",
        if config.retry.enabled {
            format!("up to {}", config.retry.max_retries)
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}

/// One row per breaker: name, state, failures and the configured limits.
fn breaker_table(config: &Config, runtime: &Runtime) -> String {
    let mut out = String::new();
    for (name, stats) in runtime.circuits().stats() {
        let settings = config.breakers.settings_for(&name);
        out.push_str(&format!(
            "  {:<14} {:<9} failures={}/{} cooldown={}s\n",
            name,
            stats.state.to_string(),
            stats.failures,
            settings.threshold,
            settings.cooldown_secs
        ));
    }
    out
}

/// Run a single slash command and print its reply.
pub(crate) async fn cmd_command(
    config_path_arg: Option<&Path>,
    name: &str,
    args: &[String],
    user: Option<&str>,
) -> Result<()> {
    let (_config, runtime) = build_runtime(config_path_arg)?;
    let caller = match user {
        Some(id) => runtime.permissions().caller(id),
        None => runtime.permissions().cli_caller(),
    };
    let context = CommandContext::new("cli", "local");

    let outcome = runtime
        .commands()
        .dispatch(name, args, &caller, &context)
        .await;
    println!("{}", outcome);

    if !matches!(outcome, DispatchOutcome::Reply(_)) {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_table_lists_every_dependency() {
        let config = Config::default();
        let runtime = Runtime::from_config(&config).unwrap();
        let table = breaker_table(&config, &runtime);
        assert_eq!(table.lines().count(), 5);
        assert!(table.contains("chat_api"));
        assert!(table.contains("failures=0/5"));
    }
}
