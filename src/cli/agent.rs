//! Agent command handler (single message + interactive mode).

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;

use breakwater::commands::CommandContext;
use breakwater::runtime::Runtime;
use breakwater::session::Conversation;

use super::common::{build_runtime, config_path, read_line};

/// Interactive or single-message agent mode.
pub(crate) async fn cmd_agent(
    config_path_arg: Option<&Path>,
    message: Option<String>,
) -> Result<()> {
    let (_config, runtime) = build_runtime(config_path_arg)?;

    if !runtime.has_agent() {
        eprintln!("Warning: No AI provider configured. Set BREAKWATER_PROVIDERS_ANTHROPIC_API_KEY");
        eprintln!("or add your API key to {:?}", config_path(config_path_arg));
        eprintln!("Slash commands still work; plain messages will fail.");
        eprintln!();
    }

    if let Some(msg) = message {
        // Single message mode
        match handle_line(&runtime, &msg, &mut Conversation::new("cli:once")).await {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Interactive mode
    println!("Breakwater Interactive Agent");
    println!("Type a message, or /help for commands. Type 'quit' or 'exit' to stop.");
    println!();

    let mut conversation = Conversation::new("cli:local");
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(input) = read_line()? else {
            // EOF
            println!();
            break;
        };
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            println!("Goodbye!");
            break;
        }

        match handle_line(&runtime, &input, &mut conversation).await {
            Ok(text) => {
                println!();
                println!("{}", text);
                println!();
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
            }
        }
    }

    Ok(())
}

/// Route one input line: slash commands go to the router, everything else to
/// the agent with the conversation so far as prior context.
async fn handle_line(
    runtime: &Runtime,
    input: &str,
    conversation: &mut Conversation,
) -> breakwater::Result<String> {
    let caller = runtime.permissions().cli_caller();
    let context = CommandContext::new("cli", "local");
    if let Some(outcome) = runtime
        .commands()
        .dispatch_text(input, &caller, &context)
        .await
    {
        return Ok(outcome.render());
    }

    let reply = runtime
        .agent()?
        .run(input, None, &conversation.messages)
        .await?;
    conversation.record_exchange(input, &reply);
    Ok(reply)
}
