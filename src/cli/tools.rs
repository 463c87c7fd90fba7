//! Tools CLI command handler: tool discovery.

use std::path::Path;

use anyhow::Result;

use breakwater::tools::ToolRegistry;

use super::common::build_runtime;

/// Built-in tools and the setting that enables each.
const BUILTIN_TOOLS: &[(&str, &str)] = &[
    (
        "web_search",
        "Set tools.web_search.api_key or BREAKWATER_TOOLS_WEB_SEARCH_API_KEY",
    ),
    ("read_url", "Set tools.read_url.enabled = true"),
    ("memory_lookup", "Set tools.memory.enabled = true"),
];

/// List registered tools, then built-ins that are switched off.
pub(crate) async fn cmd_tools(config_path: Option<&Path>) -> Result<()> {
    let (_config, runtime) = build_runtime(config_path)?;
    print!("{}", render_catalogue(runtime.tools()));
    Ok(())
}

fn render_catalogue(registry: &ToolRegistry) -> String {
    let mut out = format!("Registered tools ({}):\n", registry.len());
    for (name, category, description) in registry.summaries() {
        out.push_str(&format!("  {:<14} [{}] {}\n", name, category, description));
    }

    let missing: Vec<&(&str, &str)> = BUILTIN_TOOLS
        .iter()
        .filter(|(name, _)| !registry.has(name))
        .collect();
    if !missing.is_empty() {
        out.push_str("\nNot available:\n");
        for (name, hint) in missing {
            out.push_str(&format!("  {:<14} {}\n", name, hint));
        }
    }
    out
}
