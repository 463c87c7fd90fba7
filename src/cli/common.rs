//! Shared CLI helpers used across multiple command handlers.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use breakwater::config::Config;
use breakwater::runtime::Runtime;

/// The config file a command reads: the `--config` override or the default.
pub(crate) fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(Config::path)
}

/// Load configuration (file plus environment overrides).
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);
    Config::load_from_path(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Load configuration and build the runtime from it.
pub(crate) fn build_runtime(explicit: Option<&Path>) -> Result<(Config, Runtime)> {
    let config = load_config(explicit)?;
    let runtime = Runtime::from_config(&config).context("Failed to start runtime")?;
    Ok((config, runtime))
}

/// Read a line from stdin. `None` at end of input.
pub(crate) fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut input)
        .with_context(|| "Failed to read input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// "configured" / "not set" label for an optional secret.
pub(crate) fn secret_status(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.trim().is_empty() => "configured",
        _ => "not set",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_prefers_explicit() {
        let explicit = PathBuf::from("/tmp/breakwater.json");
        assert_eq!(config_path(Some(&explicit)), explicit);
        assert_eq!(config_path(None), Config::path());
    }

    #[test]
    fn test_secret_status() {
        assert_eq!(secret_status(Some("sk-1")), "configured");
        assert_eq!(secret_status(Some("  ")), "not set");
        assert_eq!(secret_status(None), "not set");
    }

    #[test]
    fn test_build_runtime_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, runtime) = build_runtime(Some(&dir.path().join("none.json"))).unwrap();
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(runtime.circuits().len(), 5);
    }
}
