//! Configuration validation with unknown field detection.
//!
//! Works on the raw JSON value so typos like `"breaker"` or `"max_iteration"`,
//! which serde would silently ignore, are reported with a suggestion.

use serde_json::Value;
use std::collections::HashSet;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "agent",
    "providers",
    "breakers",
    "retry",
    "tools",
    "permissions",
    "logging",
];

const KNOWN_AGENT: &[&str] = &[
    "model",
    "max_tokens",
    "temperature",
    "max_iterations",
    "history_window",
    "model_timeout_secs",
    "tool_timeout_secs",
    "system_prompt",
];

const KNOWN_BREAKERS: &[&str] = &["default", "overrides"];

const KNOWN_RETRY: &[&str] = &["enabled", "max_retries", "base_delay_ms", "max_delay_ms"];

const KNOWN_TOOLS: &[&str] = &["web_search", "read_url", "memory"];

const KNOWN_PERMISSIONS: &[&str] = &["admins", "developers", "users", "cli_tier"];

const KNOWN_LOGGING: &[&str] = &["format", "level", "file"];

/// Sections whose keys are checked, with their known field names.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("agent", KNOWN_AGENT),
    ("breakers", KNOWN_BREAKERS),
    ("retry", KNOWN_RETRY),
    ("tools", KNOWN_TOOLS),
    ("permissions", KNOWN_PERMISSIONS),
    ("logging", KNOWN_LOGGING),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        has_unknown = true;
        let message = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path,
            message,
        });
    }
    has_unknown
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                path: String::new(),
                message: "Config must be a JSON object".to_string(),
            });
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::Ok,
        path: String::new(),
        message: "Valid JSON".to_string(),
    });

    let mut has_unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);
    for (section, known) in KNOWN_SECTIONS {
        if let Some(inner) = obj.get(*section).and_then(|v| v.as_object()) {
            has_unknown |= check_keys(inner, known, section, &mut diagnostics);
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }

    // Breaker overrides must name a declared dependency
    if let Some(overrides) = obj
        .get("breakers")
        .and_then(|b| b.get("overrides"))
        .and_then(|o| o.as_object())
    {
        let names: Vec<&str> = crate::resilience::Dependency::all()
            .iter()
            .map(|d| d.as_str())
            .collect();
        check_keys(overrides, &names, "breakers.overrides", &mut diagnostics);
    }

    // Permission lists that grant nothing to anyone are worth a warning
    let admins_empty = obj
        .get("permissions")
        .and_then(|p| p.get("admins"))
        .and_then(|a| a.as_array())
        .map(|a| a.is_empty())
        .unwrap_or(true);
    if admins_empty {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "permissions.admins".to_string(),
            message: "Empty: admin commands are only reachable from the CLI".to_string(),
        });
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("hello", "helo"), 1);
    }

    #[test]
    fn test_levenshtein_counts_chars() {
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn test_suggest_field_match() {
        let result = suggest_field("breaker", KNOWN_TOP_LEVEL);
        assert!(result.unwrap().contains("breakers"));
    }

    #[test]
    fn test_suggest_field_no_match() {
        assert!(suggest_field("xyzabcdef", KNOWN_TOP_LEVEL).is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "agent": {"model": "claude-haiku", "max_iterations": 4},
            "breakers": {"overrides": {"search_api": {"threshold": 2}}},
            "permissions": {"admins": ["1"]}
        });
        let diags = validate_config(&raw);
        assert!(diags.iter().all(|d| d.level != DiagnosticLevel::Error));
    }

    #[test]
    fn test_validate_unknown_nested_field() {
        let raw = json!({"agent": {"max_iteration": 4}});
        let diags = validate_config(&raw);
        let err = diags
            .iter()
            .find(|d| d.level == DiagnosticLevel::Error)
            .unwrap();
        assert_eq!(err.path, "agent.max_iteration");
        assert!(err.message.contains("max_iterations"));
    }

    #[test]
    fn test_validate_unknown_breaker_override() {
        let raw = json!({"breakers": {"overrides": {"vectorstore": {}}}});
        let diags = validate_config(&raw);
        assert!(diags.iter().any(|d| {
            d.level == DiagnosticLevel::Error && d.path == "breakers.overrides.vectorstore"
        }));
    }

    #[test]
    fn test_validate_warns_on_empty_admins() {
        let diags = validate_config(&json!({}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warn && d.path == "permissions.admins"));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!("not an object"));
        assert!(diags.iter().any(|d| {
            d.level == DiagnosticLevel::Error && d.message.contains("must be a JSON object")
        }));
    }
}
