//! Note memory and the `memory_lookup` tool.
//!
//! The lookup goes through a [`MemoryStore`] so the backing store can be a
//! remote vector database; it is therefore guarded by the `vector_store`
//! breaker. [`InMemoryStore`] is the built-in keyword-scored backend,
//! optionally seeded from a JSON file.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{BreakwaterError, Result};
use crate::resilience::CircuitBreaker;

use super::{Tool, ToolCategory, ToolContext, ToolOutput};

const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_CAP: usize = 20;

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Short identifier, e.g. "deploy-checklist"
    pub key: String,
    /// Note body
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryEntry {
    pub fn new(key: &str, text: &str) -> Self {
        Self {
            key: key.to_string(),
            text: text.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// A search hit with its relevance in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: MemoryEntry,
    pub score: f32,
}

/// Pluggable note store.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Best matches for `query`, highest score first, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredEntry>>;
}

/// Keyword-scored notes held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Vec<MemoryEntry>,
}

impl InMemoryStore {
    pub fn new(entries: Vec<MemoryEntry>) -> Self {
        Self { entries }
    }

    /// Load entries from a JSON array file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<MemoryEntry> = serde_json::from_str(&content).map_err(|e| {
            BreakwaterError::Config(format!(
                "Invalid memory file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), entries = entries.len(), "Loaded memory entries");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercased alphanumeric terms.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of query terms that appear in the entry's key, text or tags.
fn score_entry(entry: &MemoryEntry, query_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let mut haystack = tokenize(&entry.key);
    haystack.extend(tokenize(&entry.text));
    for tag in &entry.tags {
        haystack.extend(tokenize(tag));
    }
    let hits = query_terms.iter().filter(|t| haystack.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredEntry>> {
        let terms = tokenize(query);
        let mut hits: Vec<ScoredEntry> = self
            .entries
            .iter()
            .map(|entry| ScoredEntry {
                score: score_entry(entry, &terms),
                entry: entry.clone(),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entry.key.cmp(&b.entry.key))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Tool for looking up stored notes.
pub struct MemoryLookupTool {
    store: Arc<dyn MemoryStore>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl MemoryLookupTool {
    pub fn new(store: Arc<dyn MemoryStore>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            store,
            breaker,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for MemoryLookupTool {
    fn name(&self) -> &str {
        "memory_lookup"
    }

    fn description(&self) -> &str {
        "Look up stored notes relevant to a query and return the best matches."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to look up"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (1-20)"
                }
            },
            "required": ["query"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Memory
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BreakwaterError::Tool("Missing 'query' parameter".to_string()))?;

        let limit = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_CAP);

        let store = &self.store;
        let results = self
            .breaker
            .call(self.timeout, || store.search(query, limit))
            .await?;

        if results.is_empty() {
            return Ok(ToolOutput::success(format!(
                "No memory entries found for '{}'.",
                query
            )));
        }

        let mut output = format!(
            "Found {} memory result(s) for '{}':\n\n",
            results.len(),
            query
        );
        for (index, hit) in results.iter().enumerate() {
            output.push_str(&format!(
                "{}. {} (score {:.2})\n{}\n\n",
                index + 1,
                hit.entry.key,
                hit.score,
                hit.entry.text.trim()
            ));
        }
        Ok(ToolOutput::success(output.trim_end()))
    }
}
