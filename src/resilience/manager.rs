//! Catalogue of named circuit breakers, one per dependency.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::circuit::{BreakerStats, CircuitBreaker};
use super::clock::{Clock, SystemClock};
use crate::config::BreakersConfig;
use crate::error::{BreakwaterError, Result};

/// The long-lived integration points that get a breaker at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Web search and page fetching.
    SearchApi,
    /// Semantic memory / note store.
    VectorStore,
    /// Persistent storage.
    Database,
    /// The LLM chat endpoint.
    ChatApi,
    /// Outbound message delivery.
    MessagingApi,
}

impl Dependency {
    /// Return an array of all dependency variants.
    pub fn all() -> [Dependency; 5] {
        [
            Dependency::SearchApi,
            Dependency::VectorStore,
            Dependency::Database,
            Dependency::ChatApi,
            Dependency::MessagingApi,
        ]
    }

    /// Breaker name for this dependency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchApi => "search_api",
            Self::VectorStore => "vector_store",
            Self::Database => "database",
            Self::ChatApi => "chat_api",
            Self::MessagingApi => "messaging_api",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|d| d.as_str() == name)
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns every breaker in the process.
///
/// Built once at startup through `&mut self`, then shared behind an `Arc`.
/// Lookups of undeclared names fail with `NotFound` rather than creating a
/// breaker on the fly.
pub struct CircuitManager {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl CircuitManager {
    /// Create an empty manager whose breakers read time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: HashMap::new(),
            clock,
        }
    }

    /// Declare a breaker for every [`Dependency`] using the configured
    /// thresholds and cooldowns.
    pub fn with_defaults(config: &BreakersConfig, clock: Arc<dyn Clock>) -> Self {
        let mut manager = Self::new(clock);
        for dep in Dependency::all() {
            let settings = config.settings_for(dep.as_str());
            manager.declare(dep.as_str(), settings.threshold, settings.cooldown());
        }
        manager
    }

    /// Declare (or replace) a breaker and return a handle to it.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        threshold: u32,
        cooldown: Duration,
    ) -> Arc<CircuitBreaker> {
        let name = name.into();
        let breaker = Arc::new(
            CircuitBreaker::new(name.clone(), threshold, cooldown).with_clock(self.clock.clone()),
        );
        info!(
            breaker = %name,
            threshold = breaker.threshold(),
            cooldown_secs = cooldown.as_secs_f64(),
            "Declared circuit breaker"
        );
        self.breakers.insert(name, breaker.clone());
        breaker
    }

    /// Look up a breaker by name.
    pub fn get(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        self.breakers
            .get(name)
            .cloned()
            .ok_or_else(|| BreakwaterError::NotFound(format!("circuit breaker '{}'", name)))
    }

    /// Look up the breaker for a known dependency.
    pub fn dependency(&self, dep: Dependency) -> Result<Arc<CircuitBreaker>> {
        self.get(dep.as_str())
    }

    /// `{name: {state, failures}}` for every breaker, evaluated now.
    pub fn stats(&self) -> BTreeMap<String, BreakerStats> {
        self.breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.stats()))
            .collect()
    }

    /// Close every breaker and clear its failure count.
    pub fn reset_all(&self) {
        for breaker in self.breakers.values() {
            breaker.reset();
        }
        info!(count = self.breakers.len(), "All circuit breakers reset");
    }

    /// Sorted breaker names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitManager {
    fn default() -> Self {
        Self::with_defaults(&BreakersConfig::default(), Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for CircuitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitManager")
            .field("breakers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::resilience::{CircuitState, ManualClock};

    #[test]
    fn test_with_defaults_declares_every_dependency() {
        let manager = CircuitManager::default();
        assert_eq!(manager.len(), 5);
        assert_eq!(
            manager.names(),
            vec!["chat_api", "database", "messaging_api", "search_api", "vector_store"]
        );
        for dep in Dependency::all() {
            assert!(manager.dependency(dep).is_ok());
        }
    }

    #[test]
    fn test_overrides_are_applied_per_dependency() {
        let mut config = BreakersConfig::default();
        config.overrides.insert(
            "search_api".into(),
            BreakerSettings {
                threshold: 2,
                cooldown_secs: 1,
            },
        );
        let manager = CircuitManager::with_defaults(&config, Arc::new(SystemClock));
        let search = manager.dependency(Dependency::SearchApi).unwrap();
        assert_eq!(search.threshold(), 2);
        assert_eq!(search.cooldown(), Duration::from_secs(1));
        assert_eq!(manager.dependency(Dependency::ChatApi).unwrap().threshold(), 5);
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let manager = CircuitManager::default();
        let err = manager.get("payments_api").unwrap_err();
        assert!(matches!(err, BreakwaterError::NotFound(_)));
    }

    #[test]
    fn test_dependency_name_roundtrip() {
        for dep in Dependency::all() {
            assert_eq!(Dependency::from_name(dep.as_str()), Some(dep));
        }
        assert_eq!(Dependency::from_name("nope"), None);
    }

    #[tokio::test]
    async fn test_stats_and_reset_all() {
        let clock = Arc::new(ManualClock::new());
        let mut manager = CircuitManager::new(clock.clone());
        let a = manager.declare("a", 1, Duration::from_secs(10));
        manager.declare("b", 3, Duration::from_secs(10));

        let _ = a
            .call(Duration::from_secs(1), || async {
                Err::<(), _>(BreakwaterError::Provider("down".into()))
            })
            .await;

        let stats = manager.stats();
        assert_eq!(stats["a"].state, CircuitState::Open);
        assert_eq!(stats["a"].failures, 1);
        assert_eq!(stats["b"].state, CircuitState::Closed);

        clock.advance(Duration::from_secs(11));
        assert_eq!(manager.stats()["a"].state, CircuitState::HalfOpen);

        manager.reset_all();
        for (_, s) in manager.stats() {
            assert_eq!(s.state, CircuitState::Closed);
            assert_eq!(s.failures, 0);
        }
    }
}
