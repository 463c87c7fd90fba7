//! Integration tests for Breakwater
//!
//! These tests wire real components together through the public API: breakers
//! and the manager, the tool registry with built-in tools, the command
//! router, and full agent runs through `Runtime::with_provider`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

use breakwater::agent::{AgenticLoop, LoopSettings, ITERATION_LIMIT_NOTICE};
use breakwater::commands::{CommandContext, DispatchOutcome, PermissionTier};
use breakwater::config::{BreakerSettings, Config};
use breakwater::providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition};
use breakwater::resilience::{CircuitBreaker, CircuitManager, CircuitState, ManualClock};
use breakwater::runtime::Runtime;
use breakwater::session::{Message, Role};
use breakwater::tools::MemoryEntry;
use breakwater::{BreakwaterError, Result};

// ============================================================================
// Test providers
// ============================================================================

/// Replays canned responses and records every request.
struct ScriptedProvider {
    responses: Mutex<VecDeque<LLMResponse>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        self.requests.lock().unwrap().push(messages);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| LLMResponse::text("(script exhausted)")))
    }
}

/// Always asks for the same tool again.
struct LoopingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LLMProvider for LoopingProvider {
    fn name(&self) -> &str {
        "looping"
    }

    fn default_model(&self) -> &str {
        "looping-model"
    }

    async fn chat(
        &self,
        _messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LLMResponse::with_tools(
            &format!("step {}", n + 1),
            vec![LLMToolCall::new(
                &format!("call_{n}"),
                "memory_lookup",
                r#"{"query": "anything"}"#,
            )],
        ))
    }
}

/// Fails every call with a countable provider error.
struct DownProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LLMProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    fn default_model(&self) -> &str {
        "down-model"
    }

    async fn chat(
        &self,
        _messages: Vec<Message>,
        _tools: Vec<ToolDefinition>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BreakwaterError::Provider("503 service unavailable".into()))
    }
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.retry.enabled = false;
    config
}

// ============================================================================
// Circuit Breaker Integration Tests
// ============================================================================

#[tokio::test]
async fn test_breaker_opens_rejects_and_recovers_after_cooldown() {
    let clock = Arc::new(ManualClock::new());
    let breaker =
        CircuitBreaker::new("search_api", 2, Duration::from_secs(1)).with_clock(clock.clone());
    let counter = AtomicUsize::new(0);
    let attempts = &counter;
    let failing = || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(BreakwaterError::Provider("boom".into()))
    };

    for _ in 0..2 {
        let err = breaker
            .call(Duration::from_secs(1), failing)
            .await
            .unwrap_err();
        assert!(matches!(err, BreakwaterError::Provider(_)));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Open: rejected without running the operation.
    let err = breaker
        .call(Duration::from_secs(1), failing)
        .await
        .unwrap_err();
    match err {
        BreakwaterError::CircuitOpen {
            name,
            cooldown_remaining,
        } => {
            assert_eq!(name, "search_api");
            assert!(cooldown_remaining <= Duration::from_secs(1));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    clock.advance(Duration::from_millis(1500));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let value = breaker
        .call(Duration::from_secs(1), || async { Ok::<_, BreakwaterError>(42) })
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_breaker_timeout_counts_as_failure() {
    let breaker = CircuitBreaker::new("database", 1, Duration::from_secs(60));
    let err = breaker
        .call(Duration::from_millis(20), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BreakwaterError>(())
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BreakwaterError::Timeout { ref operation, .. } if operation == "database"
    ));
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_manager_reset_all_closes_everything() {
    let manager = CircuitManager::default();
    for name in manager.names() {
        let breaker = manager.get(&name).unwrap();
        for _ in 0..breaker.threshold() {
            let _ = breaker
                .call(Duration::from_secs(1), || async {
                    Err::<(), _>(BreakwaterError::Provider("down".into()))
                })
                .await;
        }
    }
    assert!(manager
        .stats()
        .values()
        .all(|s| s.state == CircuitState::Open));

    manager.reset_all();
    for stats in manager.stats().values() {
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures, 0);
    }
    assert!(matches!(
        manager.get("nope"),
        Err(BreakwaterError::NotFound(_))
    ));
}

// ============================================================================
// Tool Registry Integration Tests
// ============================================================================

#[tokio::test]
async fn test_registry_with_builtin_tools_never_fails() {
    let mut config = quiet_config();
    config.tools.web_search.api_key = Some("test-key".into());
    let runtime = Runtime::with_provider(&config, None, Arc::new(ManualClock::new())).unwrap();
    let tools = runtime.tools();

    assert!(tools.has("web_search"));
    assert!(tools.has("read_url"));
    assert!(tools.has("memory_lookup"));

    let unknown = tools.execute("unknown", json!({})).await;
    assert!(unknown.is_error);
    assert!(unknown.content.contains("unknown"));

    // Blocked before any network or breaker involvement.
    let blocked = tools
        .execute("read_url", json!({"url": "http://127.0.0.1/admin"}))
        .await;
    assert!(blocked.is_error);
    assert!(blocked.content.chars().count() <= 100);
    assert_eq!(
        runtime.circuits().get("search_api").unwrap().failure_count(),
        0
    );
}

#[tokio::test]
async fn test_memory_lookup_reads_configured_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let entries = vec![
        MemoryEntry::new("deploy", "Deploy through the blue pipeline").with_tags(&["ops"]),
        MemoryEntry::new("lunch", "Tacos on Friday"),
    ];
    std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

    let mut config = quiet_config();
    config.tools.memory.file = Some(path.to_string_lossy().into_owned());
    let runtime = Runtime::with_provider(&config, None, Arc::new(ManualClock::new())).unwrap();

    let output = runtime
        .tools()
        .execute("memory_lookup", json!({"query": "deploy pipeline"}))
        .await;
    assert!(!output.is_error, "{}", output.content);
    assert!(output.content.starts_with("Found 1 memory result(s)"));
    assert!(output.content.contains("deploy"));
}

#[test]
fn test_bad_memory_file_fails_startup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");
    std::fs::write(&path, "not json").unwrap();

    let mut config = quiet_config();
    config.tools.memory.file = Some(path.to_string_lossy().into_owned());
    let result = Runtime::with_provider(&config, None, Arc::new(ManualClock::new()));
    assert!(matches!(result, Err(BreakwaterError::Config(_))));
}

// ============================================================================
// Command Integration Tests
// ============================================================================

#[tokio::test]
async fn test_permission_tiers_from_config() {
    let mut config = quiet_config();
    config.permissions.admins = vec!["alice".into()];
    config.permissions.users = vec!["bob".into()];
    let runtime = Runtime::from_config(&config).unwrap();
    let ctx = CommandContext::new("telegram", "42");

    let bob = runtime.permissions().caller("bob");
    assert_eq!(bob.tier, PermissionTier::User);
    let denied = runtime
        .commands()
        .dispatch("reset_circuits", &[], &bob, &ctx)
        .await;
    assert_eq!(
        denied.render(),
        "Permission denied: /reset_circuits requires admin access (you have user)."
    );

    let alice = runtime.permissions().caller("alice");
    let reply = runtime
        .commands()
        .dispatch_text("/reset_circuits@bot", &alice, &ctx)
        .await
        .unwrap();
    assert_eq!(reply, DispatchOutcome::Reply("Reset 5 circuit breaker(s).".into()));

    let stranger = runtime.permissions().caller("mallory");
    let outcome = runtime
        .commands()
        .dispatch("missing", &[], &stranger, &ctx)
        .await;
    assert_eq!(outcome.render(), "Unknown command: /missing. Try /help.");
}

// ============================================================================
// Agent Integration Tests
// ============================================================================

#[tokio::test]
async fn test_runtime_agent_runs_tool_then_answers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");
    let entries = vec![MemoryEntry::new("wifi", "The office wifi password rotates monthly")];
    std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

    let mut config = quiet_config();
    config.tools.memory.file = Some(path.to_string_lossy().into_owned());

    let provider = Arc::new(ScriptedProvider::new(vec![
        LLMResponse::with_tools(
            "Let me check my notes.",
            vec![LLMToolCall::new(
                "call_1",
                "memory_lookup",
                r#"{"query": "wifi password"}"#,
            )],
        ),
        LLMResponse::text("It rotates every month."),
    ]));
    let shared: Arc<dyn LLMProvider> = provider.clone();
    let runtime =
        Runtime::with_provider(&config, Some(shared), Arc::new(ManualClock::new())).unwrap();

    let prior = vec![Message::user("hi"), Message::assistant("hello")];
    let reply = runtime
        .agent()
        .unwrap()
        .run_detailed("What about the wifi?", None, &prior)
        .await
        .unwrap();

    assert_eq!(reply.text, "Let me check my notes.\n\nIt rotates every month.");
    assert_eq!(reply.iterations, 2);
    assert_eq!(reply.tool_calls, 1);
    assert!(!reply.hit_iteration_limit);
    assert_eq!(provider.calls(), 2);

    let second = provider.requests.lock().unwrap()[1].clone();
    assert_eq!(second[0].role, Role::System);
    let results = second.last().unwrap();
    assert!(results.is_tool_results());
    let tool_results = results.tool_results.as_ref().unwrap();
    assert_eq!(tool_results.len(), 1);
    assert!(!tool_results[0].is_error);
    assert!(tool_results[0].content.contains("wifi"));
}

#[tokio::test]
async fn test_agent_stops_at_iteration_cap() {
    let runtime = Runtime::with_provider(&quiet_config(), None, Arc::new(ManualClock::new()))
        .unwrap();
    let provider = Arc::new(LoopingProvider {
        calls: AtomicUsize::new(0),
    });
    let agent = AgenticLoop::new(
        provider.clone(),
        runtime.tools().clone(),
        LoopSettings::default().with_max_iterations(3),
    );

    let reply = agent.run_detailed("loop forever", None, &[]).await.unwrap();
    assert!(reply.hit_iteration_limit);
    assert_eq!(reply.iterations, 3);
    assert_eq!(reply.tool_calls, 3);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert!(reply.text.starts_with("step 1"));
    assert!(reply.text.ends_with(ITERATION_LIMIT_NOTICE));
}

#[tokio::test]
async fn test_chat_breaker_opens_and_short_circuits_agent() {
    let mut config = quiet_config();
    config.breakers.overrides.insert(
        "chat_api".into(),
        BreakerSettings {
            threshold: 2,
            cooldown_secs: 1,
        },
    );
    let clock = Arc::new(ManualClock::new());
    let provider = Arc::new(DownProvider {
        calls: AtomicUsize::new(0),
    });
    let shared: Arc<dyn LLMProvider> = provider.clone();
    let runtime = Runtime::with_provider(&config, Some(shared), clock.clone()).unwrap();
    let agent = runtime.agent().unwrap();

    for _ in 0..2 {
        let err = agent.run("hello", None, &[]).await.unwrap_err();
        assert!(matches!(err, BreakwaterError::Provider(_)));
    }
    let err = agent.run("hello", None, &[]).await.unwrap_err();
    assert!(matches!(err, BreakwaterError::CircuitOpen { ref name, .. } if name == "chat_api"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    // After the cooldown a single trial call reaches the provider again.
    clock.advance(Duration::from_millis(1500));
    let err = agent.run("hello", None, &[]).await.unwrap_err();
    assert!(matches!(err, BreakwaterError::Provider(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        runtime.circuits().get("chat_api").unwrap().state(),
        CircuitState::Open
    );
}

#[test]
fn test_config_file_drives_runtime() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "agent": {"max_iterations": 2},
            "providers": {"anthropic": {"api_key": "sk-ant-test"}},
            "permissions": {"cli_tier": "developer"}
        }"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    let runtime = Runtime::from_config(&config).unwrap();
    assert!(runtime.has_agent());
    assert_eq!(runtime.agent().unwrap().settings().max_iterations, 2);
    assert_eq!(
        runtime.permissions().cli_caller().tier,
        PermissionTier::Developer
    );
}
