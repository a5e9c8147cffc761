//! Thread State Registry
//!
//! Per-thread `AgentDeps`: persona state, scratch namespace handle, hidden
//! visualization registry, and an in-flight turn guard. Two concurrent
//! turns for the same thread observe the same `AgentDeps` instance; the
//! second is rejected rather than interleaved. Threads are fully
//! independent of each other.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::models::agent::AgentState;
use crate::services::analytics::AnalyticalStore;

// ============================================================================
// Hidden Visualizations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    Chart,
    Table,
    Kpi,
}

/// A deferred visualization registered by a tool call. Created hidden;
/// flipped to revealed when the agent emits a reveal instruction.
#[derive(Debug, Clone, Serialize)]
pub struct HiddenToolCall {
    pub id: String,
    pub kind: VisualizationKind,
    pub args: serde_json::Value,
    pub payload: serde_json::Value,
    pub hidden: bool,
}

/// Outcome of a reveal request.
pub enum RevealOutcome {
    /// First reveal; carries the payload to emit.
    Revealed(HiddenToolCall),
    /// Already revealed earlier in the thread; no duplicate emission.
    AlreadyRevealed,
    NotFound { available: Vec<String> },
}

// ============================================================================
// Agent Dependencies
// ============================================================================

/// Thread-scoped dependencies handed to every tool and to the runner.
///
/// Owned exclusively by the registry; a single turn at a time mutates it
/// (enforced by the in-flight guard).
pub struct AgentDeps {
    pub thread_id: String,
    pub store: Arc<dyn AnalyticalStore>,
    /// Target cloud substituted into prompts.
    pub migration_target: String,
    /// Provider family for prompt resolution.
    pub llm_provider: String,

    state: Mutex<AgentState>,
    hidden_calls: Mutex<BTreeMap<String, HiddenToolCall>>,
    output_counter: AtomicU64,
    in_flight: AtomicBool,
}

impl AgentDeps {
    fn new(
        thread_id: String,
        store: Arc<dyn AnalyticalStore>,
        migration_target: String,
        llm_provider: String,
    ) -> Self {
        Self {
            thread_id,
            store,
            migration_target,
            llm_provider,
            state: Mutex::new(AgentState::default()),
            hidden_calls: Mutex::new(BTreeMap::new()),
            output_counter: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn snapshot_state(&self) -> AgentState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    pub fn set_state(&self, state: AgentState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    pub fn update_state(&self, f: impl FnOnce(&mut AgentState)) {
        let mut guard = self.state.lock().expect("state lock poisoned");
        f(&mut guard);
    }

    /// Deterministic, collision-free scratch table name for this thread.
    pub fn next_output_ref(&self) -> String {
        let n = self.output_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("output_{}", n)
    }

    pub fn register_hidden(&self, call: HiddenToolCall) {
        let mut calls = self.hidden_calls.lock().expect("hidden calls lock poisoned");
        calls.insert(call.id.clone(), call);
    }

    pub fn reveal(&self, id: &str) -> RevealOutcome {
        let mut calls = self.hidden_calls.lock().expect("hidden calls lock poisoned");
        match calls.get_mut(id) {
            Some(call) if call.hidden => {
                call.hidden = false;
                RevealOutcome::Revealed(call.clone())
            },
            Some(_) => RevealOutcome::AlreadyRevealed,
            None => RevealOutcome::NotFound { available: calls.keys().cloned().collect() },
        }
    }

    pub fn hidden_call(&self, id: &str) -> Option<HiddenToolCall> {
        self.hidden_calls
            .lock()
            .expect("hidden calls lock poisoned")
            .get(id)
            .cloned()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns per-thread `AgentDeps` and serializes turn admission per thread.
pub struct ThreadRegistry {
    threads: DashMap<String, Arc<AgentDeps>>,
    store: Arc<dyn AnalyticalStore>,
    migration_target: String,
    llm_provider: String,
}

impl ThreadRegistry {
    pub fn new(
        store: Arc<dyn AnalyticalStore>,
        migration_target: String,
        llm_provider: String,
    ) -> Self {
        Self { threads: DashMap::new(), store, migration_target, llm_provider }
    }

    /// Idempotent: concurrent calls for the same id return the same instance.
    pub fn get_or_create(&self, thread_id: &str) -> Arc<AgentDeps> {
        self.threads
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating thread state for '{}'", thread_id);
                Arc::new(AgentDeps::new(
                    thread_id.to_string(),
                    Arc::clone(&self.store),
                    self.migration_target.clone(),
                    self.llm_provider.clone(),
                ))
            })
            .clone()
    }

    /// Admit a turn for the thread. Fails if another turn is in flight.
    pub fn begin_turn(&self, deps: &Arc<AgentDeps>) -> Option<TurnGuard> {
        let admitted = deps
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        admitted.then(|| TurnGuard { deps: Arc::clone(deps) })
    }

    /// Release scratch resources and drop the thread entry.
    pub async fn cleanup(&self, thread_id: &str) {
        if let Some((_, deps)) = self.threads.remove(thread_id) {
            deps.store.drop_namespace(thread_id).await;
            tracing::debug!("Cleaned up thread '{}'", thread_id);
        }
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.threads.iter().map(|e| e.key().clone()).collect()
    }

    /// Shutdown path: clean up every known thread.
    pub async fn cleanup_all(&self) {
        for thread_id in self.thread_ids() {
            self.cleanup(&thread_id).await;
        }
    }
}

/// Releases the thread's in-flight flag when the turn finishes, including
/// on panic or cancellation.
pub struct TurnGuard {
    deps: Arc<AgentDeps>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.deps.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analytics::{AnalyticalStore, MemoryStore};

    fn registry() -> ThreadRegistry {
        ThreadRegistry::new(Arc::new(MemoryStore::new()), "Azure".into(), "openai".into())
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = registry();
        let a = registry.get_or_create("t1");
        let b = registry.get_or_create("t1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_turn_is_rejected_until_guard_drops() {
        let registry = registry();
        let deps = registry.get_or_create("t1");

        let guard = registry.begin_turn(&deps).expect("first turn admitted");
        assert!(registry.begin_turn(&deps).is_none(), "second turn must be rejected");

        drop(guard);
        assert!(registry.begin_turn(&deps).is_some(), "turn admitted after release");
    }

    #[test]
    fn test_threads_are_isolated() {
        let registry = registry();
        let t1 = registry.get_or_create("t1");
        let t2 = registry.get_or_create("t2");

        t1.update_state(|s| s.active_persona = "system_architect".to_string());
        let before = serde_json::to_value(t2.snapshot_state()).unwrap();

        // Activity on t1 must not be visible through t2.
        t1.update_state(|s| s.auto_delegate = false);
        t1.register_hidden(HiddenToolCall {
            id: "chart_x".into(),
            kind: VisualizationKind::Chart,
            args: serde_json::json!({}),
            payload: serde_json::json!({}),
            hidden: true,
        });

        let after = serde_json::to_value(t2.snapshot_state()).unwrap();
        assert_eq!(before, after);
        assert!(t2.hidden_call("chart_x").is_none());
    }

    #[test]
    fn test_output_refs_are_deterministic_per_thread() {
        let registry = registry();
        let deps = registry.get_or_create("t1");
        assert_eq!(deps.next_output_ref(), "output_1");
        assert_eq!(deps.next_output_ref(), "output_2");

        let other = registry.get_or_create("t2");
        assert_eq!(other.next_output_ref(), "output_1");
    }

    #[test]
    fn test_reveal_is_idempotent() {
        let registry = registry();
        let deps = registry.get_or_create("t1");
        deps.register_hidden(HiddenToolCall {
            id: "chart_output_1_Scores".into(),
            kind: VisualizationKind::Chart,
            args: serde_json::json!({}),
            payload: serde_json::json!({"title": "Scores"}),
            hidden: true,
        });

        assert!(matches!(
            deps.reveal("chart_output_1_Scores"),
            RevealOutcome::Revealed(_)
        ));
        assert!(matches!(
            deps.reveal("chart_output_1_Scores"),
            RevealOutcome::AlreadyRevealed
        ));
        assert!(matches!(deps.reveal("missing"), RevealOutcome::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_drops_namespace_and_entry() {
        let store = Arc::new(MemoryStore::new());
        let registry =
            ThreadRegistry::new(store.clone(), "Azure".into(), "openai".into());
        let deps = registry.get_or_create("t1");
        store
            .create_table(
                "t1",
                &deps.next_output_ref(),
                crate::services::analytics::DataTable::new(vec!["x"], vec![]),
            )
            .await
            .unwrap();

        registry.cleanup("t1").await;
        assert!(registry.thread_ids().is_empty());
        assert!(store.list_outputs("t1").await.is_empty());
    }
}
