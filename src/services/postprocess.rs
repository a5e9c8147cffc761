//! Turn Post-Processing
//!
//! After the persona agent completes, two tasks run in parallel: usage
//! recording (aggregator + append-only log) and follow-up suggestion
//! generation. The final state snapshot is emitted only after both finish.
//! Sink failures never fail the turn; suggestion failures yield an empty
//! list with a warning.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::models::agent::{AgentState, SuggestionItem};
use crate::services::analytics::schema_listing;
use crate::services::llm::{ChatMessage, LlmService, ModelTier, TokenUsage};
use crate::services::prompts::TemplateLibrary;
use crate::services::threads::AgentDeps;
use crate::services::usage::{UsageItem, UsageRecord, UsageTracker};

/// Number of follow-up suggestions requested per turn.
const SUGGESTION_COUNT: usize = 3;

#[derive(Debug, Deserialize)]
struct SuggestionsReply {
    suggestions: Vec<SuggestionItem>,
}

/// Inputs describing the completed turn.
pub struct CompletedTurn {
    pub query: String,
    pub response: String,
    pub usage: TokenUsage,
    pub persona: String,
    /// Full turn message history for the suggestions agent.
    pub history: Vec<ChatMessage>,
}

/// Runs the parallel usage + suggestions step and commits state.
pub struct PostProcessor {
    llm: Arc<LlmService>,
    templates: Arc<TemplateLibrary>,
    usage: Arc<UsageTracker>,
}

impl PostProcessor {
    pub fn new(
        llm: Arc<LlmService>,
        templates: Arc<TemplateLibrary>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self { llm, templates, usage }
    }

    /// Record usage and generate suggestions in parallel, then commit the
    /// suggestions into the thread state and return the final snapshot.
    pub async fn post_process(&self, deps: &AgentDeps, turn: &CompletedTurn) -> AgentState {
        let (_, suggestions) = tokio::join!(
            self.record_usage(deps, turn),
            self.generate_suggestions(deps, turn),
        );

        deps.update_state(|state| state.suggestions = suggestions);
        deps.snapshot_state()
    }

    /// Best-effort usage recording for a turn. Safe to run detached.
    pub async fn record_usage(&self, deps: &AgentDeps, turn: &CompletedTurn) {
        let state = deps.snapshot_state();
        let user_id = state.user_id.as_deref();

        let item = UsageItem {
            usage: turn.usage,
            provider: self.llm.provider().to_string(),
            model: self.llm.model_for(ModelTier::Main).to_string(),
        };
        self.usage.add_usage_item(user_id, &deps.thread_id, &item);

        let record = UsageRecord {
            user_id: state.user_id.clone(),
            thread_id: deps.thread_id.clone(),
            timestamp: Utc::now(),
            query: turn.query.clone(),
            response: turn.response.clone(),
            input_tokens: turn.usage.input_tokens,
            output_tokens: turn.usage.output_tokens,
            provider: item.provider.clone(),
            model: item.model.clone(),
            persona: turn.persona.clone(),
        };
        self.usage.write_record(&record);
    }

    /// Generate exactly three follow-up suggestions from the user's
    /// perspective. Failures yield an empty list.
    async fn generate_suggestions(
        &self,
        deps: &AgentDeps,
        turn: &CompletedTurn,
    ) -> Vec<SuggestionItem> {
        let instructions = self.suggestions_instructions(deps);

        let mut messages = vec![ChatMessage::system(instructions)];
        messages.extend(turn.history.iter().cloned());

        match self.llm.chat(ModelTier::Light, &messages, &[], true).await {
            Ok(outcome) => {
                let text = outcome.text.unwrap_or_default();
                match serde_json::from_str::<SuggestionsReply>(&text) {
                    Ok(reply) => {
                        let mut suggestions = reply.suggestions;
                        suggestions.truncate(SUGGESTION_COUNT);
                        tracing::debug!(
                            "Suggestions agent generated {} suggestions for thread {}",
                            suggestions.len(),
                            deps.thread_id
                        );
                        suggestions
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Suggestions reply for thread {} did not parse: {}",
                            deps.thread_id,
                            e
                        );
                        Vec::new()
                    },
                }
            },
            Err(e) => {
                tracing::warn!("Suggestions agent failed for thread {}: {}", deps.thread_id, e);
                Vec::new()
            },
        }
    }

    fn suggestions_instructions(&self, deps: &AgentDeps) -> String {
        let state = deps.snapshot_state();
        let previous: String = state
            .suggestions
            .iter()
            .map(|s| format!("  - {}", s.format_line()))
            .collect::<Vec<_>>()
            .join("\n");
        let views = schema_listing(&deps.store.views(), true);
        let templates = self.templates.catalog_prompt();

        format!(
            "You are the **Suggestions Agent** inside a chat application for migration \
             assistance. Suggest exactly {count} follow-up items based on the user's recent \
             interactions. Respond with JSON: {{\"suggestions\": [{{\"pill_text\": ..., \
             \"suggestion\": ...}}]}}.\n\
             Write BOTH fields from the user's perspective (as if the user wrote them). \
             `pill_text` displays in a pill above the chat input; `suggestion` is submitted \
             as the user's next request when clicked.\n\
             Avoid repeating previous suggestions:\n{previous}\n\n\
             ## Available Data Views\n{views}\n\n## Available Templates\n{templates}",
            count = SUGGESTION_COUNT,
            previous = previous,
            views = views,
            templates = templates,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::services::analytics::MemoryStore;
    use crate::services::llm::service::testing::MockTransport;
    use crate::services::threads::ThreadRegistry;
    use crate::services::usage::{QuotaLimits, UsageTracker, UsageWriter};

    fn registry() -> ThreadRegistry {
        ThreadRegistry::new(
            Arc::new(MemoryStore::with_default_views()),
            "Azure".into(),
            "openai".into(),
        )
    }

    fn processor(replies: &[&str], writer: Option<UsageWriter>) -> PostProcessor {
        let llm = Arc::new(LlmService::with_transport(
            Arc::new(MockTransport::replying(replies)),
            &AgentsConfig::default(),
        ));
        let tracker = Arc::new(UsageTracker::new(
            QuotaLimits { daily_token_limit: Some(10_000), window_hours: 24 },
            true,
            writer,
        ));
        PostProcessor::new(llm, Arc::new(TemplateLibrary::empty()), tracker)
    }

    fn turn() -> CompletedTurn {
        CompletedTurn {
            query: "what should I migrate first?".into(),
            response: "Start with the billing portal.".into(),
            usage: TokenUsage { input_tokens: 120, output_tokens: 80 },
            persona: "core".into(),
            history: vec![ChatMessage::user("what should I migrate first?")],
        }
    }

    #[tokio::test]
    async fn test_suggestions_written_into_final_state() {
        let reply = r#"{"suggestions": [
            {"pill_text": "Wave plan", "suggestion": "Build a wave plan for the estate"},
            {"pill_text": "Cost view", "suggestion": "Show projected savings by application"},
            {"pill_text": "Blockers", "suggestion": "List migration blockers for Billing Portal"}
        ]}"#;
        let post = processor(&[reply], None);
        let registry = registry();
        let deps = registry.get_or_create("t1");

        let state = post.post_process(&deps, &turn()).await;
        assert_eq!(state.suggestions.len(), 3);
        assert_eq!(state.suggestions[0].pill_text, "Wave plan");
        // Committed to the thread, not just the snapshot
        assert_eq!(deps.snapshot_state().suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_suggestion_failure_yields_empty_list() {
        let post = processor(&["this is not json"], None);
        let registry = registry();
        let deps = registry.get_or_create("t1");

        let state = post.post_process(&deps, &turn()).await;
        assert!(state.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_usage_recorded_and_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("usage.jsonl");
        let writer = UsageWriter::open(&log_path).unwrap();
        let post = processor(&[r#"{"suggestions": []}"#], Some(writer));

        let registry = registry();
        let deps = registry.get_or_create("t1");
        deps.update_state(|s| s.user_id = Some("u1".into()));

        post.post_process(&deps, &turn()).await;

        let records = UsageWriter::read_records(&log_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id.as_deref(), Some("u1"));
        assert_eq!(records[0].input_tokens, 120);
        assert_eq!(records[0].output_tokens, 80);
        assert_eq!(records[0].persona, "core");
    }

    #[tokio::test]
    async fn test_extra_suggestions_truncated_to_three() {
        let reply = r#"{"suggestions": [
            {"pill_text": "a", "suggestion": "a"},
            {"pill_text": "b", "suggestion": "b"},
            {"pill_text": "c", "suggestion": "c"},
            {"pill_text": "d", "suggestion": "d"}
        ]}"#;
        let post = processor(&[reply], None);
        let registry = registry();
        let deps = registry.get_or_create("t1");

        let state = post.post_process(&deps, &turn()).await;
        assert_eq!(state.suggestions.len(), 3);
    }
}
