//! Turn Pre-Processing
//!
//! Before the persona agent streams, two light-tier tasks run in parallel:
//! response template selection (short trailing message window) and persona
//! delegation (last user message only). The active persona is assigned only
//! after both complete, so the initial state snapshot always reflects the
//! post-delegation persona.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::models::agent::{AgentState, Message, MessageRole};
use crate::services::llm::{ChatMessage, LlmService, ModelTier};
use crate::services::personas::Persona;
use crate::services::prompts::{Template, TemplateLibrary};

/// Trailing user/assistant turns given to the helper agents.
const SHORT_CONTEXT_TURNS: usize = 5;

/// Wall-clock timings for one turn's pre-processing.
#[derive(Debug, Default, Clone)]
pub struct PreProcessMetrics {
    pub template_secs: f64,
    pub persona_secs: f64,
    pub gather_secs: f64,
}

impl PreProcessMetrics {
    pub fn log_summary(&self, thread_id: &str) {
        tracing::debug!(
            "[metrics][thread={}] Pre-processing gather: {:.2}ms (template {:.2}ms, persona {:.2}ms)",
            thread_id,
            self.gather_secs * 1000.0,
            self.template_secs * 1000.0,
            self.persona_secs * 1000.0
        );
    }
}

/// Structured output of the light-tier selection calls.
#[derive(Debug, Deserialize)]
struct Selection {
    selection: String,
}

/// Result of pre-processing one turn.
pub struct PreProcessOutcome {
    pub template: Option<Template>,
    pub persona: Persona,
    pub metrics: PreProcessMetrics,
}

/// Runs the parallel template + delegation step.
pub struct PreProcessor {
    llm: Arc<LlmService>,
    templates: Arc<TemplateLibrary>,
    forced_persona: Option<Persona>,
    apply_templates: bool,
}

impl PreProcessor {
    pub fn new(
        llm: Arc<LlmService>,
        templates: Arc<TemplateLibrary>,
        forced_persona: Option<Persona>,
        apply_templates: bool,
    ) -> Self {
        Self { llm, templates, forced_persona, apply_templates }
    }

    /// Run template selection and persona delegation in parallel.
    pub async fn pre_process(
        &self,
        messages: &[Message],
        state: &AgentState,
        thread_id: &str,
    ) -> PreProcessOutcome {
        let gather_start = Instant::now();

        let short_context = Self::short_message_context(messages, SHORT_CONTEXT_TURNS);
        let (template_result, persona_result) = tokio::join!(
            self.determine_template(&short_context, thread_id),
            self.determine_persona(messages, state, thread_id),
        );

        let (template, template_secs) = template_result;
        let (persona, persona_secs) = persona_result;

        let metrics = PreProcessMetrics {
            template_secs,
            persona_secs,
            gather_secs: gather_start.elapsed().as_secs_f64(),
        };
        metrics.log_summary(thread_id);

        PreProcessOutcome { template, persona, metrics }
    }

    /// Select a response template for this turn, or None.
    async fn determine_template(
        &self,
        short_context: &[Message],
        thread_id: &str,
    ) -> (Option<Template>, f64) {
        let start = Instant::now();

        if !self.apply_templates || self.templates.is_empty() || short_context.is_empty() {
            return (None, start.elapsed().as_secs_f64());
        }

        let instructions = format!(
            "You are the **Template Agent**. Decide whether there is an appropriate template \
             to apply to the next response based upon the available templates. Respond with \
             JSON: {{\"selection\": \"<template name>\"}} or {{\"selection\": \"null\"}} if no \
             template applies.\n\n{}",
            self.templates.catalog_prompt()
        );

        let mut chat_messages = vec![ChatMessage::system(instructions)];
        chat_messages.extend(short_context.iter().map(to_chat_message));

        let template = match self.llm.chat(ModelTier::Light, &chat_messages, &[], true).await {
            Ok(outcome) => {
                let selection = parse_selection(outcome.text.as_deref().unwrap_or(""));
                selection.as_deref().and_then(|name| self.templates.get(name)).cloned()
            },
            Err(e) => {
                tracing::warn!("Template selection failed for thread {}: {}", thread_id, e);
                None
            },
        };

        if let Some(template) = &template {
            tracing::debug!(
                "Template agent selected template for thread {}: {}",
                thread_id,
                template.name
            );
        }

        (template, start.elapsed().as_secs_f64())
    }

    /// Choose the persona for this turn.
    ///
    /// Forced persona wins; with auto-delegation off, the current active
    /// persona is kept; otherwise the delegator picks from the catalog, and
    /// selecting `core` keeps the current active persona.
    async fn determine_persona(
        &self,
        messages: &[Message],
        state: &AgentState,
        thread_id: &str,
    ) -> (Persona, f64) {
        let start = Instant::now();

        if let Some(forced) = self.forced_persona {
            return (forced, start.elapsed().as_secs_f64());
        }

        let current = Persona::parse(&state.active_persona).unwrap_or(Persona::Core);

        if !state.auto_delegate {
            return (current, start.elapsed().as_secs_f64());
        }

        let Some(last_user) = messages.iter().rev().find(|m| m.role == MessageRole::User) else {
            return (current, start.elapsed().as_secs_f64());
        };

        let instructions = format!(
            "You are the **Delegation Agent**. Decide which of the available agents is best \
             suited to respond to the user request. Respond with JSON: \
             {{\"selection\": \"<agent id>\"}}.\n\n{}",
            Persona::brief()
        );
        let chat_messages = vec![
            ChatMessage::system(instructions),
            ChatMessage::user(last_user.content.clone()),
        ];

        let persona = match self.llm.chat(ModelTier::Light, &chat_messages, &[], true).await {
            Ok(outcome) => {
                let selection = parse_selection(outcome.text.as_deref().unwrap_or(""));
                match selection.as_deref().and_then(Persona::parse) {
                    // Core means "no strong opinion": keep the active persona.
                    Some(Persona::Core) | None => current,
                    Some(selected) => {
                        tracing::debug!(
                            "Delegator selected persona for thread {}: {}",
                            thread_id,
                            selected.id()
                        );
                        selected
                    },
                }
            },
            Err(e) => {
                tracing::warn!("Delegation failed for thread {}: {}; keeping {}", thread_id, e, current.id());
                current
            },
        };

        (persona, start.elapsed().as_secs_f64())
    }

    /// The last `n` user/assistant messages with textual content, oldest
    /// first.
    fn short_message_context(messages: &[Message], n: usize) -> Vec<Message> {
        let mut recent: Vec<Message> = messages
            .iter()
            .rev()
            .filter(|m| {
                matches!(m.role, MessageRole::User | MessageRole::Assistant)
                    && !m.content.trim().is_empty()
            })
            .take(n)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(message.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
        MessageRole::System | MessageRole::Tool => ChatMessage::system(message.content.clone()),
    }
}

/// Parse a selection reply: JSON `{"selection": ...}` preferred, bare text
/// accepted. "null"/empty mean no selection.
fn parse_selection(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = serde_json::from_str::<Selection>(trimmed)
        .map(|s| s.selection)
        .unwrap_or_else(|_| trimmed.trim_matches('"').to_string());

    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() || normalized == "null" || normalized == "none" {
        return None;
    }
    Some(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::services::llm::models::{ChatOutcome, TokenUsage};
    use crate::services::llm::service::testing::MockTransport;

    fn llm_replying(replies: &[&str]) -> Arc<LlmService> {
        Arc::new(LlmService::with_transport(
            Arc::new(MockTransport::replying(replies)),
            &AgentsConfig::default(),
        ))
    }

    fn state(persona: &str, auto_delegate: bool) -> AgentState {
        AgentState {
            active_persona: persona.to_string(),
            auto_delegate,
            suggestions: vec![],
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_core_selection_keeps_active_persona() {
        // Delegator answers core; template agent disabled. The active
        // persona must survive delegation.
        let llm = llm_replying(&[r#"{"selection": "core"}"#]);
        let pre = PreProcessor::new(llm, Arc::new(TemplateLibrary::empty()), None, false);

        let messages = vec![Message::user("show me the plan")];
        let outcome = pre
            .pre_process(&messages, &state("system_architect", true), "t1")
            .await;

        assert_eq!(outcome.persona, Persona::SystemArchitect);
        assert!(outcome.template.is_none());
    }

    #[tokio::test]
    async fn test_delegator_switches_persona() {
        let llm = llm_replying(&[r#"{"selection": "financial_planner"}"#]);
        let pre = PreProcessor::new(llm, Arc::new(TemplateLibrary::empty()), None, false);

        let messages = vec![Message::user("how much will this cost?")];
        let outcome = pre.pre_process(&messages, &state("core", true), "t1").await;

        assert_eq!(outcome.persona, Persona::FinancialPlanner);
    }

    #[tokio::test]
    async fn test_forced_persona_bypasses_delegation() {
        // No LLM responses queued: a delegation call would fail the test.
        let transport = MockTransport::new(vec![]);
        let llm = Arc::new(LlmService::with_transport(
            Arc::new(transport),
            &AgentsConfig::default(),
        ));
        let pre = PreProcessor::new(
            llm,
            Arc::new(TemplateLibrary::empty()),
            Some(Persona::MigrationEngineer),
            false,
        );

        let messages = vec![Message::user("anything")];
        let outcome = pre.pre_process(&messages, &state("core", true), "t1").await;
        assert_eq!(outcome.persona, Persona::MigrationEngineer);
    }

    #[tokio::test]
    async fn test_auto_delegate_off_keeps_state_persona() {
        let transport = MockTransport::new(vec![]);
        let llm = Arc::new(LlmService::with_transport(
            Arc::new(transport),
            &AgentsConfig::default(),
        ));
        let pre = PreProcessor::new(llm, Arc::new(TemplateLibrary::empty()), None, false);

        let messages = vec![Message::user("continue")];
        let outcome = pre
            .pre_process(&messages, &state("network_specialist", false), "t1")
            .await;
        assert_eq!(outcome.persona, Persona::NetworkSpecialist);
    }

    #[tokio::test]
    async fn test_delegation_failure_keeps_current_persona() {
        let transport = MockTransport::new(vec![Err(
            crate::services::llm::LlmError::ApiError("boom".into()),
        )]);
        let llm = Arc::new(LlmService::with_transport(
            Arc::new(transport),
            &AgentsConfig::default(),
        ));
        let pre = PreProcessor::new(llm, Arc::new(TemplateLibrary::empty()), None, false);

        let messages = vec![Message::user("hello")];
        let outcome = pre
            .pre_process(&messages, &state("project_manager", true), "t1")
            .await;
        assert_eq!(outcome.persona, Persona::ProjectManager);
    }

    #[test]
    fn test_short_message_context_filters_and_orders() {
        let messages = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::system("ignored"),
            Message::user(""),
            Message::user("three"),
            Message::assistant("four"),
            Message::user("five"),
            Message::assistant("six"),
            Message::user("seven"),
        ];
        let context = PreProcessor::short_message_context(&messages, 5);
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four", "five", "six", "seven"]);
    }

    #[test]
    fn test_parse_selection_variants() {
        assert_eq!(
            parse_selection(r#"{"selection": "wave_plan"}"#).as_deref(),
            Some("wave_plan")
        );
        assert_eq!(parse_selection("wave_plan").as_deref(), Some("wave_plan"));
        assert_eq!(parse_selection(r#"{"selection": "null"}"#), None);
        assert_eq!(parse_selection(""), None);
    }

    #[tokio::test]
    async fn test_template_and_delegation_run_for_same_turn() {
        // First reply consumed by whichever task reaches the transport
        // first; both must complete and the chosen persona reflects the
        // delegation reply regardless of template outcome.
        let transport = MockTransport::new(vec![
            Ok(ChatOutcome::text_only(
                r#"{"selection": "null"}"#,
                TokenUsage::default(),
            )),
            Ok(ChatOutcome::text_only(
                r#"{"selection": "null"}"#,
                TokenUsage::default(),
            )),
        ]);
        let llm = Arc::new(LlmService::with_transport(
            Arc::new(transport),
            &AgentsConfig::default(),
        ));
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("summary.md"),
            "# DESCRIPTION\nSummaries.\n# RESPONSE TEMPLATE\nSummarize.",
        )
        .unwrap();
        let templates = Arc::new(TemplateLibrary::load(tmp.path()));
        let pre = PreProcessor::new(llm, templates, None, true);

        let messages = vec![Message::user("summarize the estate")];
        let outcome = pre.pre_process(&messages, &state("core", true), "t1").await;
        assert_eq!(outcome.persona, Persona::Core);
        assert!(outcome.template.is_none());
        assert!(outcome.metrics.gather_secs >= 0.0);
    }
}
