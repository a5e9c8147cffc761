//! LLM Service Trait and Implementation
//!
//! Defines the transport abstraction used by the runtime and its tiered
//! configuration. The HTTP implementation wraps the OpenAI-compatible
//! client; tests inject scripted transports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::AgentsConfig;

use super::client::LlmClient;
use super::models::*;

// ============================================================================
// Transport Trait
// ============================================================================

/// A chat-completion-capable handle. The runtime never talks to a provider
/// SDK directly; everything goes through this interface.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// One-shot completion.
    async fn chat(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatOutcome, LlmError>;

    /// Streaming completion. Text deltas are forwarded through `delta_tx`;
    /// the accumulated outcome is returned on completion.
    async fn chat_stream(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<ChatOutcome, LlmError>;
}

#[async_trait]
impl LlmTransport for LlmClient {
    async fn chat(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatOutcome, LlmError> {
        LlmClient::chat(self, params, messages, tools, json_mode).await
    }

    async fn chat_stream(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<ChatOutcome, LlmError> {
        LlmClient::chat_stream(self, params, messages, tools, delta_tx).await
    }
}

// ============================================================================
// Tiered Service
// ============================================================================

/// Tiered LLM access: light tier for helper calls, main tier for persona
/// agents. Bounded retries with backoff wrap transient transport failures.
pub struct LlmService {
    transport: Arc<dyn LlmTransport>,
    light: TierParams,
    main: TierParams,
    provider: String,
    /// Transient-failure retries per call.
    max_retries: u32,
}

impl LlmService {
    pub fn from_config(config: &AgentsConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                "LLM API key env var '{}' not set; LLM calls will fail",
                config.api_key_env
            );
        }
        let client = LlmClient::new(config.api_base.clone(), api_key);
        Self::with_transport(Arc::new(client), config)
    }

    /// Create with a custom transport (used in tests).
    pub fn with_transport(transport: Arc<dyn LlmTransport>, config: &AgentsConfig) -> Self {
        Self {
            transport,
            light: TierParams {
                model: config.model_light.clone(),
                timeout: Duration::from_secs(config.light_timeout_secs),
                temperature: 0.0,
                max_tokens: 1024,
            },
            main: TierParams {
                model: config.model_main.clone(),
                timeout: Duration::from_secs(config.main_timeout_secs),
                temperature: 0.3,
                max_tokens: 4096,
            },
            provider: config.llm_provider.clone(),
            max_retries: 2,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        &self.params_for(tier).model
    }

    pub fn params_for(&self, tier: ModelTier) -> &TierParams {
        match tier {
            ModelTier::Light => &self.light,
            ModelTier::Main => &self.main,
        }
    }

    /// One-shot completion on the given tier, retrying transient failures.
    pub async fn chat(
        &self,
        tier: ModelTier,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatOutcome, LlmError> {
        let params = self.params_for(tier);
        let mut attempt = 0;
        loop {
            match self.transport.chat(params, messages, tools, json_mode).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    tracing::warn!(
                        "LLM {} call failed (attempt {}/{}): {}; retrying in {:?}",
                        tier.as_str(),
                        attempt,
                        self.max_retries,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Streaming completion on the given tier. Not retried: partial output
    /// may already have reached the client.
    pub async fn chat_stream(
        &self,
        tier: ModelTier,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<ChatOutcome, LlmError> {
        let params = self.params_for(tier);
        self.transport.chat_stream(params, messages, tools, delta_tx).await
    }
}

// ============================================================================
// Test Transport
// ============================================================================

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport replaying queued outcomes, for unit tests.
    pub struct MockTransport {
        outcomes: Mutex<VecDeque<Result<ChatOutcome, LlmError>>>,
        pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockTransport {
        pub fn new(outcomes: Vec<Result<ChatOutcome, LlmError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(texts: &[&str]) -> Self {
            Self::new(
                texts
                    .iter()
                    .map(|t| {
                        Ok(ChatOutcome::text_only(
                            *t,
                            TokenUsage { input_tokens: 10, output_tokens: 5 },
                        ))
                    })
                    .collect(),
            )
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next_outcome(&self) -> Result<ChatOutcome, LlmError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::ApiError("mock transport exhausted".into())))
        }
    }

    #[async_trait]
    impl LlmTransport for MockTransport {
        async fn chat(
            &self,
            _params: &TierParams,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _json_mode: bool,
        ) -> Result<ChatOutcome, LlmError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.next_outcome()
        }

        async fn chat_stream(
            &self,
            _params: &TierParams,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            delta_tx: mpsc::Sender<String>,
        ) -> Result<ChatOutcome, LlmError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let outcome = self.next_outcome()?;
            if let Some(text) = &outcome.text {
                // Forward the text in two chunks to exercise delta handling.
                let mid = text.len() / 2;
                let (a, b) = text.split_at(mid);
                for part in [a, b] {
                    if !part.is_empty() && delta_tx.send(part.to_string()).await.is_err() {
                        return Err(LlmError::Cancelled);
                    }
                }
            }
            Ok(outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;

    fn service(transport: MockTransport) -> LlmService {
        LlmService::with_transport(Arc::new(transport), &AgentsConfig::default())
    }

    #[tokio::test]
    async fn test_chat_returns_scripted_outcome() {
        let svc = service(MockTransport::replying(&["hello"]));
        let outcome = svc
            .chat(ModelTier::Light, &[ChatMessage::user("hi")], &[], false)
            .await
            .unwrap();
        assert_eq!(outcome.text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_chat_retries_transient_failures() {
        let transport = MockTransport::new(vec![
            Err(LlmError::Timeout(1)),
            Ok(ChatOutcome::text_only("recovered", TokenUsage::default())),
        ]);
        let svc = service(transport);
        let outcome = svc
            .chat(ModelTier::Main, &[ChatMessage::user("hi")], &[], false)
            .await
            .unwrap();
        assert_eq!(outcome.text.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn test_chat_gives_up_after_retry_budget() {
        let transport = MockTransport::new(vec![
            Err(LlmError::Timeout(1)),
            Err(LlmError::Timeout(1)),
            Err(LlmError::Timeout(1)),
        ]);
        let svc = service(transport);
        let result = svc.chat(ModelTier::Main, &[ChatMessage::user("hi")], &[], false).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_chat_stream_forwards_deltas() {
        let svc = service(MockTransport::replying(&["streamed text"]));
        let (tx, mut rx) = mpsc::channel(16);
        let outcome = svc
            .chat_stream(ModelTier::Main, &[ChatMessage::user("hi")], &[], tx)
            .await
            .unwrap();
        assert_eq!(outcome.text.as_deref(), Some("streamed text"));

        let mut collected = String::new();
        while let Some(delta) = rx.recv().await {
            collected.push_str(&delta);
        }
        assert_eq!(collected, "streamed text");
    }
}
