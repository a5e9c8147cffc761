//! Agent Runner & Stream Adapter
//!
//! Drives the chosen persona agent and produces a lazy, single-producer
//! stream of typed turn events: one initial state snapshot, model events
//! (text deltas, tool invocations), reveal markers, and a terminal state
//! snapshot after post-processing. Reveal sentinels embedded in model text
//! are replaced with reveal events carrying the visualization payload.
//!
//! Client disconnects close the event channel; the producer abandons
//! downstream LLM work at its next send and usage recording completes in a
//! detached scope with a short timeout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::models::agent::{Message, MessageRole};
use crate::models::events::TurnEvent;
use crate::services::analytics::schema_listing;
use crate::services::llm::{ChatMessage, LlmService, ModelTier, TokenUsage};
use crate::services::personas::Persona;
use crate::services::postprocess::{CompletedTurn, PostProcessor};
use crate::services::prompts::{PromptLibrary, PromptVars, Template};
use crate::services::threads::{AgentDeps, TurnGuard};
use crate::services::tools::{TOOL_RETRY_BUDGET, ToolDispatcher};

/// Upper bound on model/tool rounds per turn.
const MAX_AGENT_ROUNDS: usize = 10;
/// Event channel depth; bounded so a stalled client applies backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Detached usage recording deadline after a client disconnect.
const DETACHED_USAGE_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest well-formed reveal sentinel the adapter will buffer.
const MAX_SENTINEL_LEN: usize = 256;

const SENTINEL_PREFIX: &str = "[VISUALIZATION:";

// ============================================================================
// Reveal Sentinel Scanner
// ============================================================================

/// One piece of scanned model output.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Reveal(String),
}

/// Incremental scanner that splits streamed text around reveal sentinels,
/// tolerating sentinels fragmented across deltas.
#[derive(Default)]
pub struct RevealScanner {
    buffer: String,
}

impl RevealScanner {
    /// Feed a delta; returns completed segments in order.
    pub fn push(&mut self, delta: &str) -> Vec<Segment> {
        self.buffer.push_str(delta);
        let mut segments = Vec::new();

        loop {
            match self.buffer.find('[') {
                None => {
                    if !self.buffer.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut self.buffer)));
                    }
                    break;
                },
                Some(start) => {
                    if start > 0 {
                        segments.push(Segment::Text(self.buffer[..start].to_string()));
                        self.buffer.drain(..start);
                    }

                    let tail = &self.buffer;
                    if tail.len() < SENTINEL_PREFIX.len() {
                        if SENTINEL_PREFIX.starts_with(tail.as_str()) {
                            // Possibly a fragmented sentinel: wait for more.
                            break;
                        }
                        // A lone bracket that can never become a sentinel.
                        segments.push(Segment::Text(consume_one_char(&mut self.buffer)));
                        continue;
                    }

                    if !tail.starts_with(SENTINEL_PREFIX) {
                        segments.push(Segment::Text(consume_one_char(&mut self.buffer)));
                        continue;
                    }

                    match tail.find(']') {
                        Some(end) => {
                            let id = tail[SENTINEL_PREFIX.len()..end].to_string();
                            self.buffer.drain(..=end);
                            segments.push(Segment::Reveal(id));
                        },
                        None if tail.len() > MAX_SENTINEL_LEN => {
                            // Unterminated sentinel: give up and emit as text.
                            segments.push(Segment::Text(std::mem::take(&mut self.buffer)));
                        },
                        None => break,
                    }
                },
            }
        }

        segments
    }

    /// Flush any buffered partial sentinel as plain text.
    pub fn finish(&mut self) -> Option<Segment> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(Segment::Text(std::mem::take(&mut self.buffer)))
        }
    }
}

fn consume_one_char(buffer: &mut String) -> String {
    let ch = buffer.chars().next().expect("buffer not empty");
    let text = ch.to_string();
    buffer.drain(..ch.len_utf8());
    text
}

// ============================================================================
// Turn Runner
// ============================================================================

/// Everything a turn needs, captured at admission time.
pub struct TurnRequest {
    pub deps: Arc<AgentDeps>,
    pub guard: TurnGuard,
    pub persona: Persona,
    /// Active persona before delegation ran; restored on turn failure.
    pub pre_turn_persona: String,
    pub template: Option<Template>,
    pub messages: Vec<Message>,
    pub query: String,
}

pub struct TurnRunner {
    llm: Arc<LlmService>,
    prompts: Arc<PromptLibrary>,
    dispatcher: Arc<ToolDispatcher>,
    postprocessor: Arc<PostProcessor>,
}

impl TurnRunner {
    pub fn new(
        llm: Arc<LlmService>,
        prompts: Arc<PromptLibrary>,
        dispatcher: Arc<ToolDispatcher>,
        postprocessor: Arc<PostProcessor>,
    ) -> Self {
        Self { llm, prompts, dispatcher, postprocessor }
    }

    /// Spawn the turn producer; events arrive lazily on the returned
    /// receiver. The turn guard is released when the producer finishes.
    pub fn spawn_turn(self: &Arc<Self>, request: TurnRequest) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let deps = Arc::clone(&request.deps);
            runner.run_turn(&deps, request, tx).await;
        });
        rx
    }

    async fn run_turn(
        &self,
        deps: &Arc<AgentDeps>,
        request: TurnRequest,
        tx: mpsc::Sender<TurnEvent>,
    ) {
        let turn_id = uuid::Uuid::new_v4();
        tracing::debug!(
            "Starting turn {} for thread {} with persona {}",
            turn_id,
            deps.thread_id,
            request.persona.id()
        );
        let pre_turn_persona = request.pre_turn_persona.clone();

        // The pre-processor already assigned the post-delegation persona;
        // the initial snapshot must reflect it.
        if tx
            .send(TurnEvent::StateSnapshot(deps.snapshot_state()))
            .await
            .is_err()
        {
            return;
        }

        match self.drive_agent(deps, &request, &tx).await {
            Ok((response_text, usage)) => {
                let turn = CompletedTurn {
                    query: request.query.clone(),
                    response: response_text,
                    usage,
                    persona: request.persona.id().to_string(),
                    history: self.build_history(&request, deps),
                };
                let final_state = self.postprocessor.post_process(deps, &turn).await;
                let _ = tx.send(TurnEvent::StateSnapshot(final_state)).await;
                let _ = tx.send(TurnEvent::Done).await;
            },
            Err(TurnFailure::Cancelled { usage }) => {
                // Client went away; record whatever tokens were produced in
                // a detached scope so the stream teardown is not blocked.
                self.spawn_detached_usage(deps, &request, usage);
            },
            Err(TurnFailure::Failed { message, usage }) => {
                tracing::error!(
                    "Turn failed for thread {}: {}",
                    deps.thread_id,
                    message
                );
                // Failed turns leave the persona as it was before the turn;
                // usage is still recorded for any tokens produced.
                deps.update_state(|s| s.active_persona = pre_turn_persona.clone());
                if usage.total() > 0 {
                    self.spawn_detached_usage(deps, &request, usage);
                }
                let _ = tx.send(TurnEvent::Error { message }).await;
                let _ = tx.send(TurnEvent::Done).await;
            },
        }
    }

    /// Run the model/tool loop. Returns the final response text and the
    /// accumulated usage.
    async fn drive_agent(
        &self,
        deps: &Arc<AgentDeps>,
        request: &TurnRequest,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<(String, TokenUsage), TurnFailure> {
        let mut chat_messages = self.build_history(request, deps);
        let tools = self.dispatcher.definitions(request.persona.toolset());

        let mut total_usage = TokenUsage::default();
        let mut response_text = String::new();
        let mut scanner = RevealScanner::default();
        let mut revealed: HashSet<String> = HashSet::new();
        let mut retry_counts: HashMap<String, u32> = HashMap::new();

        for round in 0..MAX_AGENT_ROUNDS {
            let (delta_tx, mut delta_rx) = mpsc::channel::<String>(EVENT_CHANNEL_CAPACITY);

            let llm = Arc::clone(&self.llm);
            let round_messages = chat_messages.clone();
            let round_tools = tools.clone();
            let stream_handle = tokio::spawn(async move {
                llm.chat_stream(ModelTier::Main, &round_messages, &round_tools, delta_tx)
                    .await
            });

            while let Some(delta) = delta_rx.recv().await {
                for segment in scanner.push(&delta) {
                    self.emit_segment(deps, segment, &mut revealed, &mut response_text, tx)
                        .await
                        .map_err(|_| TurnFailure::Cancelled { usage: total_usage })?;
                }
            }

            let outcome = match stream_handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    return Err(TurnFailure::Failed {
                        message: format!("model call failed: {}", e),
                        usage: total_usage,
                    });
                },
                Err(e) => {
                    return Err(TurnFailure::Failed {
                        message: format!("model task panicked: {}", e),
                        usage: total_usage,
                    });
                },
            };
            total_usage.accumulate(outcome.usage);

            if let Some(segment) = scanner.finish() {
                self.emit_segment(deps, segment, &mut revealed, &mut response_text, tx)
                    .await
                    .map_err(|_| TurnFailure::Cancelled { usage: total_usage })?;
            }

            if outcome.tool_calls.is_empty() {
                return Ok((response_text, total_usage));
            }

            // Tool round: echo the calls, dispatch each, feed results back.
            chat_messages.push(ChatMessage::assistant_tool_calls(&outcome.tool_calls));

            for call in &outcome.tool_calls {
                if tx
                    .send(TurnEvent::ToolCall {
                        id: call.id.clone(),
                        tool: call.name.clone(),
                        args: call.arguments.clone(),
                    })
                    .await
                    .is_err()
                {
                    return Err(TurnFailure::Cancelled { usage: total_usage });
                }

                let result_text = match self.dispatcher.dispatch(deps, &call.name, &call.arguments).await
                {
                    Ok(response) => {
                        let output = serde_json::to_value(&response)
                            .unwrap_or_else(|_| serde_json::json!({"content": response.content.clone()}));
                        if tx
                            .send(TurnEvent::ToolResult { id: call.id.clone(), output })
                            .await
                            .is_err()
                        {
                            return Err(TurnFailure::Cancelled { usage: total_usage });
                        }
                        response.content
                    },
                    Err(e) => {
                        let attempts = retry_counts.entry(call.name.clone()).or_insert(0);
                        *attempts += 1;
                        if *attempts > TOOL_RETRY_BUDGET {
                            return Err(TurnFailure::Failed {
                                message: format!(
                                    "tool '{}' exhausted its retry budget: {}",
                                    call.name, e
                                ),
                                usage: total_usage,
                            });
                        }
                        tracing::warn!(
                            "Tool '{}' failed in thread {} (attempt {}): {}",
                            call.name,
                            deps.thread_id,
                            attempts,
                            e
                        );
                        let retry_instruction =
                            format!("{} Please correct the arguments and try again.", e);
                        if tx
                            .send(TurnEvent::ToolResult {
                                id: call.id.clone(),
                                output: serde_json::json!({"error": retry_instruction}),
                            })
                            .await
                            .is_err()
                        {
                            return Err(TurnFailure::Cancelled { usage: total_usage });
                        }
                        retry_instruction
                    },
                };

                chat_messages.push(ChatMessage::tool_result(call.id.clone(), result_text));
            }

            if round == MAX_AGENT_ROUNDS - 1 {
                return Err(TurnFailure::Failed {
                    message: format!("agent exceeded {} tool rounds", MAX_AGENT_ROUNDS),
                    usage: total_usage,
                });
            }
        }

        // Loop always returns from within.
        unreachable!("agent loop must return")
    }

    /// Emit one scanned segment: text as deltas, reveals as a marker plus
    /// the visualization payload. Repeat reveals of the same id emit
    /// nothing.
    async fn emit_segment(
        &self,
        deps: &Arc<AgentDeps>,
        segment: Segment,
        revealed: &mut HashSet<String>,
        response_text: &mut String,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<(), ()> {
        match segment {
            Segment::Text(text) => {
                response_text.push_str(&text);
                tx.send(TurnEvent::TextDelta { delta: text })
                    .await
                    .map_err(|_| ())
            },
            Segment::Reveal(id) => {
                if !revealed.insert(id.clone()) {
                    return Ok(());
                }
                tx.send(TurnEvent::RevealMarker { tool_call_id: id.clone() })
                    .await
                    .map_err(|_| ())?;
                if let Some(call) = deps.hidden_call(&id) {
                    tx.send(TurnEvent::ToolResult { id, output: call.payload })
                        .await
                        .map_err(|_| ())?;
                } else {
                    tracing::warn!(
                        "Reveal marker for unknown visualization '{}' in thread {}",
                        id,
                        deps.thread_id
                    );
                }
                Ok(())
            },
        }
    }

    /// Build the model-facing message history: persona instructions, the
    /// conversation, and the selected template as a trailing system message.
    fn build_history(&self, request: &TurnRequest, deps: &AgentDeps) -> Vec<ChatMessage> {
        let vars = PromptVars {
            migration_target: deps.migration_target.clone(),
            data_schema: schema_listing(&deps.store.views(), false),
        };
        let instructions =
            self.prompts
                .instructions(request.persona.id(), &deps.llm_provider, &vars);

        let mut history = Vec::with_capacity(request.messages.len() + 2);
        if !instructions.is_empty() {
            history.push(ChatMessage::system(instructions));
        }
        for message in &request.messages {
            history.push(match message.role {
                MessageRole::User => ChatMessage::user(message.content.clone()),
                MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
                MessageRole::System | MessageRole::Tool => {
                    ChatMessage::system(message.content.clone())
                },
            });
        }
        if let Some(template) = &request.template {
            tracing::info!(
                "Inserting template '{}' as system message for thread: {}",
                template.name,
                deps.thread_id
            );
            history.push(ChatMessage::system(template.to_system_content(&vars)));
        }
        history
    }

    /// Best-effort usage recording in a detached scope with a timeout.
    fn spawn_detached_usage(&self, deps: &Arc<AgentDeps>, request: &TurnRequest, usage: TokenUsage) {
        let postprocessor = Arc::clone(&self.postprocessor);
        let deps = Arc::clone(deps);
        let turn = CompletedTurn {
            query: request.query.clone(),
            response: String::new(),
            usage,
            persona: request.persona.id().to_string(),
            history: Vec::new(),
        };
        tokio::spawn(async move {
            if tokio::time::timeout(
                DETACHED_USAGE_TIMEOUT,
                postprocessor.record_usage(&deps, &turn),
            )
            .await
            .is_err()
            {
                tracing::warn!(
                    "Detached usage recording timed out for thread {}",
                    deps.thread_id
                );
            }
        });
    }
}

enum TurnFailure {
    Cancelled { usage: TokenUsage },
    Failed { message: String, usage: TokenUsage },
}
