//! Turn API Handler
//!
//! `POST /api` accepts a run input (thread id, ordered messages, opaque
//! state) and responds with a stream of newline-delimited turn events.
//! Invalid input returns 422, quota breaches 429, concurrent turns 409.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::AppState;
use crate::models::agent::{AgentState, RunInput};
use crate::services::runner::TurnRequest;
use crate::utils::{ApiError, ApiResult};

/// Handle one conversational turn with a streamed event response.
pub async fn run_turn(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Response> {
    // Parse and validate the run input.
    let run_input: RunInput = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("malformed run input: {}", e)))?;

    let agent_state: AgentState = if run_input.state.is_null() {
        AgentState::default()
    } else {
        serde_json::from_value(run_input.state.clone())
            .map_err(|e| ApiError::InvalidRequest(format!("malformed agent state: {}", e)))?
    };

    let thread_id = run_input.thread_id.clone();
    tracing::debug!("Handling turn request for thread: {}", thread_id);

    // Quota admission runs before any LLM activity.
    if let Some(user_id) = &agent_state.user_id {
        state.usage.check_quota(user_id).map_err(|e| {
            tracing::warn!(
                "Quota exceeded for user {}: tokens ({}/{})",
                user_id,
                e.current_usage,
                e.limit
            );
            ApiError::from(e)
        })?;
    }

    // Admit the turn; a thread runs at most one turn at a time.
    let deps = state.threads.get_or_create(&thread_id);
    let guard = state
        .threads
        .begin_turn(&deps)
        .ok_or_else(|| ApiError::ConcurrentTurn(thread_id.clone()))?;

    // Parallel pre-processing: template selection + persona delegation.
    let outcome = state
        .preprocessor
        .pre_process(&run_input.messages, &agent_state, &thread_id)
        .await;

    let pre_turn_persona = agent_state.active_persona.clone();
    let mut turn_state = agent_state;
    turn_state.active_persona = outcome.persona.id().to_string();
    deps.set_state(turn_state);

    tracing::debug!("Using persona: {} for thread: {}", outcome.persona.id(), thread_id);

    let query = run_input.last_user_query();
    let request = TurnRequest {
        deps,
        guard,
        persona: outcome.persona,
        pre_turn_persona,
        template: outcome.template,
        messages: run_input.messages,
        query,
    };

    let events = state.runner.spawn_turn(request);
    let stream =
        ReceiverStream::new(events).map(|event| Ok::<_, Infallible>(event.to_wire_line()));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
