//! Data Retrieval Handler
//!
//! `GET /data` returns the columns and rows behind a stored scratch
//! reference or a configured view, scoped to the requesting thread.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use crate::AppState;
use crate::services::analytics::{DataTable, StoreError};
use crate::utils::{ApiError, ApiResult};

/// Retrieve stored data by reference with thread-scoped isolation
#[utoipa::path(
    get,
    path = "/data",
    params(
        ("ref" = String, Query, description = "View name or output reference"),
        ("thread_id" = Option<String>, Query, description = "Thread ID for scoped lookup (default: \"default\")"),
        ("limit" = Option<i64>, Query, description = "Max rows to return (-1 for all)")
    ),
    responses(
        (status = 200, description = "Data found and returned"),
        (status = 400, description = "Missing or invalid parameters"),
        (status = 404, description = "Reference not found in thread"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<impl IntoResponse> {
    let reference = params
        .get("ref")
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::MissingParameter("ref".to_string()))?;

    let thread_id = params
        .get("thread_id")
        .cloned()
        .unwrap_or_else(|| "default".to_string());

    let limit: i64 = match params.get("limit") {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::InvalidRequest("Parameter 'limit' must be an integer".into()))?,
        None => -1,
    };

    tracing::debug!("Data request: ref={}, thread_id={}, limit={}", reference, thread_id, limit);

    let table = lookup(&state, reference, &thread_id).await?;
    let table = if limit >= 0 { table.head(limit as usize) } else { table };

    Ok(Json(table))
}

/// Resolve a reference: configured views first, then the thread's scratch
/// namespace.
async fn lookup(state: &AppState, reference: &str, thread_id: &str) -> Result<DataTable, ApiError> {
    let is_view = state.store.views().iter().any(|v| v.name == reference);

    let result = if is_view {
        state
            .store
            .execute_view(reference, &format!("SELECT * FROM {}", reference))
            .await
    } else {
        state.store.fetch(thread_id, reference).await
    };

    result.map_err(|e| match e {
        StoreError::OutputNotFound { reference, .. } | StoreError::ViewNotFound { name: reference, .. } => {
            ApiError::NotFound { reference, thread_id: thread_id.to_string() }
        },
        StoreError::Sql(message) => ApiError::Internal(message),
    })
}
