//! Tool Surface
//!
//! Typed tools the persona agents invoke, dispatched against the current
//! turn's `AgentDeps`. Every tool error surfaces to the model as a
//! retryable instruction rather than terminating the stream; the runner
//! enforces the per-call retry budget.

pub mod architecture;
pub mod charts;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::services::analytics::StoreError;
use crate::services::llm::ToolDefinition;
use crate::services::personas::Toolset;
use crate::services::threads::{AgentDeps, HiddenToolCall, RevealOutcome, VisualizationKind};

pub use architecture::Recommender;
pub use charts::{ChartSpec, ChartType};

/// Maximum rows included in tool result previews.
const PREVIEW_ROWS: usize = 5;

/// Retry budget per tool call enforced by the runner.
pub const TOOL_RETRY_BUDGET: u32 = 5;

// ============================================================================
// Errors and Responses
// ============================================================================

/// Tool failure surfaced to the model with a retry instruction.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RetryableToolError(pub String);

impl From<StoreError> for RetryableToolError {
    fn from(e: StoreError) -> Self {
        Self(format!("Error: {}. Please check the reference and try again.", e))
    }
}

/// Outcome of one tool dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    /// Text fed back to the model.
    pub content: String,
    /// Visualization payload to emit immediately (non-hidden calls).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Value>,
    /// Hidden-call id when the tool deferred a visualization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_id: Option<String>,
}

impl ToolResponse {
    fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), visualization: None, hidden_id: None }
    }
}

/// KPI tile rendered by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiTile {
    pub label: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<KpiValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<KpiIcon>,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiValueType {
    Currency,
    Count,
    Percentage,
    String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KpiIcon {
    Cloud,
    Server,
    Database,
    Heartbeat,
    PiggyBank,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Dispatches tool calls for the persona agents.
pub struct ToolDispatcher {
    recommender: Option<Arc<Recommender>>,
}

impl ToolDispatcher {
    pub fn new(recommender: Option<Arc<Recommender>>) -> Self {
        Self { recommender }
    }

    /// Tool definitions exposed to the model for a persona's tool set.
    pub fn definitions(&self, toolset: Toolset) -> Vec<ToolDefinition> {
        let mut defs = vec![
            ToolDefinition {
                name: "view_schema".into(),
                description: "Get the schema of a database view, including all columns and \
                              their descriptions."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "view_name": {"type": "string", "description": "Name of the view"}
                    },
                    "required": ["view_name"]
                }),
            },
            ToolDefinition {
                name: "query_view".into(),
                description: "Run a SQL query against a database view. The result is stored as \
                              a new reference in this conversation and a preview is returned. \
                              Include a very brief business-friendly description (under 15 \
                              words) of the action."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "view_name": {"type": "string"},
                        "sql": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["view_name", "sql", "description"]
                }),
            },
            ToolDefinition {
                name: "query_output".into(),
                description: "Run a SQL query against a previously stored output reference \
                              (e.g. output_1). The result is stored as a new reference."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ref": {"type": "string", "description": "Existing output reference"},
                        "sql": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["ref", "sql", "description"]
                }),
            },
            ToolDefinition {
                name: "render_table".into(),
                description: "Display a stored reference as a table. When hidden is true \
                              (the default) the table renders only after reveal_visualization."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "ref": {"type": "string"},
                        "title": {"type": "string"},
                        "hidden": {"type": "boolean", "default": true}
                    },
                    "required": ["ref", "title"]
                }),
            },
            ToolDefinition {
                name: "generate_chart".into(),
                description: "Generate a chart from a stored reference. The x column provides \
                              labels; each y column becomes a series. Doughnut charts take \
                              exactly one y column."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "chart_type": {"type": "string", "enum": ["bar", "line", "doughnut"]},
                        "ref": {"type": "string"},
                        "title": {"type": "string"},
                        "x": {"type": "string"},
                        "ys": {"type": "array", "items": {"type": "string"}},
                        "hidden": {"type": "boolean", "default": true}
                    },
                    "required": ["chart_type", "ref", "title", "x", "ys"]
                }),
            },
            ToolDefinition {
                name: "display_kpi_tiles".into(),
                description: "Display KPI tiles. Use the most appropriate icon, and whole \
                              currency values above $10."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "kpis": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "label": {"type": "string"},
                                    "value": {},
                                    "value_type": {"type": "string", "enum": ["currency", "count", "percentage", "string"]},
                                    "icon": {"type": "string", "enum": ["cloud", "server", "database", "heartbeat", "piggy-bank"]},
                                    "currency_symbol": {"type": "string"}
                                },
                                "required": ["label", "value"]
                            }
                        },
                        "hidden": {"type": "boolean", "default": true}
                    },
                    "required": ["kpis"]
                }),
            },
            ToolDefinition {
                name: "reveal_visualization".into(),
                description: "Reveal a previously hidden visualization. Include the returned \
                              marker in your text response exactly where the visualization \
                              should appear."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "tool_call_id": {"type": "string"}
                    },
                    "required": ["tool_call_id"]
                }),
            },
        ];

        if toolset == Toolset::DataAndArchitecture {
            defs.push(ToolDefinition {
                name: "list_scorable_applications".into(),
                description: "List applications that have a context file available for \
                              architecture scoring."
                    .into(),
                parameters: json!({"type": "object", "properties": {}}),
            });
            defs.push(ToolDefinition {
                name: "recommend_architectures".into(),
                description: "Score an application against the architecture catalog and \
                              return ranked recommendations with explanations."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "application": {"type": "string", "description": "Application name"}
                    },
                    "required": ["application"]
                }),
            });
        }

        defs
    }

    /// Execute one tool call against the thread's dependencies.
    pub async fn dispatch(
        &self,
        deps: &AgentDeps,
        name: &str,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        match name {
            "view_schema" => self.view_schema(deps, args).await,
            "query_view" => self.query_view(deps, args).await,
            "query_output" => self.query_output(deps, args).await,
            "render_table" => self.render_table(deps, args).await,
            "generate_chart" => self.generate_chart(deps, args).await,
            "display_kpi_tiles" => self.display_kpi_tiles(deps, args).await,
            "reveal_visualization" => self.reveal_visualization(deps, args),
            "list_scorable_applications" => self.list_scorable_applications(),
            "recommend_architectures" => self.recommend_architectures(args),
            other => Err(RetryableToolError(format!(
                "Error: unknown tool '{}'. Use one of the provided tools.",
                other
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Data tools
    // ------------------------------------------------------------------

    async fn view_schema(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let view_name = require_str(args, "view_name")?;
        let views = deps.store.views();
        let view = views
            .iter()
            .find(|v| v.name == view_name)
            .ok_or_else(|| {
                let available: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
                RetryableToolError(format!(
                    "Error: No view found with the name '{}'. Available views: {:?}",
                    view_name, available
                ))
            })?;
        Ok(ToolResponse::text(view.schema()))
    }

    async fn query_view(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let view_name = require_str(args, "view_name")?;
        let sql = require_str(args, "sql")?;
        let description = require_str(args, "description")?;
        tracing::debug!(
            "Executing query on view '{}' in thread '{}': {} ({})",
            view_name,
            deps.thread_id,
            sql,
            description
        );

        let result = deps.store.execute_view(view_name, sql).await.map_err(|e| {
            RetryableToolError(format!("Error running SQL: {}. Please try again with a valid SQL query.", e))
        })?;

        let reference = deps.next_output_ref();
        deps.store
            .create_table(&deps.thread_id, &reference, result.clone())
            .await
            .map_err(RetryableToolError::from)?;

        Ok(ToolResponse::text(store_confirmation(&reference, &result)))
    }

    async fn query_output(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let reference = require_str(args, "ref")?;
        let sql = require_str(args, "sql")?;
        let description = require_str(args, "description")?;
        tracing::debug!(
            "Executing query on output '{}' in thread '{}': {} ({})",
            reference,
            deps.thread_id,
            sql,
            description
        );

        // The referenced output must exist in this thread's namespace.
        deps.store
            .fetch(&deps.thread_id, reference)
            .await
            .map_err(RetryableToolError::from)?;

        let result = deps
            .store
            .execute(&deps.thread_id, sql)
            .await
            .map_err(|e| {
                RetryableToolError(format!(
                    "Error running SQL: {}. Please try again with a valid SQL query.",
                    e
                ))
            })?;

        let new_reference = deps.next_output_ref();
        deps.store
            .create_table(&deps.thread_id, &new_reference, result.clone())
            .await
            .map_err(RetryableToolError::from)?;

        Ok(ToolResponse::text(store_confirmation(&new_reference, &result)))
    }

    // ------------------------------------------------------------------
    // Visualization tools
    // ------------------------------------------------------------------

    async fn render_table(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let reference = require_str(args, "ref")?;
        let title = require_str(args, "title")?;
        let hidden = opt_bool(args, "hidden").unwrap_or(true);

        let table = deps
            .store
            .fetch(&deps.thread_id, reference)
            .await
            .map_err(RetryableToolError::from)?;
        let payload = json!({"ref": reference, "title": title, "table": table});

        if hidden {
            let id = visualization_id("table", reference, title);
            deps.register_hidden(HiddenToolCall {
                id: id.clone(),
                kind: VisualizationKind::Table,
                args: args.clone(),
                payload,
                hidden: true,
            });
            tracing::debug!("Table '{}' prepared hidden with id: {}", title, id);
            return Ok(ToolResponse {
                content: format!(
                    "Prepared table '{}' with data from `{}` (hidden). Use \
                     reveal_visualization('{}') to display it.",
                    title, reference, id
                ),
                visualization: None,
                hidden_id: Some(id),
            });
        }

        Ok(ToolResponse {
            content: format!("Rendered table '{}' with data from `{}`.", title, reference),
            visualization: Some(payload),
            hidden_id: None,
        })
    }

    async fn generate_chart(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let chart_type_str = require_str(args, "chart_type")?;
        let chart_type = ChartType::parse(chart_type_str).ok_or_else(|| {
            RetryableToolError(format!(
                "Error: unsupported chart type '{}'. Supported: bar, line, doughnut.",
                chart_type_str
            ))
        })?;
        let reference = require_str(args, "ref")?;
        let title = require_str(args, "title")?;
        let x = require_str(args, "x")?;
        let ys: Vec<String> = args
            .get("ys")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let hidden = opt_bool(args, "hidden").unwrap_or(true);

        let table = deps
            .store
            .fetch(&deps.thread_id, reference)
            .await
            .map_err(RetryableToolError::from)?;

        let spec = ChartSpec::from_table(chart_type, &table, title, x, &ys)
            .map_err(|e| RetryableToolError(format!("Error: {}", e)))?;
        let payload = serde_json::to_value(&spec)
            .map_err(|e| RetryableToolError(format!("Error encoding chart: {}", e)))?;

        if hidden {
            let id = visualization_id("chart", reference, title);
            deps.register_hidden(HiddenToolCall {
                id: id.clone(),
                kind: VisualizationKind::Chart,
                args: args.clone(),
                payload,
                hidden: true,
            });
            tracing::debug!("Chart '{}' prepared hidden with id: {}", title, id);
            return Ok(ToolResponse {
                content: format!(
                    "Prepared {} chart '{}' (hidden). Use reveal_visualization('{}') to \
                     display it.",
                    chart_type.as_str(),
                    title,
                    id
                ),
                visualization: None,
                hidden_id: Some(id),
            });
        }

        Ok(ToolResponse {
            content: format!("Rendered {} chart '{}'.", chart_type.as_str(), title),
            visualization: Some(payload),
            hidden_id: None,
        })
    }

    async fn display_kpi_tiles(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let kpis: Vec<KpiTile> = args
            .get("kpis")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| RetryableToolError(format!("Error: invalid KPI tiles: {}", e)))?
            .unwrap_or_default();
        if kpis.is_empty() {
            return Err(RetryableToolError(
                "Error: at least one KPI tile is required.".to_string(),
            ));
        }
        let hidden = opt_bool(args, "hidden").unwrap_or(true);
        let payload = serde_json::to_value(&kpis)
            .map_err(|e| RetryableToolError(format!("Error encoding KPIs: {}", e)))?;

        if hidden {
            let id = format!("kpi_{}", stable_hash(&payload));
            deps.register_hidden(HiddenToolCall {
                id: id.clone(),
                kind: VisualizationKind::Kpi,
                args: args.clone(),
                payload,
                hidden: true,
            });
            tracing::debug!("KPI tiles prepared hidden with id: {}", id);
            return Ok(ToolResponse {
                content: format!(
                    "Prepared {} KPI tiles (hidden). Use reveal_visualization('{}') to \
                     display them.",
                    kpis.len(),
                    id
                ),
                visualization: None,
                hidden_id: Some(id),
            });
        }

        Ok(ToolResponse {
            content: format!("Displaying {} KPI tiles.", kpis.len()),
            visualization: Some(payload),
            hidden_id: None,
        })
    }

    fn reveal_visualization(
        &self,
        deps: &AgentDeps,
        args: &Value,
    ) -> Result<ToolResponse, RetryableToolError> {
        let id = require_str(args, "tool_call_id")?;
        match deps.reveal(id) {
            RevealOutcome::Revealed(call) => {
                tracing::info!("Revealed {:?} visualization: {}", call.kind, id);
                Ok(ToolResponse::text(format!("[VISUALIZATION:{}]", id)))
            },
            // Idempotent: the marker is returned again but the adapter emits
            // no duplicate reveal.
            RevealOutcome::AlreadyRevealed => {
                Ok(ToolResponse::text(format!("[VISUALIZATION:{}]", id)))
            },
            RevealOutcome::NotFound { available } => Err(RetryableToolError(format!(
                "Error: Tool call ID '{}' not found. Available IDs: {:?}",
                id, available
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Architecture tools
    // ------------------------------------------------------------------

    fn list_scorable_applications(&self) -> Result<ToolResponse, RetryableToolError> {
        let recommender = self.recommender.as_ref().ok_or_else(|| {
            RetryableToolError(
                "Error: no architecture catalog is configured; scoring is unavailable."
                    .to_string(),
            )
        })?;
        let applications = recommender.list_applications();
        if applications.is_empty() {
            return Ok(ToolResponse::text(
                "No applications have context files available for scoring.",
            ));
        }
        Ok(ToolResponse::text(format!(
            "Applications available for scoring: {}",
            applications.join(", ")
        )))
    }

    fn recommend_architectures(&self, args: &Value) -> Result<ToolResponse, RetryableToolError> {
        let application = require_str(args, "application")?;
        let recommender = self.recommender.as_ref().ok_or_else(|| {
            RetryableToolError(
                "Error: no architecture catalog is configured; scoring is unavailable."
                    .to_string(),
            )
        })?;
        let result = recommender
            .recommend(application)
            .map_err(|e| RetryableToolError(format!("Error: {}", e)))?;
        Ok(ToolResponse::text(Recommender::summarize(&result)))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, RetryableToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            RetryableToolError(format!("Error: missing required string argument '{}'.", key))
        })
}

fn opt_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

/// Stable visualization id derived from the arguments, matching the format
/// clients expect.
fn visualization_id(kind: &str, reference: &str, title: &str) -> String {
    format!("{}_{}_{}", kind, reference, title).replace([' ', '-'], "_")
}

fn stable_hash(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

fn store_confirmation(reference: &str, result: &crate::services::analytics::DataTable) -> String {
    let (rows, cols) = result.shape();
    let mut msg = format!(
        "Executed SQL, result is `{}` with {} rows and {} columns.",
        reference, rows, cols
    );
    if rows > PREVIEW_ROWS {
        msg.push_str(&format!(
            "\nHere are the first {} rows:\n{}",
            PREVIEW_ROWS,
            result.preview_tsv(PREVIEW_ROWS)
        ));
    } else {
        msg.push_str(&format!("\nHere is the full result:\n{}", result.preview_tsv(rows)));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analytics::MemoryStore;
    use crate::services::threads::ThreadRegistry;

    fn setup() -> (ThreadRegistry, ToolDispatcher) {
        let store = Arc::new(MemoryStore::with_default_views());
        let registry = ThreadRegistry::new(store, "Azure".into(), "openai".into());
        (registry, ToolDispatcher::new(None))
    }

    #[tokio::test]
    async fn test_query_view_stores_result_with_preview() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        let response = dispatcher
            .dispatch(
                &deps,
                "query_view",
                &json!({
                    "view_name": "application_overview",
                    "sql": "SELECT application, server_count FROM application_overview",
                    "description": "Listing applications"
                }),
            )
            .await
            .unwrap();

        assert!(response.content.contains("`output_1`"));
        assert!(response.content.contains("3 rows"));
        assert!(deps.store.fetch("t1", "output_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_output_requires_existing_ref() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        let err = dispatcher
            .dispatch(
                &deps,
                "query_output",
                &json!({
                    "ref": "output_7",
                    "sql": "SELECT * FROM output_7",
                    "description": "Reading data"
                }),
            )
            .await
            .unwrap_err();
        assert!(err.0.contains("output_7"));
    }

    #[tokio::test]
    async fn test_query_output_chains_references() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        dispatcher
            .dispatch(
                &deps,
                "query_view",
                &json!({
                    "view_name": "server_inventory",
                    "sql": "SELECT server_name, cpu_usage FROM server_inventory",
                    "description": "Reading servers"
                }),
            )
            .await
            .unwrap();

        let response = dispatcher
            .dispatch(
                &deps,
                "query_output",
                &json!({
                    "ref": "output_1",
                    "sql": "SELECT server_name FROM output_1 WHERE cpu_usage > 50",
                    "description": "Finding hot servers"
                }),
            )
            .await
            .unwrap();
        assert!(response.content.contains("`output_2`"));
    }

    #[tokio::test]
    async fn test_hidden_chart_then_reveal_marker() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        dispatcher
            .dispatch(
                &deps,
                "query_view",
                &json!({
                    "view_name": "migration_costs",
                    "sql": "SELECT application, current_monthly_cost FROM migration_costs",
                    "description": "Reading costs"
                }),
            )
            .await
            .unwrap();

        let response = dispatcher
            .dispatch(
                &deps,
                "generate_chart",
                &json!({
                    "chart_type": "bar",
                    "ref": "output_1",
                    "title": "Costs",
                    "x": "application",
                    "ys": ["current_monthly_cost"]
                }),
            )
            .await
            .unwrap();

        let id = response.hidden_id.expect("chart should be hidden by default");
        assert_eq!(id, "chart_output_1_Costs");
        assert!(response.visualization.is_none());

        let reveal = dispatcher
            .dispatch(&deps, "reveal_visualization", &json!({"tool_call_id": id}))
            .await
            .unwrap();
        assert_eq!(reveal.content, "[VISUALIZATION:chart_output_1_Costs]");
    }

    #[tokio::test]
    async fn test_non_hidden_table_renders_immediately() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        dispatcher
            .dispatch(
                &deps,
                "query_view",
                &json!({
                    "view_name": "application_overview",
                    "sql": "SELECT * FROM application_overview",
                    "description": "Reading applications"
                }),
            )
            .await
            .unwrap();

        let response = dispatcher
            .dispatch(
                &deps,
                "render_table",
                &json!({"ref": "output_1", "title": "Applications", "hidden": false}),
            )
            .await
            .unwrap();
        assert!(response.visualization.is_some());
        assert!(response.hidden_id.is_none());
    }

    #[tokio::test]
    async fn test_reveal_unknown_id_is_retryable_with_available_ids() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");

        let err = dispatcher
            .dispatch(&deps, "reveal_visualization", &json!({"tool_call_id": "chart_nope"}))
            .await
            .unwrap_err();
        assert!(err.0.contains("chart_nope"));
    }

    #[tokio::test]
    async fn test_tools_cannot_cross_threads() {
        let (registry, dispatcher) = setup();
        let t1 = registry.get_or_create("t1");
        let t2 = registry.get_or_create("t2");

        dispatcher
            .dispatch(
                &t1,
                "query_view",
                &json!({
                    "view_name": "application_overview",
                    "sql": "SELECT * FROM application_overview",
                    "description": "Reading"
                }),
            )
            .await
            .unwrap();

        // Thread 2 cannot see thread 1's output.
        let err = dispatcher
            .dispatch(
                &t2,
                "render_table",
                &json!({"ref": "output_1", "title": "Stolen"}),
            )
            .await
            .unwrap_err();
        assert!(err.0.contains("output_1"));
    }

    #[tokio::test]
    async fn test_kpi_tiles_hidden_id_is_stable() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");
        let args = json!({
            "kpis": [{"label": "Total Savings", "value": 1800, "value_type": "currency", "icon": "piggy-bank"}]
        });

        let first = dispatcher.dispatch(&deps, "display_kpi_tiles", &args).await.unwrap();
        let second = dispatcher.dispatch(&deps, "display_kpi_tiles", &args).await.unwrap();
        assert_eq!(first.hidden_id, second.hidden_id);
    }

    #[tokio::test]
    async fn test_architecture_tools_unavailable_without_catalog() {
        let (registry, dispatcher) = setup();
        let deps = registry.get_or_create("t1");
        let err = dispatcher
            .dispatch(&deps, "recommend_architectures", &json!({"application": "billing"}))
            .await
            .unwrap_err();
        assert!(err.0.contains("catalog"));
    }

    #[test]
    fn test_architect_toolset_includes_recommendation_tools() {
        let dispatcher = ToolDispatcher::new(None);
        let data_tools = dispatcher.definitions(Toolset::Data);
        let architect_tools = dispatcher.definitions(Toolset::DataAndArchitecture);

        assert!(data_tools.iter().all(|d| d.name != "recommend_architectures"));
        assert!(architect_tools.iter().any(|d| d.name == "recommend_architectures"));
        assert!(architect_tools.len() > data_tools.len());
    }
}
