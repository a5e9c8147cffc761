use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use waypoint::config::Config;
use waypoint::services::tools::Recommender;
use waypoint::services::usage::{QuotaLimits, UsageSweepTask, UsageWriter};
use waypoint::services::{
    LlmService, MemoryStore, Persona, PostProcessor, PreProcessor, PromptLibrary, ScoringEngine,
    TemplateLibrary, ThreadRegistry, ToolDispatcher, TurnRunner, UsageTracker, load_catalog,
};
use waypoint::utils::ScheduledExecutor;
use waypoint::{AppState, handlers};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::data::get_data,
    ),
    tags(
        (name = "Data", description = "Thread-scoped data retrieval"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);

    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("waypoint.log");

        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Waypoint starting up");
    tracing::info!("Configuration loaded successfully");

    // Analytical store and thread registry
    let store = Arc::new(MemoryStore::with_default_views());
    let threads = Arc::new(ThreadRegistry::new(
        store.clone(),
        config.agents.migration_target.clone(),
        config.agents.llm_provider.clone(),
    ));

    // Usage tracking: JSONL sink plus rolling-window quota state restored
    // from the log
    let usage_writer = match UsageWriter::open(&config.telemetry.usage_log_file) {
        Ok(writer) => Some(writer),
        Err(e) => {
            tracing::warn!(
                "Could not open usage log '{}': {}; usage records will not be persisted",
                config.telemetry.usage_log_file,
                e
            );
            None
        },
    };
    let usage = Arc::new(UsageTracker::new(
        QuotaLimits {
            daily_token_limit: config.quota.daily_token_limit,
            window_hours: config.quota.window_hours,
        },
        config.quota.enforce,
        usage_writer,
    ));
    usage.replay_log(&config.telemetry.usage_log_file);
    if let Some(limit) = config.quota.daily_token_limit {
        tracing::info!(
            "Quota limits: tokens={}, window={}h, enforce={}",
            limit,
            config.quota.window_hours,
            config.quota.enforce
        );
    }

    // LLM service
    let llm = Arc::new(LlmService::from_config(&config.agents));
    tracing::info!(
        "LLM service initialized (provider={}, main={}, light={})",
        config.agents.llm_provider,
        config.agents.model_main,
        config.agents.model_light
    );

    // Prompts and templates
    let prompts = Arc::new(PromptLibrary::new(&config.agents.prompts_dir));
    let templates = Arc::new(TemplateLibrary::load(&config.agents.templates_dir));

    // Architecture recommendation toolset (requires a catalog)
    let recommender = match &config.agents.catalog_path {
        Some(path) => {
            let catalog = load_catalog(path)?;
            let contexts_dir = config.agents.contexts_dir.as_ref().map(PathBuf::from);
            Some(Arc::new(Recommender::new(ScoringEngine::new(catalog), contexts_dir)))
        },
        None => {
            tracing::warn!("No architecture catalog configured; recommendation tools disabled");
            None
        },
    };
    let dispatcher = Arc::new(ToolDispatcher::new(recommender));

    // Turn pipeline
    let forced_persona = match &config.agents.force_persona {
        Some(id) => match Persona::parse(id) {
            Some(persona) => {
                tracing::info!("Forcing persona '{}' for all requests", persona.id());
                Some(persona)
            },
            None => {
                return Err(format!("Unknown forced persona: {}", id).into());
            },
        },
        None => None,
    };
    let preprocessor = Arc::new(PreProcessor::new(
        llm.clone(),
        templates.clone(),
        forced_persona,
        config.agents.apply_templates,
    ));
    let postprocessor = Arc::new(PostProcessor::new(llm.clone(), templates.clone(), usage.clone()));
    let runner = Arc::new(TurnRunner::new(
        llm.clone(),
        prompts.clone(),
        dispatcher,
        postprocessor,
    ));

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        threads: threads.clone(),
        usage: usage.clone(),
        llm,
        preprocessor,
        runner,
    });

    // Hourly sweep of idle usage aggregators
    {
        let executor = ScheduledExecutor::new("usage-sweep", Duration::from_secs(3600));
        let task = UsageSweepTask { tracker: usage.clone() };
        tokio::spawn(async move {
            executor.start(task).await;
        });
    }

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api", post(handlers::api::run_turn))
        .route("/data", get(handlers::data::get_data))
        .route("/health", get(health_check))
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Waypoint is ready to serve requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release every thread's scratch namespace on the way out.
    tracing::info!("Waypoint shutting down, cleaning up thread state...");
    threads.cleanup_all().await;

    Ok(())
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({"status": "ok"}))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
