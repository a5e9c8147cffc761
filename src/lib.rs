//! Waypoint Library
//!
//! This library contains all the core modules for the Waypoint application:
//! the multi-persona chat runtime and the architecture scoring engine.

use std::sync::Arc;

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use services::llm::{LlmError, LlmService};
pub use services::{
    AnalyticalStore, MemoryStore, Persona, PostProcessor, PreProcessor, PromptLibrary,
    Recommender, ScoringEngine, TemplateLibrary, ThreadRegistry, ToolDispatcher, TurnRunner,
    UsageTracker,
};
pub use utils::{ApiError, ApiResult};

/// Application shared state
///
/// Design Philosophy: Keep it simple - Rust's type system IS our DI container.
/// All services are wrapped in Arc for cheap cloning and thread safety.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Arc<dyn AnalyticalStore>,
    pub threads: Arc<ThreadRegistry>,
    pub usage: Arc<UsageTracker>,
    pub llm: Arc<LlmService>,

    pub preprocessor: Arc<PreProcessor>,
    pub runner: Arc<TurnRunner>,
}
