//! LLM Transport Layer
//!
//! OpenAI-compatible chat client, tiered service wrapper, and the transport
//! trait the rest of the runtime depends on.

pub mod client;
pub mod models;
pub mod service;

pub use client::LlmClient;
pub use models::{
    ChatMessage, ChatOutcome, LlmError, ModelTier, TierParams, TokenUsage, ToolCallRequest,
    ToolDefinition,
};
pub use service::{LlmService, LlmTransport};
