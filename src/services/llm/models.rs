//! LLM Data Models
//!
//! Wire types for OpenAI-compatible chat completions, tier parameters,
//! and the LLM error taxonomy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Model Tiers
// ============================================================================

/// Model tier selecting cost/latency characteristics.
///
/// Light tier serves the pre/post-processing helpers (delegation, template
/// selection, suggestions); main tier serves the persona agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Light,
    Main,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Main => "main",
        }
    }
}

/// Resolved parameters for one tier.
#[derive(Debug, Clone)]
pub struct TierParams {
    pub model: String,
    pub timeout: Duration,
    pub temperature: f64,
    pub max_tokens: u32,
}

// ============================================================================
// Chat Messages
// ============================================================================

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    /// Assistant message echoing the tool calls the model requested.
    pub fn assistant_tool_calls(calls: &[ToolCallRequest]) -> Self {
        let payloads = calls
            .iter()
            .map(|c| ToolCallPayload {
                id: c.id.clone(),
                kind: "function".into(),
                function: FunctionCallPayload {
                    name: c.name.clone(),
                    arguments: c.arguments.to_string(),
                },
            })
            .collect();
        Self { role: "assistant".into(), content: None, tool_calls: Some(payloads), tool_call_id: None }
    }

    /// Tool result message answering a specific tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Tool call as carried on an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCallPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallPayload {
    pub name: String,
    /// JSON-encoded arguments string, as the wire format carries it.
    pub arguments: String,
}

/// Tool exposed to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: serde_json::Value,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Token usage for a single model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A tool call the model requested, with decoded arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Final outcome of one chat completion round.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    /// Assistant text, if any.
    pub text: Option<String>,
    /// Tool calls requested by the model, if any.
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: TokenUsage,
}

impl ChatOutcome {
    pub fn text_only(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self { text: Some(text.into()), tool_calls: Vec::new(), usage }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// LLM transport errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API key not set (expected in env var {0})")]
    MissingApiKey(String),

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM response parsing error: {0}")]
    ParseError(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("LLM call cancelled")]
    Cancelled,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_) | Self::ApiError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage { input_tokens: 10, output_tokens: 5 };
        usage.accumulate(TokenUsage { input_tokens: 3, output_tokens: 7 });
        assert_eq!(usage.input_tokens, 13);
        assert_eq!(usage.output_tokens, 12);
        assert_eq!(usage.total(), 25);
    }

    #[test]
    fn test_tool_result_message_shape() {
        let msg = ChatMessage::tool_result("call_1", "42 rows");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_assistant_tool_calls_roundtrip() {
        let call = ToolCallRequest {
            id: "call_9".into(),
            name: "query_view".into(),
            arguments: serde_json::json!({"view_name": "application_overview"}),
        };
        let msg = ChatMessage::assistant_tool_calls(std::slice::from_ref(&call));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["tool_calls"][0]["function"]["name"], "query_view");
    }
}
