//! LLM Client - HTTP client for OpenAI-compatible APIs
//!
//! Uses reqwest to call LLM APIs. Compatible with:
//! - OpenAI
//! - Azure OpenAI
//! - Other OpenAI-compatible gateways

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::models::*;

/// LLM HTTP Client
pub struct LlmClient {
    http_client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        let http_client = Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client, api_base: api_base.into(), api_key }
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingApiKey("<unset>".to_string()))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn build_request(
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        json_mode: bool,
        stream: bool,
    ) -> ChatCompletionRequest {
        let tools = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| ToolWrapper {
                        kind: "function".to_string(),
                        function: FunctionWrapper {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        ChatCompletionRequest {
            model: params.model.clone(),
            messages: messages.to_vec(),
            max_tokens: Some(params.max_tokens),
            temperature: Some(params.temperature),
            response_format: json_mode.then(|| ResponseFormat { kind: "json_object".to_string() }),
            tools,
            stream,
            stream_options: stream.then(|| StreamOptions { include_usage: true }),
        }
    }

    /// Call chat completion API and wait for the full response.
    pub async fn chat(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatOutcome, LlmError> {
        let api_key = self.api_key()?;
        let chat_request = Self::build_request(params, messages, tools, json_mode, false);

        tracing::debug!(
            "Calling LLM API: {} with model {}",
            self.completions_url(),
            params.model
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(params.timeout)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(params.timeout.as_secs())
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("Empty response from LLM".to_string()))?;

        let tool_calls = decode_tool_calls(choice.message.tool_calls.unwrap_or_default())?;

        Ok(ChatOutcome {
            text: choice.message.content,
            tool_calls,
            usage: chat_response.usage.map(Usage::into_tokens).unwrap_or_default(),
        })
    }

    /// Call chat completion API in streaming mode.
    ///
    /// Text deltas are forwarded through `delta_tx` as they arrive; the
    /// accumulated outcome (full text, tool calls, usage) is returned when
    /// the stream completes. A closed receiver cancels the call.
    pub async fn chat_stream(
        &self,
        params: &TierParams,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        delta_tx: mpsc::Sender<String>,
    ) -> Result<ChatOutcome, LlmError> {
        let api_key = self.api_key()?;
        let chat_request = Self::build_request(params, messages, tools, false, true);

        let response = self
            .http_client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(params.timeout)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(params.timeout.as_secs())
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let mut accumulator = StreamAccumulator::default();
        let mut byte_stream = response.bytes_stream();
        let mut line_buffer = String::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::ApiError(e.to_string()))?;
            line_buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = line_buffer.find('\n') {
                let line = line_buffer[..pos].trim().to_string();
                line_buffer.drain(..=pos);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let chunk: StreamChunk = serde_json::from_str(data)
                    .map_err(|e| LlmError::ParseError(format!("bad stream chunk: {}", e)))?;
                if let Some(delta) = accumulator.apply(chunk)
                    && delta_tx.send(delta).await.is_err()
                {
                    // Receiver dropped: client disconnected.
                    return Err(LlmError::Cancelled);
                }
            }
        }

        accumulator.finish()
    }
}

// ============================================================================
// Stream Accumulation
// ============================================================================

/// Accumulates streamed deltas into a final `ChatOutcome`.
#[derive(Default)]
struct StreamAccumulator {
    text: String,
    tool_calls: Vec<PartialToolCall>,
    usage: TokenUsage,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    /// Apply one chunk; returns the text delta to forward, if any.
    fn apply(&mut self, chunk: StreamChunk) -> Option<String> {
        if let Some(usage) = chunk.usage {
            self.usage = usage.into_tokens();
        }

        let choice = chunk.choices.into_iter().next()?;
        let delta = choice.delta;

        for tc in delta.tool_calls.unwrap_or_default() {
            let index = tc.index as usize;
            while self.tool_calls.len() <= index {
                self.tool_calls.push(PartialToolCall::default());
            }
            let slot = &mut self.tool_calls[index];
            if let Some(id) = tc.id {
                slot.id = id;
            }
            if let Some(function) = tc.function {
                if let Some(name) = function.name {
                    slot.name.push_str(&name);
                }
                if let Some(args) = function.arguments {
                    slot.arguments.push_str(&args);
                }
            }
        }

        match delta.content {
            Some(content) if !content.is_empty() => {
                self.text.push_str(&content);
                Some(content)
            },
            _ => None,
        }
    }

    fn finish(self) -> Result<ChatOutcome, LlmError> {
        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for partial in self.tool_calls {
            let arguments = if partial.arguments.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&partial.arguments).map_err(|e| {
                    LlmError::ParseError(format!(
                        "invalid tool call arguments for '{}': {}",
                        partial.name, e
                    ))
                })?
            };
            tool_calls.push(ToolCallRequest { id: partial.id, name: partial.name, arguments });
        }

        Ok(ChatOutcome {
            text: (!self.text.is_empty()).then_some(self.text),
            tool_calls,
            usage: self.usage,
        })
    }
}

fn decode_tool_calls(payloads: Vec<ToolCallPayload>) -> Result<Vec<ToolCallRequest>, LlmError> {
    payloads
        .into_iter()
        .map(|p| {
            let arguments = if p.function.arguments.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&p.function.arguments).map_err(|e| {
                    LlmError::ParseError(format!(
                        "invalid tool call arguments for '{}': {}",
                        p.function.name, e
                    ))
                })?
            };
            Ok(ToolCallRequest { id: p.id, name: p.function.name, arguments })
        })
        .collect()
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolWrapper>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ToolWrapper {
    #[serde(rename = "type")]
    kind: String,
    function: FunctionWrapper,
}

#[derive(Debug, Serialize)]
struct FunctionWrapper {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl Usage {
    fn into_tokens(self) -> TokenUsage {
        TokenUsage { input_tokens: self.prompt_tokens, output_tokens: self.completion_tokens }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(json: &str) -> StreamChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_accumulator_collects_text_deltas() {
        let mut acc = StreamAccumulator::default();
        let d1 = acc.apply(chunk(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#));
        let d2 = acc.apply(chunk(r#"{"choices":[{"delta":{"content":"lo"}}]}"#));
        assert_eq!(d1.as_deref(), Some("Hel"));
        assert_eq!(d2.as_deref(), Some("lo"));

        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.text.as_deref(), Some("Hello"));
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn test_accumulator_assembles_fragmented_tool_call() {
        let mut acc = StreamAccumulator::default();
        acc.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"query_view","arguments":"{\"view"}}]}}]}"#,
        ));
        acc.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"_name\": \"apps\"}"}}]}}]}"#,
        ));
        acc.apply(chunk(r#"{"usage":{"prompt_tokens":12,"completion_tokens":7}}"#));

        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "query_view");
        assert_eq!(outcome.tool_calls[0].arguments["view_name"], "apps");
        assert_eq!(outcome.usage.input_tokens, 12);
        assert_eq!(outcome.usage.output_tokens, 7);
    }

    #[test]
    fn test_invalid_tool_arguments_is_parse_error() {
        let mut acc = StreamAccumulator::default();
        acc.apply(chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c","function":{"name":"f","arguments":"{broken"}}]}}]}"#,
        ));
        assert!(matches!(acc.finish(), Err(LlmError::ParseError(_))));
    }
}
