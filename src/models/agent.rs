//! Agent Runtime Models
//!
//! State synchronized between backend and client, turn run-input, and
//! chat message shapes.

use serde::{Deserialize, Serialize};

/// A follow-up suggestion generated after a turn, written from the user's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    /// Short text shown in a pill above the input box.
    pub pill_text: String,
    /// Full query submitted when the pill is clicked.
    pub suggestion: String,
}

impl SuggestionItem {
    pub fn format_line(&self) -> String {
        format!("**{}**: {}", self.pill_text, self.suggestion)
    }
}

/// Thread state synchronized with the client via StateSnapshot events.
/// Must stay JSON-serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Identifier of the active persona.
    pub active_persona: String,
    /// Whether to run persona delegation before each response.
    pub auto_delegate: bool,
    #[serde(default)]
    pub suggestions: Vec<SuggestionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            active_persona: "core".to_string(),
            auto_delegate: true,
            suggestions: Vec::new(),
            user_id: None,
        }
    }
}

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// One ordered turn of the conversation as received from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }
}

/// Run input for one turn, posted to `/api`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInput {
    pub thread_id: String,
    pub messages: Vec<Message>,
    /// Opaque client state; validated into `AgentState`.
    #[serde(default)]
    pub state: serde_json::Value,
}

impl RunInput {
    /// The textual content of the last user message, used for usage logging.
    pub fn last_user_query(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}
