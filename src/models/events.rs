//! Turn Event Protocol
//!
//! Typed events streamed to the client for one turn. Each event serializes
//! as a self-describing record `{"type": ..., "payload": ...}`.

use serde::{Deserialize, Serialize};

use super::agent::AgentState;

/// One event in the outbound turn stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Full agent state. Emitted once before model output and once after
    /// post-processing completes.
    StateSnapshot(AgentState),
    /// Incremental assistant text.
    TextDelta { delta: String },
    /// The agent invoked a tool.
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// Result of a tool invocation. Also carries revealed visualization
    /// payloads keyed by their hidden-call id.
    ToolResult {
        id: String,
        output: serde_json::Value,
    },
    /// A hidden visualization was revealed at this point in the text.
    RevealMarker { tool_call_id: String },
    /// Recoverable turn failure; always followed by `Done`.
    Error { message: String },
    /// Terminal event for the turn.
    Done,
}

impl TurnEvent {
    /// Encode as one newline-delimited JSON record for the wire.
    pub fn to_wire_line(&self) -> String {
        // Serialization of this enum cannot fail; all payloads are plain data.
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            "{\"type\":\"error\",\"payload\":{\"message\":\"event encoding failed\"}}".to_string()
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_as_type_payload() {
        let event = TurnEvent::TextDelta { delta: "hello".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["payload"]["delta"], "hello");

        let event = TurnEvent::RevealMarker { tool_call_id: "chart_output_1_Scores".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reveal_marker");
        assert_eq!(json["payload"]["tool_call_id"], "chart_output_1_Scores");
    }

    #[test]
    fn test_done_has_no_payload_fields() {
        let line = TurnEvent::Done.to_wire_line();
        assert!(line.ends_with('\n'));
        let json: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(json["type"], "done");
    }

    #[test]
    fn test_state_snapshot_carries_full_state() {
        let event = TurnEvent::StateSnapshot(AgentState::default());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "state_snapshot");
        assert_eq!(json["payload"]["active_persona"], "core");
    }
}
