//! AG-UI protocol event types.
//!
//! The event vocabulary is closed: lifecycle, text message, tool call and
//! state-sync families, plus the `RAW` and `CUSTOM` escape hatches. Events are
//! tagged by a `type` field in SCREAMING_SNAKE_CASE and carry camelCase
//! payload fields, as emitted by AG-UI backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patch::PatchOperation;

/// AG-UI protocol events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AguiEvent {
    // ===== Lifecycle Events =====
    /// Agent run started.
    RunStarted {
        /// Thread ID for conversation continuity.
        thread_id: String,
        /// Unique run ID for this execution.
        run_id: String,
        /// Run that spawned this one, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_run_id: Option<String>,
        /// Input the run was started with.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },

    /// Agent run finished successfully.
    RunFinished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        /// Final result of the run.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// Agent run failed with an error.
    RunError {
        /// Error message describing the failure.
        message: String,
        /// Optional error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// A named step within the run started.
    StepStarted { step_name: String },

    /// A named step within the run finished.
    StepFinished { step_name: String },

    // ===== Text Message Events =====
    /// Start of a new text message.
    TextMessageStart {
        /// Unique message ID.
        message_id: String,
        /// Role of the message author.
        #[serde(default)]
        role: MessageRole,
    },

    /// Incremental content for a text message.
    TextMessageContent {
        /// Message ID this content belongs to.
        message_id: String,
        /// Text delta to append.
        delta: String,
    },

    /// End of a text message.
    TextMessageEnd { message_id: String },

    // ===== Tool Call Events =====
    /// Start of a tool call.
    ToolCallStart {
        /// Unique tool call ID.
        tool_call_id: String,
        /// Name of the tool being called.
        tool_call_name: String,
        /// Message the call belongs to, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },

    /// Incremental arguments for a tool call.
    ToolCallArgs {
        /// Tool call ID this belongs to.
        tool_call_id: String,
        /// JSON argument delta.
        delta: String,
    },

    /// End of tool call arguments.
    ToolCallEnd { tool_call_id: String },

    /// Result from a tool call.
    ToolCallResult {
        /// Tool call ID this result is for.
        tool_call_id: String,
        /// Result content (text or JSON string).
        content: String,
        /// Message ID for this result.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<MessageRole>,
    },

    // ===== State Management Events =====
    /// Complete state snapshot.
    StateSnapshot { snapshot: Value },

    /// Incremental state update.
    StateDelta {
        /// Patch operations, applied in order.
        #[serde(alias = "patch")]
        delta: Vec<PatchOperation>,
    },

    // ===== Escape Hatches =====
    /// Opaque event passed through from an external system.
    Raw {
        #[serde(alias = "payload")]
        event: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },

    /// Application-defined event, keyed by name.
    Custom {
        name: String,
        #[serde(default)]
        value: Value,
    },
}

impl AguiEvent {
    /// Returns the discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            AguiEvent::RunStarted { .. } => EventKind::RunStarted,
            AguiEvent::RunFinished { .. } => EventKind::RunFinished,
            AguiEvent::RunError { .. } => EventKind::RunError,
            AguiEvent::StepStarted { .. } => EventKind::StepStarted,
            AguiEvent::StepFinished { .. } => EventKind::StepFinished,
            AguiEvent::TextMessageStart { .. } => EventKind::TextMessageStart,
            AguiEvent::TextMessageContent { .. } => EventKind::TextMessageContent,
            AguiEvent::TextMessageEnd { .. } => EventKind::TextMessageEnd,
            AguiEvent::ToolCallStart { .. } => EventKind::ToolCallStart,
            AguiEvent::ToolCallArgs { .. } => EventKind::ToolCallArgs,
            AguiEvent::ToolCallEnd { .. } => EventKind::ToolCallEnd,
            AguiEvent::ToolCallResult { .. } => EventKind::ToolCallResult,
            AguiEvent::StateSnapshot { .. } => EventKind::StateSnapshot,
            AguiEvent::StateDelta { .. } => EventKind::StateDelta,
            AguiEvent::Raw { .. } => EventKind::Raw,
            AguiEvent::Custom { .. } => EventKind::Custom,
        }
    }

    /// Name of a `CUSTOM` event, `None` for every other kind.
    pub fn custom_name(&self) -> Option<&str> {
        match self {
            AguiEvent::Custom { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Serialize as a single `data:` record terminated by a blank line.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }

    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        AguiEvent::RunStarted {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            parent_run_id: None,
            input: None,
        }
    }

    pub fn run_finished(result: Option<Value>) -> Self {
        AguiEvent::RunFinished {
            thread_id: None,
            run_id: None,
            result,
        }
    }

    pub fn run_error(message: impl Into<String>, code: Option<String>) -> Self {
        AguiEvent::RunError {
            message: message.into(),
            code,
        }
    }

    pub fn text_message_start(message_id: impl Into<String>, role: MessageRole) -> Self {
        AguiEvent::TextMessageStart {
            message_id: message_id.into(),
            role,
        }
    }

    pub fn text_message_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        AguiEvent::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
        }
    }

    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        AguiEvent::TextMessageEnd {
            message_id: message_id.into(),
        }
    }

    pub fn tool_call_start(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        AguiEvent::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id,
        }
    }

    pub fn tool_call_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        AguiEvent::ToolCallArgs {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
        }
    }

    pub fn tool_call_end(tool_call_id: impl Into<String>) -> Self {
        AguiEvent::ToolCallEnd {
            tool_call_id: tool_call_id.into(),
        }
    }

    pub fn tool_call_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        AguiEvent::ToolCallResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            message_id: None,
            role: None,
        }
    }

    pub fn state_snapshot(snapshot: Value) -> Self {
        AguiEvent::StateSnapshot { snapshot }
    }

    pub fn state_delta(delta: Vec<PatchOperation>) -> Self {
        AguiEvent::StateDelta { delta }
    }

    pub fn custom(name: impl Into<String>, value: Value) -> Self {
        AguiEvent::Custom {
            name: name.into(),
            value,
        }
    }
}

/// Fieldless mirror of the [`AguiEvent`] discriminant.
///
/// Used as the key when subscribing to a single event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    RunStarted,
    RunFinished,
    RunError,
    StepStarted,
    StepFinished,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    ToolCallStart,
    ToolCallArgs,
    ToolCallEnd,
    ToolCallResult,
    StateSnapshot,
    StateDelta,
    Raw,
    Custom,
}

impl EventKind {
    /// Wire name of this kind, e.g. `TEXT_MESSAGE_CONTENT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "RUN_STARTED",
            EventKind::RunFinished => "RUN_FINISHED",
            EventKind::RunError => "RUN_ERROR",
            EventKind::StepStarted => "STEP_STARTED",
            EventKind::StepFinished => "STEP_FINISHED",
            EventKind::TextMessageStart => "TEXT_MESSAGE_START",
            EventKind::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventKind::TextMessageEnd => "TEXT_MESSAGE_END",
            EventKind::ToolCallStart => "TOOL_CALL_START",
            EventKind::ToolCallArgs => "TOOL_CALL_ARGS",
            EventKind::ToolCallEnd => "TOOL_CALL_END",
            EventKind::ToolCallResult => "TOOL_CALL_RESULT",
            EventKind::StateSnapshot => "STATE_SNAPSHOT",
            EventKind::StateDelta => "STATE_DELTA",
            EventKind::Raw => "RAW",
            EventKind::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[default]
    Assistant,
    System,
    Developer,
    /// Tool result message.
    Tool,
    /// Any role this client does not know.
    #[serde(other)]
    Other,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
