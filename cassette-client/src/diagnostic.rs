//! Non-fatal anomalies observed while folding a stream

use std::fmt;

use cassette_protocol::{EventKind, PatchOpKind};

/// Something the client dropped or skipped instead of failing the run
///
/// Diagnostics are delivered to handlers registered with
/// [`AguiClient::on_diagnostic`](crate::AguiClient::on_diagnostic). They
/// never change run state.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Text content or end for a message id that was never started
    UnknownMessage { kind: EventKind, message_id: String },

    /// Args, end or result for a tool call id that was never started
    UnknownToolCall { kind: EventKind, tool_call_id: String },

    /// A patch operation outside add/replace/remove
    UnsupportedPatchOp { op: PatchOpKind, path: String },

    /// A `data:` line whose payload was not a valid event
    MalformedFrame { payload: String, error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownMessage { kind, message_id } => {
                write!(f, "{} for unknown message '{}'", kind, message_id)
            }
            Diagnostic::UnknownToolCall { kind, tool_call_id } => {
                write!(f, "{} for unknown tool call '{}'", kind, tool_call_id)
            }
            Diagnostic::UnsupportedPatchOp { op, path } => {
                write!(f, "skipped unsupported patch op '{}' at {}", op.as_str(), path)
            }
            Diagnostic::MalformedFrame { payload, error } => {
                write!(f, "malformed frame ({}): {}", error, payload)
            }
        }
    }
}
