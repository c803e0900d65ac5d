//! Local reconstruction of a remote run.
//!
//! [`RunState`] is the fold of every event received so far. Each event
//! touches at most one of the running flag, the shared state document, one
//! message, or one tool call. Step events only move the current step marker.
//! Raw and custom events and end markers leave the core view untouched.
//!
//! Messages and tool calls are kept in insertion order. A second start for an
//! id that already exists resets that entry where it stands.

use std::collections::HashMap;

use cassette_protocol::{apply_patch, AguiEvent, EventKind, MessageRole, PatchError};
use serde::Serialize;
use serde_json::Value;

use crate::diagnostic::Diagnostic;

/// A text message accumulated from start/content events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
}

/// A tool invocation accumulated from start/args/result events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Concatenated argument deltas. Usually JSON once the call has ended.
    pub args: String,
    pub parent_message_id: Option<String>,
    pub result: Option<String>,
}

impl ToolCall {
    /// Parse the accumulated arguments as JSON.
    ///
    /// Empty arguments parse as `null`.
    pub fn parsed_args(&self) -> Result<Value, serde_json::Error> {
        if self.args.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.args)
    }
}

/// Id-keyed storage that remembers insertion order.
#[derive(Debug, Clone)]
struct Arena<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Arena<T> {
    fn upsert(&mut self, id: &str, item: T) {
        match self.index.get(id) {
            Some(&slot) => self.items[slot] = item,
            None => {
                self.index.insert(id.to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.items[slot])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&slot) => self.items.get_mut(slot),
            None => None,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

/// Derived view of a single run.
#[derive(Debug, Clone)]
pub struct RunState {
    is_running: bool,
    state: Value,
    current_step: Option<String>,
    messages: Arena<TextMessage>,
    tool_calls: Arena<ToolCall>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            is_running: false,
            state: Value::Object(Default::default()),
            current_step: None,
            messages: Arena::default(),
            tool_calls: Arena::default(),
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything from the previous run.
    pub fn reset(&mut self) {
        self.is_running = false;
        self.state = Value::Object(Default::default());
        self.current_step = None;
        self.messages.clear();
        self.tool_calls.clear();
    }

    /// Reset and mark the run as in flight.
    pub fn begin(&mut self) {
        self.reset();
        self.is_running = true;
    }

    /// Mark the run as no longer in flight, keeping what was accumulated.
    pub fn stop(&mut self) {
        self.is_running = false;
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// The shared state document.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Name of the step most recently started and not yet finished.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    pub fn message(&self, id: &str) -> Option<&TextMessage> {
        self.messages.get(id)
    }

    /// Messages in the order they were started.
    pub fn messages(&self) -> impl Iterator<Item = &TextMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCall> {
        self.tool_calls.get(id)
    }

    /// Tool calls in the order they were started.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.iter()
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }

    /// Fold one event into the view.
    ///
    /// Only a `STATE_DELTA` that cannot be applied fails, and in that case
    /// the state document is left as it was. Everything else that cannot be
    /// applied (an unknown id, an unsupported patch op) is returned as a
    /// [`Diagnostic`].
    ///
    /// Each delta is applied to a full copy of the document, so the cost of
    /// a delta grows with the size of the state.
    pub fn apply(&mut self, event: &AguiEvent) -> Result<Vec<Diagnostic>, PatchError> {
        let mut diagnostics = Vec::new();

        match event {
            AguiEvent::RunStarted { .. } => self.is_running = true,
            AguiEvent::RunFinished { .. } | AguiEvent::RunError { .. } => {
                self.is_running = false
            }

            AguiEvent::StepStarted { step_name } => {
                self.current_step = Some(step_name.clone());
            }
            AguiEvent::StepFinished { step_name } => {
                if self.current_step.as_deref() == Some(step_name.as_str()) {
                    self.current_step = None;
                }
            }

            AguiEvent::TextMessageStart { message_id, role } => {
                self.messages.upsert(
                    message_id,
                    TextMessage {
                        id: message_id.clone(),
                        role: *role,
                        content: String::new(),
                    },
                );
            }
            AguiEvent::TextMessageContent { message_id, delta } => {
                match self.messages.get_mut(message_id) {
                    Some(message) => message.content.push_str(delta),
                    None => diagnostics.push(unknown_message(event.kind(), message_id)),
                }
            }
            AguiEvent::TextMessageEnd { message_id } => {
                if !self.messages.contains(message_id) {
                    diagnostics.push(unknown_message(event.kind(), message_id));
                }
            }

            AguiEvent::ToolCallStart {
                tool_call_id,
                tool_call_name,
                parent_message_id,
            } => {
                self.tool_calls.upsert(
                    tool_call_id,
                    ToolCall {
                        id: tool_call_id.clone(),
                        name: tool_call_name.clone(),
                        args: String::new(),
                        parent_message_id: parent_message_id.clone(),
                        result: None,
                    },
                );
            }
            AguiEvent::ToolCallArgs {
                tool_call_id,
                delta,
            } => match self.tool_calls.get_mut(tool_call_id) {
                Some(call) => call.args.push_str(delta),
                None => diagnostics.push(unknown_tool_call(event.kind(), tool_call_id)),
            },
            AguiEvent::ToolCallEnd { tool_call_id } => {
                if !self.tool_calls.contains(tool_call_id) {
                    diagnostics.push(unknown_tool_call(event.kind(), tool_call_id));
                }
            }
            AguiEvent::ToolCallResult {
                tool_call_id,
                content,
                ..
            } => match self.tool_calls.get_mut(tool_call_id) {
                Some(call) => call.result = Some(content.clone()),
                None => diagnostics.push(unknown_tool_call(event.kind(), tool_call_id)),
            },

            AguiEvent::StateSnapshot { snapshot } => self.state = snapshot.clone(),
            AguiEvent::StateDelta { delta } => {
                let outcome = apply_patch(&self.state, delta)?;
                self.state = outcome.document;
                diagnostics.extend(outcome.skipped.into_iter().map(|op| {
                    Diagnostic::UnsupportedPatchOp {
                        op: op.op,
                        path: op.path,
                    }
                }));
            }

            AguiEvent::Raw { .. } | AguiEvent::Custom { .. } => {}
        }

        Ok(diagnostics)
    }
}

fn unknown_message(kind: EventKind, message_id: &str) -> Diagnostic {
    log::debug!("Dropping {} for unknown message '{}'", kind, message_id);
    Diagnostic::UnknownMessage {
        kind,
        message_id: message_id.to_string(),
    }
}

fn unknown_tool_call(kind: EventKind, tool_call_id: &str) -> Diagnostic {
    log::debug!("Dropping {} for unknown tool call '{}'", kind, tool_call_id);
    Diagnostic::UnknownToolCall {
        kind,
        tool_call_id: tool_call_id.to_string(),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
