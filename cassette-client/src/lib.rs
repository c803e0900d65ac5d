//! Streaming client for the AG-UI (Agent-User Interaction) protocol
//!
//! A run is started with a single HTTP POST. The backend answers with a
//! stream of `data:` lines, each holding one AG-UI event. [`AguiClient`]
//! decodes that stream, folds every event into a local [`RunState`]
//! (messages, tool calls, shared state), and hands each event to the
//! registered handlers before it reads the next one.
//!
//! ```no_run
//! use cassette_client::{AguiClient, AguiEvent, EventKind};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), cassette_client::ClientError> {
//! let client = AguiClient::builder()
//!     .endpoint("http://localhost:8000/api/agui/generate")
//!     .bearer_auth("token")
//!     .build()?;
//!
//! client.subscribe_custom("agent_activity", |event: &AguiEvent| {
//!     println!("activity: {:?}", event);
//! });
//! client.subscribe(EventKind::RunFinished, |_: &AguiEvent| println!("done"));
//!
//! let state = client.run(&json!({"prompt": "x"})).await?;
//! for message in client.messages() {
//!     println!("{:?}: {}", message.role, message.content);
//! }
//! println!("{}", state);
//! # Ok(())
//! # }
//! ```

pub mod activity;
mod bus;
mod client;
mod diagnostic;
mod error;
mod state;

pub use bus::{DiagnosticHandler, EventBus, EventHandler, SubscriptionId, Topic};
pub use client::{
    AguiClient, AguiClientBuilder, RunStatus, AUTH_TOKEN_ENV, CLIENT_ERROR_CODE, ENDPOINT_ENV,
};
pub use diagnostic::Diagnostic;
pub use error::ClientError;
pub use state::{RunState, TextMessage, ToolCall};

// Protocol types used throughout the public API
pub use cassette_protocol::{
    AguiEvent, EventKind, MessageRole, PatchError, PatchOpKind, PatchOperation,
};
