//! AG-UI protocol vocabulary for cassette
//!
//! This crate holds the I/O-free pieces of the Agent-User Interaction
//! protocol: the event types, the `data:` line framing, and the patch engine
//! used for `STATE_DELTA`. The HTTP client lives in `cassette-client`.
//!
//! # Decoding a stream
//!
//! ```
//! use cassette_protocol::{AguiEvent, Frame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! let mut events = Vec::new();
//! for chunk in [&b": keep-alive\n\ndata: {\"type\":\"RUN_STA"[..], &b"RTED\",\"threadId\":\"t\",\"runId\":\"r\"}\n"[..]] {
//!     for frame in decoder.push(chunk) {
//!         if let Frame::Event(event) = frame {
//!             events.push(event);
//!         }
//!     }
//! }
//! assert_eq!(events, vec![AguiEvent::run_started("t", "r")]);
//! ```
//!
//! # Applying a delta
//!
//! ```
//! use cassette_protocol::{apply_patch, PatchOperation};
//! use serde_json::json;
//!
//! let state = json!({"phase": "starting"});
//! let outcome = apply_patch(&state, &[PatchOperation::replace("/phase", json!("done"))]).unwrap();
//! assert_eq!(outcome.document, json!({"phase": "done"}));
//! assert_eq!(state, json!({"phase": "starting"}));
//! ```

pub mod decoder;
mod error;
pub mod events;
pub mod patch;

pub use decoder::{decode_line, decode_stream, parse_line, Frame, FrameDecoder, DATA_PREFIX};
pub use error::{DecodeError, PatchError};
pub use events::{AguiEvent, EventKind, MessageRole};
pub use patch::{apply_patch, PatchOpKind, PatchOperation, PatchOutcome};
