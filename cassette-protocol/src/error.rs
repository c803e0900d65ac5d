//! Error types for the protocol layer

use thiserror::Error;

/// A transport line that looked like an event record but could not be decoded
#[derive(Debug, Error)]
#[error("Malformed event payload: {source} (data: {payload})")]
pub struct DecodeError {
    /// The payload after the `data:` prefix
    pub payload: String,
    #[source]
    pub source: serde_json::Error,
}

/// Failure while walking a patch path
///
/// These indicate a producer that patched a location it never created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// An intermediate object key does not exist
    #[error("Path not found: '{segment}' in {path}")]
    PathNotFound { path: String, segment: String },

    /// A segment tried to descend into a scalar
    #[error("Cannot descend into non-container at '{segment}' in {path}")]
    NotAContainer { path: String, segment: String },

    /// A non-numeric segment was used against an array
    #[error("Invalid array index '{segment}' in {path}")]
    InvalidIndex { path: String, segment: String },

    /// An array index past the end of the array
    #[error("Index {index} out of bounds (len {len}) in {path}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}
