//! Error types for the AG-UI client

use cassette_protocol::PatchError;
use thiserror::Error;

/// Errors returned from [`AguiClient::run`](crate::AguiClient::run)
///
/// Cancellation is not an error: a cancelled run resolves `Ok` with the
/// state accumulated so far.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect failure, timeout)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The response body failed while being read
    #[error("Stream error: {0}")]
    Stream(String),

    /// A state delta referenced a location that does not exist
    #[error("State patch failed: {0}")]
    Patch(#[from] PatchError),

    /// Client misconfiguration (bad endpoint, header, missing variable)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true if repeating the same request may succeed
    ///
    /// Connection and stream failures, 408, 409, 429 and 5xx are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http { status, .. } => Self::is_retryable_status(*status),
            ClientError::Connection(_) | ClientError::Stream(_) => true,
            _ => false,
        }
    }

    /// Returns true if this HTTP status code is worth retrying
    pub fn is_retryable_status(status_code: u16) -> bool {
        matches!(status_code, 408 | 409 | 429 | 500..=599)
    }

    /// Classify a reqwest error raised before a response was available
    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Connection(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ClientError::Connection(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            ClientError::Configuration(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ClientError::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 409, 429, 500, 502, 503, 529] {
            assert!(ClientError::is_retryable_status(status), "{}", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!ClientError::is_retryable_status(status), "{}", status);
        }
    }

    #[test]
    fn test_is_retryable_by_variant() {
        assert!(ClientError::Connection("refused".into()).is_retryable());
        assert!(ClientError::Stream("reset".into()).is_retryable());
        assert!(ClientError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ClientError::Http {
            status: 404,
            body: String::new()
        }
        .is_retryable());
        assert!(!ClientError::Configuration("x".into()).is_retryable());
    }

    #[test]
    fn test_patch_error_converts() {
        let err: ClientError = PatchError::PathNotFound {
            path: "/a/b".into(),
            segment: "a".into(),
        }
        .into();
        assert!(matches!(err, ClientError::Patch(_)));
        assert!(err.to_string().contains("/a/b"));
    }
}
