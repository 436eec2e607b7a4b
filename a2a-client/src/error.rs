//! Error types for A2A client operations

use thiserror::Error;

/// Main error type for A2A client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failure or an HTTP status >= 400.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// Overall or idle timeout exceeded, or the call was canceled.
    #[error("timed out or aborted: {message}")]
    Timeout { message: String },

    /// The remote agent answered with a JSON-RPC error object.
    #[error("remote agent error {code}: {message}")]
    Protocol {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Malformed payload: agent card, RPC result or stream event.
    #[error("validation error: {message}")]
    Validation { message: String },
}

impl ClientError {
    pub fn timeout(message: impl Into<String>) -> Self {
        ClientError::Timeout {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>, status: Option<u16>) -> Self {
        ClientError::Transport {
            message: message.into(),
            status,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation {
            message: message.into(),
        }
    }

    /// Timeouts and transport failures are generally safe to retry;
    /// protocol and validation errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Timeout { .. }
        )
    }
}

/// Convenience type alias for Results with ClientError.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout {
                message: error.to_string(),
            }
        } else {
            ClientError::Transport {
                message: error.to_string(),
                status: error.status().map(|s| s.as_u16()),
            }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Validation {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ClientError::timeout("idle timeout").is_retryable());
        assert!(ClientError::transport("connection refused", None).is_retryable());
        assert!(!ClientError::validation("bad card").is_retryable());
        assert!(!ClientError::Protocol {
            code: -32601,
            message: "method not found".into(),
            data: None,
        }
        .is_retryable());
    }
}
