//! Webhook receiver errors and their HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors produced by the webhook receiver, both while serving deliveries
/// and while managing the server lifecycle.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No push token registered for the task id in the URL.
    #[error("unknown task id")]
    UnknownTask,

    /// Missing or mismatched bearer token.
    #[error("invalid bearer token")]
    InvalidToken,

    /// The delivery body exceeds the configured cap.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The body is not a valid task update event.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Applying the update failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),

    /// `start` was called while the server is already running, or a
    /// setting was changed that requires a stopped server.
    #[error("webhook server is already running")]
    AlreadyRunning,

    #[error("failed to bind webhook listener: {0}")]
    Bind(#[from] std::io::Error),
}

impl WebhookError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::UnknownTask => StatusCode::NOT_FOUND,
            WebhookError::InvalidToken => StatusCode::UNAUTHORIZED,
            WebhookError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_)
            | WebhookError::AlreadyRunning
            | WebhookError::Bind(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Convenience type alias for Results with WebhookError.
pub type WebhookResult<T> = std::result::Result<T, WebhookError>;
