use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Every failure in the relay is classified as either retryable (plausibly
/// transient, so the queue re-runs the task) or terminal (bad input or a
/// broken remote contract, so the task is logged and finished). The
/// `is_retryable` method is the single source of truth for that split.
#[derive(Debug, Clone)]
pub enum RelayError {
    /// Required configuration is missing or invalid.
    Config(String),
    /// Required subject data (NID, loan amount, ...) is missing or malformed.
    Validation(String),
    /// Login failed or the remote rejected our token.
    Auth(String),
    /// Network-level failure (DNS, timeout, connection, open circuit).
    Transport(String),
    /// Remote returned a non-2xx status we treat as transient.
    RemoteRejection {
        /// HTTP status code returned by the remote.
        status: u16,
        /// Response body, for the logs.
        body: String,
    },
    /// Remote returned 422: the payload failed server-side validation.
    RemoteValidation {
        /// Validation details returned by the remote.
        body: String,
    },
    /// Update target disappeared (404 on an update call).
    NotFound(String),
    /// Remote responded in an internally inconsistent way (e.g. "exists"
    /// without an id). Surfaced loudly, never retried.
    Integrity(String),
    /// Internal serialization/channel failure.
    Internal(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RelayError::Validation(msg) => write!(f, "Validation error: {}", msg),
            RelayError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            RelayError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RelayError::RemoteRejection { status, body } => {
                write!(f, "Remote API returned {}: {}", status, body)
            }
            RelayError::RemoteValidation { body } => {
                write!(f, "Remote API rejected payload (422): {}", body)
            }
            RelayError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RelayError::Integrity(msg) => write!(f, "Remote contract violation: {}", msg),
            RelayError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    /// True for failures the queue should retry with backoff.
    ///
    /// Auth failures retry because the next attempt re-authenticates from
    /// scratch; transport failures and generic remote rejections are assumed
    /// transient. Everything else will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::Auth(_) | RelayError::Transport(_) | RelayError::RemoteRejection { .. }
        )
    }
}

impl From<reqwest::Error> for RelayError {
    /// Converts a `reqwest::Error` into a `RelayError`.
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl IntoResponse for RelayError {
    /// Converts the error into an HTTP response for the intake surface.
    ///
    /// Maps each variant to an appropriate status code and JSON body, logging
    /// by severity. Task-side errors never reach this path; only the intake
    /// handler returns them to a caller.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            RelayError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service misconfigured".to_string(),
                )
            }
            RelayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RelayError::Auth(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            RelayError::Transport(msg) => {
                tracing::error!("Transport error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream unreachable".to_string())
            }
            RelayError::RemoteRejection { status, body } => {
                tracing::error!("Remote API error {}: {}", status, body);
                (StatusCode::BAD_GATEWAY, "Remote API error".to_string())
            }
            RelayError::RemoteValidation { body } => {
                tracing::error!("Remote validation failure: {}", body);
                (StatusCode::BAD_GATEWAY, "Remote API error".to_string())
            }
            RelayError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            RelayError::Integrity(msg) => {
                tracing::error!("Remote contract violation: {}", msg);
                (StatusCode::BAD_GATEWAY, "Remote API error".to_string())
            }
            RelayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
