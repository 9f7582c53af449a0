//! Error taxonomy for the relay's HTTP surface.
//!
//! Every failure class maps to one stable status code, and the client body
//! is always a generic `{"error": "..."}` string. Internal identifiers,
//! credentials, and upstream detail go to server-side logs only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Request-level failure, converted into the client-facing response.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input. The message is written for the
    /// client and carries no internals. Never logged as exceptional.
    #[error("{0}")]
    InvalidInput(String),

    /// Token missing, invalid, expired, or for the wrong subject.
    #[error("authentication failed")]
    Auth,

    /// An upstream platform refused our stored credential. Reported as an
    /// auth failure so the operator knows to refresh the token.
    #[error("upstream credential rejected")]
    UpstreamCredential,

    /// Request origin absent or not on the allow-list.
    #[error("origin not allowed")]
    OriginDenied,

    /// A referenced upstream resource does not exist. Client-safe message.
    #[error("{0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    /// The same action for the same resource is already in flight.
    #[error("action already in progress")]
    Conflict,

    /// Daily quota exhausted. Expected and reportable.
    #[error("daily limit {limit} reached")]
    QuotaExceeded { limit: i64 },

    /// Server-side configuration problem (missing secret or credentials).
    #[error("server configuration problem")]
    Config,

    /// The remote store or a collaborator was unreachable or answered with
    /// something unusable. Always fail-closed.
    #[error("upstream unavailable")]
    Upstream,

    /// The wall-clock budget ran out before the work completed.
    #[error("deadline exhausted")]
    DeadlineExceeded,

    /// Anything else. Detail lives in the logs.
    #[error("unexpected error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Auth | Self::UpstreamCredential => StatusCode::UNAUTHORIZED,
            Self::OriginDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Config | Self::Upstream | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// The string the client sees. Fixed per variant; never interpolates
    /// internal state beyond the already-client-safe 4xx messages.
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Auth => "Authentication failed. A valid token is required.".into(),
            Self::UpstreamCredential => {
                "The platform access token is invalid or expired. Refresh the token.".into()
            }
            Self::OriginDenied => "Access denied. Use the approved web app.".into(),
            Self::MethodNotAllowed => "Method not allowed.".into(),
            Self::Conflict => {
                "This action is already running for the requested date. Try again shortly.".into()
            }
            Self::QuotaExceeded { limit } => {
                format!("Daily limit ({limit}) reached. Try again tomorrow.")
            }
            Self::Config => {
                "The server is not configured correctly. Contact the administrator.".into()
            }
            Self::Upstream => "Temporary server error. Please try again later.".into(),
            Self::DeadlineExceeded => {
                "Not enough processing time remained. Try again shortly.".into()
            }
            Self::Internal => "An unexpected error occurred. Please try again later.".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.client_message() });
        (self.status(), Json(body)).into_response()
    }
}

/// Service-level failure (startup, bind, configuration).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
