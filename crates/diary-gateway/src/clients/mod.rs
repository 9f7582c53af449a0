//! Production adapters for the outbound ports in [`crate::ports`].
//!
//! All adapters share one `reqwest::Client` and apply per-request timeouts
//! supplied by the caller (derived from the deadline budget inside
//! protected sections).

pub mod bluesky;
pub mod content_store;
pub mod formatter;
pub mod image_gen;
pub mod instagram;
pub mod poll;
pub mod threads;

pub use bluesky::BlueskyClient;
pub use content_store::GithubContentStore;
pub use formatter::AnthropicFormatter;
pub use image_gen::OpenAiImageGenerator;
pub use instagram::InstagramClient;
pub use poll::{await_container_ready, PollOutcome};
pub use threads::ThreadsClient;

use crate::ports::UpstreamError;

/// Graph-API platform error codes meaning "your access token is bad".
const CREDENTIAL_ERROR_CODES: [i64; 2] = [190, 102];

/// Map a non-success Graph-API response to an upstream error, detecting
/// the invalid/expired-token codes so handlers can answer 401.
pub(crate) async fn graph_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let code = body
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(serde_json::Value::as_i64);
    match code {
        Some(code) if CREDENTIAL_ERROR_CODES.contains(&code) => UpstreamError::CredentialRejected,
        _ => UpstreamError::Status(status),
    }
}

pub(crate) fn transport(error: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(error.to_string())
}

pub(crate) fn malformed(detail: impl Into<String>) -> UpstreamError {
    UpstreamError::Malformed(detail.into())
}
