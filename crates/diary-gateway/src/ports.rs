//! Outbound ports: the external collaborators the handlers orchestrate.
//!
//! Each collaborator is a trait so handlers are testable without the
//! network; production adapters live in [`crate::clients`]. Calls made
//! inside a deadline-budgeted section take an explicit timeout computed by
//! the caller from the remaining budget.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::types::FormattedDiary;

/// Failure of one collaborator call.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The collaborator rejected our stored credential; the operator must
    /// refresh it. Surfaced distinctly so handlers can answer 401.
    #[error("credential rejected by upstream")]
    CredentialRejected,

    /// Non-success HTTP status.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// The request never completed.
    #[error("upstream transport failure: {0}")]
    Transport(String),

    /// 2xx with an unusable body.
    #[error("upstream response was malformed: {0}")]
    Malformed(String),
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// LLM text formatter: free text in, structured diary out. The returned
/// value is untrusted until `FormattedDiary::validate` passes.
#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format_diary(
        &self,
        raw_text: &str,
        date: &str,
        timeout: Duration,
    ) -> UpstreamResult<FormattedDiary>;
}

/// A stored file plus the version tag needed to update it without a blind
/// overwrite.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub content: String,
    pub version: String,
}

/// Content store: get/put files by path with optimistic concurrency.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a text document. `Ok(None)` when the path does not exist.
    async fn get_document(
        &self,
        path: &str,
        timeout: Duration,
    ) -> UpstreamResult<Option<StoredDocument>>;

    /// Version tag only, for binary files whose content is not needed.
    async fn get_version(&self, path: &str, timeout: Duration) -> UpstreamResult<Option<String>>;

    /// Create or update a text document. `previous_version` must be
    /// supplied when updating.
    async fn put_document(
        &self,
        path: &str,
        content: &str,
        previous_version: Option<&str>,
        message: &str,
        timeout: Duration,
    ) -> UpstreamResult<()>;

    /// Create or update a binary file; `content_b64` is already encoded.
    async fn put_binary(
        &self,
        path: &str,
        content_b64: &str,
        previous_version: Option<&str>,
        message: &str,
        timeout: Duration,
    ) -> UpstreamResult<()>;

    /// Whether the published (raw) form of `path` exists.
    async fn raw_exists(&self, path: &str, timeout: Duration) -> UpstreamResult<bool>;

    /// Fetch the published bytes of `path`. `Ok(None)` when absent.
    async fn fetch_raw(&self, path: &str, timeout: Duration) -> UpstreamResult<Option<Bytes>>;

    /// Publicly reachable URL for the raw form of `path`.
    fn raw_url(&self, path: &str) -> String;
}

/// Image generator: prompt in, base64-encoded PNG out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, timeout: Duration) -> UpstreamResult<String>;
}

/// Readiness of a pending media container.
///
/// `Published` is deliberately its own terminal state: a container observed
/// already-published mid-poll skips the publish call, and is never folded
/// into the idempotency-replay path, so ledger-write failures stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Published,
    Failed,
    Expired,
}

/// Container-pattern posting platform: create a pending post, poll it to
/// readiness, then publish.
#[async_trait]
pub trait ContainerPublisher: Send + Sync {
    async fn create_container(
        &self,
        image_url: &str,
        text: &str,
        timeout: Duration,
    ) -> UpstreamResult<String>;

    async fn container_status(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> UpstreamResult<ContainerStatus>;

    async fn publish(&self, container_id: &str, timeout: Duration) -> UpstreamResult<String>;
}

/// Authenticated session with the collapsed create-and-publish platform.
#[derive(Debug, Clone)]
pub struct BlueskySession {
    pub access_jwt: String,
    pub did: String,
}

/// The collapsed-variant platform: authenticate, upload the image blob,
/// create the post record in one call. No polling.
#[async_trait]
pub trait BlueskyApi: Send + Sync {
    async fn create_session(&self, timeout: Duration) -> UpstreamResult<BlueskySession>;

    async fn upload_blob(
        &self,
        session: &BlueskySession,
        bytes: Bytes,
        timeout: Duration,
    ) -> UpstreamResult<serde_json::Value>;

    async fn create_post(
        &self,
        session: &BlueskySession,
        text: &str,
        image_alt: &str,
        blob: serde_json::Value,
        timeout: Duration,
    ) -> UpstreamResult<String>;
}
