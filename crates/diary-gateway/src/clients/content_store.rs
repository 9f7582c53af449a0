//! Content-store adapter (GitHub contents API).
//!
//! Documents live in a repository; the `sha` returned on reads is the
//! version tag that must accompany updates so a concurrent writer is
//! detected instead of silently overwritten. Published files are read back
//! over the raw host.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;

use crate::clients::{malformed, transport};
use crate::domain::config::ContentConfig;
use crate::ports::{ContentStore, StoredDocument, UpstreamError, UpstreamResult};

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Content store backed by a GitHub repository.
pub struct GithubContentStore {
    client: reqwest::Client,
    config: ContentConfig,
}

impl GithubContentStore {
    pub fn new(client: reqwest::Client, config: ContentConfig) -> Self {
        Self { client, config }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_base, self.config.owner, self.config.repo, path
        )
    }

    /// GET a contents entry; `Ok(None)` on 404.
    async fn fetch_entry(&self, path: &str, timeout: Duration) -> UpstreamResult<Option<Value>> {
        let response = self
            .client
            .get(self.contents_url(path))
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::CredentialRejected);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        let value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        Ok(Some(value))
    }

    async fn put_entry(
        &self,
        path: &str,
        content_b64: &str,
        previous_version: Option<&str>,
        message: &str,
        timeout: Duration,
    ) -> UpstreamResult<()> {
        let mut body = serde_json::json!({
            "message": message,
            "content": content_b64,
            "branch": self.config.branch,
        });
        if let Some(sha) = previous_version {
            body["sha"] = Value::String(sha.to_string());
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", ACCEPT)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::CredentialRejected);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for GithubContentStore {
    async fn get_document(
        &self,
        path: &str,
        timeout: Duration,
    ) -> UpstreamResult<Option<StoredDocument>> {
        let Some(entry) = self.fetch_entry(path, timeout).await? else {
            return Ok(None);
        };
        let encoded = entry
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("contents entry without content"))?;
        let version = entry
            .get("sha")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("contents entry without sha"))?
            .to_string();

        // The API wraps base64 at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| malformed(format!("content base64: {e}")))?;
        let content =
            String::from_utf8(bytes).map_err(|_| malformed("document is not UTF-8"))?;
        Ok(Some(StoredDocument { content, version }))
    }

    async fn get_version(&self, path: &str, timeout: Duration) -> UpstreamResult<Option<String>> {
        let Some(entry) = self.fetch_entry(path, timeout).await? else {
            return Ok(None);
        };
        entry
            .get("sha")
            .and_then(Value::as_str)
            .map(|sha| Some(sha.to_string()))
            .ok_or_else(|| malformed("contents entry without sha"))
    }

    async fn put_document(
        &self,
        path: &str,
        content: &str,
        previous_version: Option<&str>,
        message: &str,
        timeout: Duration,
    ) -> UpstreamResult<()> {
        let encoded = STANDARD.encode(content.as_bytes());
        self.put_entry(path, &encoded, previous_version, message, timeout)
            .await
    }

    async fn put_binary(
        &self,
        path: &str,
        content_b64: &str,
        previous_version: Option<&str>,
        message: &str,
        timeout: Duration,
    ) -> UpstreamResult<()> {
        self.put_entry(path, content_b64, previous_version, message, timeout)
            .await
    }

    async fn raw_exists(&self, path: &str, timeout: Duration) -> UpstreamResult<bool> {
        let response = self
            .client
            .head(self.raw_url(path))
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;
        Ok(response.status().is_success())
    }

    async fn fetch_raw(&self, path: &str, timeout: Duration) -> UpstreamResult<Option<Bytes>> {
        let response = self
            .client
            .get(self.raw_url(path))
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(Some(bytes))
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_base, self.config.owner, self.config.repo, self.config.branch, path
        )
    }
}
