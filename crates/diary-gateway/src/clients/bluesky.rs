//! Bluesky posting adapter (AT protocol).
//!
//! The collapsed variant: authenticate with an app password, upload the
//! image blob, create the post record. Publishing is implicit in record
//! creation, so there is no container to poll.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;

use crate::clients::{malformed, transport};
use crate::domain::config::BlueskyConfig;
use crate::ports::{BlueskyApi, BlueskySession, UpstreamError, UpstreamResult};

const POST_COLLECTION: &str = "app.bsky.feed.post";

pub struct BlueskyClient {
    client: reqwest::Client,
    config: BlueskyConfig,
}

impl BlueskyClient {
    pub fn new(client: reqwest::Client, config: BlueskyConfig) -> Self {
        Self { client, config }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.config.service)
    }
}

#[async_trait]
impl BlueskyApi for BlueskyClient {
    async fn create_session(&self, timeout: Duration) -> UpstreamResult<BlueskySession> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&serde_json::json!({
                "identifier": self.config.identifier,
                "password": self.config.app_password,
            }))
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

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        let access_jwt = value
            .get("accessJwt")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("session reply without accessJwt"))?
            .to_string();
        let did = value
            .get("did")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("session reply without did"))?
            .to_string();
        Ok(BlueskySession { access_jwt, did })
    }

    async fn upload_blob(
        &self,
        session: &BlueskySession,
        bytes: Bytes,
        timeout: Duration,
    ) -> UpstreamResult<Value> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header("Content-Type", "image/png")
            .body(bytes)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        value
            .get("blob")
            .cloned()
            .ok_or_else(|| malformed("upload reply without blob"))
    }

    async fn create_post(
        &self,
        session: &BlueskySession,
        text: &str,
        image_alt: &str,
        blob: Value,
        timeout: Duration,
    ) -> UpstreamResult<String> {
        let record = serde_json::json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": Utc::now().to_rfc3339(),
            "embed": {
                "$type": "app.bsky.embed.images",
                "images": [{ "alt": image_alt, "image": blob }],
            },
        });

        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&serde_json::json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        value
            .get("uri")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed("record reply without uri"))
    }
}
