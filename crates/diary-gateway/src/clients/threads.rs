//! Threads posting adapter (Graph API container pattern).
//!
//! Same container shape as Instagram with two extra terminal statuses:
//! `PUBLISHED` (already live, skip the publish round-trip) and `EXPIRED`
//! (the pending container aged out).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::{graph_error, malformed, transport};
use crate::domain::config::ThreadsConfig;
use crate::ports::{ContainerPublisher, ContainerStatus, UpstreamResult};

pub struct ThreadsClient {
    client: reqwest::Client,
    config: ThreadsConfig,
}

impl ThreadsClient {
    pub fn new(client: reqwest::Client, config: ThreadsConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ContainerPublisher for ThreadsClient {
    async fn create_container(
        &self,
        image_url: &str,
        text: &str,
        timeout: Duration,
    ) -> UpstreamResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/{}/threads",
                self.config.api_base, self.config.user_id
            ))
            .bearer_auth(&self.config.access_token)
            .form(&[
                ("media_type", "IMAGE"),
                ("image_url", image_url),
                ("text", text),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_error(response).await);
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed("container reply without id"))
    }

    async fn container_status(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> UpstreamResult<ContainerStatus> {
        let response = self
            .client
            .get(format!("{}/{container_id}", self.config.api_base))
            .query(&[("fields", "id,status,error_message")])
            .bearer_auth(&self.config.access_token)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_error(response).await);
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
        Ok(match status {
            "FINISHED" => ContainerStatus::Finished,
            "PUBLISHED" => ContainerStatus::Published,
            "ERROR" => ContainerStatus::Failed,
            "EXPIRED" => ContainerStatus::Expired,
            // IN_PROGRESS and anything unrecognized: keep polling.
            _ => ContainerStatus::InProgress,
        })
    }

    async fn publish(&self, container_id: &str, timeout: Duration) -> UpstreamResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/{}/threads_publish",
                self.config.api_base, self.config.user_id
            ))
            .bearer_auth(&self.config.access_token)
            .form(&[("creation_id", container_id)])
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_error(response).await);
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed("publish reply without id"))
    }
}
