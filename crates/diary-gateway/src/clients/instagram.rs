//! Instagram posting adapter (Graph API container pattern).
//!
//! Three round-trips: create a media container referencing the image URL
//! and caption, poll `status_code` until `FINISHED`, then publish.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::{graph_error, malformed, transport};
use crate::domain::config::InstagramConfig;
use crate::ports::{ContainerPublisher, ContainerStatus, UpstreamResult};

pub struct InstagramClient {
    client: reqwest::Client,
    config: InstagramConfig,
}

impl InstagramClient {
    pub fn new(client: reqwest::Client, config: InstagramConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ContainerPublisher for InstagramClient {
    async fn create_container(
        &self,
        image_url: &str,
        text: &str,
        timeout: Duration,
    ) -> UpstreamResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/{}/media",
                self.config.api_base, self.config.account_id
            ))
            .bearer_auth(&self.config.access_token)
            .form(&[("image_url", image_url), ("caption", text)])
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
            .query(&[("fields", "status_code")])
            .bearer_auth(&self.config.access_token)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(graph_error(response).await);
        }

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        let status = value
            .get("status_code")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(match status {
            "FINISHED" => ContainerStatus::Finished,
            "ERROR" => ContainerStatus::Failed,
            // IN_PROGRESS and anything unrecognized: keep polling.
            _ => ContainerStatus::InProgress,
        })
    }

    async fn publish(&self, container_id: &str, timeout: Duration) -> UpstreamResult<String> {
        let response = self
            .client
            .post(format!(
                "{}/{}/media_publish",
                self.config.api_base, self.config.account_id
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
