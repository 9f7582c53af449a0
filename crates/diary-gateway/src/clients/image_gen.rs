//! Image-generator adapter (OpenAI images API).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::{malformed, transport};
use crate::domain::config::ImageConfig;
use crate::ports::{ImageGenerator, UpstreamError, UpstreamResult};

/// Generator backed by the images endpoint, returning base64 PNG data.
pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    config: ImageConfig,
}

impl OpenAiImageGenerator {
    pub fn new(client: reqwest::Client, config: ImageConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str, timeout: Duration) -> UpstreamResult<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "n": 1,
            "size": self.config.size,
            "response_format": "b64_json",
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
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

        let value: Value = response.json().await.map_err(|e| malformed(e.to_string()))?;
        value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|first| first.get("b64_json"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed("no b64_json in image reply"))
    }
}
