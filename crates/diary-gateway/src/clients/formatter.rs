//! LLM text-formatter adapter (Anthropic messages API).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::{malformed, transport};
use crate::domain::config::FormatterConfig;
use crate::domain::types::{bounds, FormattedDiary};
use crate::ports::{Formatter, UpstreamError, UpstreamResult};

const API_VERSION: &str = "2023-06-01";

/// Formatter backed by the Anthropic messages endpoint.
pub struct AnthropicFormatter {
    client: reqwest::Client,
    config: FormatterConfig,
}

impl AnthropicFormatter {
    pub fn new(client: reqwest::Client, config: FormatterConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Formatter for AnthropicFormatter {
    async fn format_diary(
        &self,
        raw_text: &str,
        date: &str,
        timeout: Duration,
    ) -> UpstreamResult<FormattedDiary> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{ "role": "user", "content": build_prompt(raw_text, date) }],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
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
        let text = value
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("no text block in formatter reply"))?;

        let json = extract_json_block(text)
            .ok_or_else(|| malformed("no JSON object in formatter reply"))?;
        serde_json::from_str(json).map_err(|e| malformed(format!("diary JSON: {e}")))
    }
}

/// Find the structured reply: a ```json fenced block if present, otherwise
/// the outermost braces.
fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(fence_start) = text.find("```json") {
        let rest = &text[fence_start + "```json".len()..];
        let fence_end = rest.find("```")?;
        return Some(rest[..fence_end].trim());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn build_prompt(raw_text: &str, date: &str) -> String {
    format!(
        "You are a diary-writing assistant. Rework the spoken-language \
         transcript below into a polished written diary entry.\n\
         \n\
         [Transcript]\n\
         {raw_text}\n\
         \n\
         [Output]\n\
         Reply with exactly one JSON object, no prose around it:\n\
         \n\
         ```json\n\
         {{\n\
           \"date\": \"{date}\",\n\
           \"title\": \"an engaging title for the day (max {title} chars)\",\n\
           \"summary\": \"three short lines separated by newlines (max {summary} chars)\",\n\
           \"body\": \"the full entry in written style, paragraphs allowed (max {body} chars)\",\n\
           \"tags\": [\"around five relevant hashtags, each max {tag} chars\"],\n\
           \"image_prompt\": \"an English prompt that would paint this day as one image (max {prompt} chars)\"\n\
         }}\n\
         ```\n\
         \n\
         Rules: keep the writer's voice, fix the spoken-language artifacts, \
         split the body into readable paragraphs, and make the image prompt \
         concrete and visual.",
        title = bounds::TITLE_MAX,
        summary = bounds::SUMMARY_MAX,
        body = bounds::BODY_MAX,
        tag = bounds::TAG_MAX,
        prompt = bounds::IMAGE_PROMPT_MAX,
    )
}
