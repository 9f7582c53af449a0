//! Wire DTOs for the relay endpoints and the validated formatter output.
//!
//! Request fields are all optional at the serde layer so missing and
//! mistyped fields produce our own 400 messages instead of extractor
//! rejections; handlers validate explicitly.

use serde::{Deserialize, Serialize};

/// Bounds enforced on formatter output before it is trusted.
pub mod bounds {
    pub const TITLE_MAX: usize = 50;
    pub const SUMMARY_MAX: usize = 500;
    pub const BODY_MAX: usize = 10_000;
    pub const TAGS_MAX: usize = 10;
    pub const TAG_MAX: usize = 30;
    pub const IMAGE_PROMPT_MAX: usize = 500;
    /// Maximum accepted length of the raw voice transcript.
    pub const RAW_TEXT_MAX: usize = 10_000;
    /// Platform caption/text ceilings.
    pub const INSTAGRAM_CAPTION_MAX: usize = 2_200;
    pub const THREADS_TEXT_MAX: usize = 500;
    pub const BLUESKY_TEXT_MAX: usize = 300;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDiaryRequest {
    pub raw_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateImageRequest {
    pub date: Option<String>,
    pub image_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstagramPostRequest {
    pub date: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadsPostRequest {
    pub date: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueskyPostRequest {
    pub date: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiaryResponse {
    pub success: bool,
    pub title: String,
    pub tags: Vec<String>,
    pub file_path: String,
    pub content_url: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub success: bool,
    pub image_path: String,
    pub image_url: String,
}

/// Response for the container-pattern platforms (Instagram, Threads).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub success: bool,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_posted: Option<bool>,
    pub message: String,
}

impl PublishResponse {
    pub fn posted(post_id: String, platform: &str) -> Self {
        Self {
            success: true,
            post_id,
            already_posted: None,
            message: format!("Posted to {platform}."),
        }
    }

    pub fn replayed(post_id: String, platform: &str) -> Self {
        Self {
            success: true,
            post_id,
            already_posted: Some(true),
            message: format!("This date's diary was already posted to {platform}."),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueskyPostResponse {
    pub success: bool,
    pub post_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_posted: Option<bool>,
    pub message: String,
}

impl BlueskyPostResponse {
    pub fn posted(post_uri: String) -> Self {
        Self {
            success: true,
            post_uri,
            already_posted: None,
            message: "Posted to Bluesky.".into(),
        }
    }

    pub fn replayed(post_uri: String) -> Self {
        Self {
            success: true,
            post_uri,
            already_posted: Some(true),
            message: "This date's diary was already posted to Bluesky.".into(),
        }
    }
}

/// Structured diary produced by the text formatter. Untrusted until
/// [`validate`](Self::validate) passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedDiary {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub tags: Vec<String>,
    pub image_prompt: String,
}

impl FormattedDiary {
    /// Check presence and length bounds on every field. Returns the full
    /// list of violations so logs show everything wrong at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        check_text(&mut issues, "title", &self.title, bounds::TITLE_MAX);
        check_text(&mut issues, "summary", &self.summary, bounds::SUMMARY_MAX);
        check_text(&mut issues, "body", &self.body, bounds::BODY_MAX);
        check_text(
            &mut issues,
            "image_prompt",
            &self.image_prompt,
            bounds::IMAGE_PROMPT_MAX,
        );

        if self.tags.len() > bounds::TAGS_MAX {
            issues.push(format!(
                "tags has {} entries (max {})",
                self.tags.len(),
                bounds::TAGS_MAX
            ));
        }
        for tag in &self.tags {
            if tag.is_empty() || tag.chars().count() > bounds::TAG_MAX {
                issues.push(format!("tag {tag:?} is empty or over {} chars", bounds::TAG_MAX));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_text(issues: &mut Vec<String>, field: &str, value: &str, max: usize) {
    if value.is_empty() {
        issues.push(format!("{field} is missing or empty"));
    } else if value.chars().count() > max {
        issues.push(format!("{field} is over {max} chars"));
    }
}
