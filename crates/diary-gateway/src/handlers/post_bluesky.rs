//! Bluesky posting: the collapsed variant. Same coordination pipeline as
//! the container platforms, but the protected section is session → blob
//! upload → record creation with no polling.

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::NaiveDate;
use tracing::error;

use diary_coord::Deadline;

use crate::domain::document;
use crate::domain::error::ApiError;
use crate::domain::types::{bounds, BlueskyPostRequest, BlueskyPostResponse};
use crate::handlers::{
    authenticate_jwt, begin_publish, parse_body, parse_diary_date, require_json_content,
    truncate_chars, upstream_failed, Coordination,
};
use crate::ports::BlueskyApi;
use crate::service::AppState;

const ACTION: &str = "bluesky";
const SCOPE: &str = "bluesky";

const DOCUMENT_CEILING: Duration = Duration::from_secs(5);
const SESSION_CEILING: Duration = Duration::from_secs(5);
const PLATFORM_CEILING: Duration = Duration::from_secs(8);

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match run(&state, &headers, &body).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<BlueskyPostResponse, ApiError> {
    require_json_content(headers)?;
    let subject = authenticate_jwt(headers, &state.config.auth)?;

    let request: BlueskyPostRequest = parse_body(body)?;
    let date = parse_diary_date(request.date.as_deref())?;
    let date_str = date.format("%Y-%m-%d").to_string();
    if let Some(text) = &request.text {
        if text.chars().count() > bounds::BLUESKY_TEXT_MAX {
            return Err(ApiError::InvalidInput(format!(
                "Text is too long (max {} characters).",
                bounds::BLUESKY_TEXT_MAX
            )));
        }
    }

    let Some(platform) = state.bluesky.as_ref() else {
        error!("bluesky credentials are not configured");
        return Err(ApiError::Config);
    };

    match begin_publish(
        state,
        ACTION,
        SCOPE,
        state.config.quotas.bluesky_daily,
        &subject,
        &date_str,
    )
    .await?
    {
        Coordination::Replay(post_uri) => return Ok(BlueskyPostResponse::replayed(post_uri)),
        Coordination::Proceed => {}
    }

    let deadline = Deadline::new(state.config.budget.deadline);
    let outcome = protected(state, platform.as_ref(), date, &date_str, &request, &deadline).await;
    state.idempotency.release_lock(ACTION, &date_str).await;
    outcome
}

async fn protected(
    state: &AppState,
    platform: &dyn BlueskyApi,
    date: NaiveDate,
    date_str: &str,
    request: &BlueskyPostRequest,
    deadline: &Deadline,
) -> Result<BlueskyPostResponse, ApiError> {
    let margin = state.config.budget.margin;
    let clamp = |ceiling| deadline.clamp(ceiling, margin).ok_or(ApiError::DeadlineExceeded);

    let diary_path = document::diary_path(date);
    let stored = state
        .content
        .get_document(&diary_path, clamp(DOCUMENT_CEILING)?)
        .await
        .map_err(|e| upstream_failed("content-store", e))?
        .ok_or_else(|| ApiError::NotFound("No diary found for this date.".into()))?;
    let parsed = document::parse(&stored.content)
        .ok_or_else(|| ApiError::InvalidInput("The diary document is malformed.".into()))?;

    // The image bytes are re-uploaded to the platform rather than linked.
    let image_path = document::image_path(date);
    let image = state
        .content
        .fetch_raw(&image_path, clamp(DOCUMENT_CEILING)?)
        .await
        .map_err(|e| upstream_failed("content-store", e))?
        .ok_or_else(|| {
            ApiError::NotFound("No image found for this date. Generate the image first.".into())
        })?;

    let text = match &request.text {
        Some(text) => text.clone(),
        None => build_text(&parsed),
    };
    let text = truncate_chars(&text, bounds::BLUESKY_TEXT_MAX);

    let session = platform
        .create_session(clamp(SESSION_CEILING)?)
        .await
        .map_err(|e| upstream_failed(ACTION, e))?;

    let blob = platform
        .upload_blob(&session, image, clamp(PLATFORM_CEILING)?)
        .await
        .map_err(|e| upstream_failed(ACTION, e))?;

    let alt = if parsed.title.is_empty() {
        format!("Diary illustration for {date_str}")
    } else {
        parsed.title.clone()
    };
    let post_uri = platform
        .create_post(&session, &text, &alt, blob, clamp(PLATFORM_CEILING)?)
        .await
        .map_err(|e| upstream_failed(ACTION, e))?;

    state
        .idempotency
        .record_completed(ACTION, date_str, &post_uri)
        .await;

    Ok(BlueskyPostResponse::posted(post_uri))
}

/// Text when the client supplies none: title, summary, hashtags.
fn build_text(parsed: &document::ParsedDiary) -> String {
    let mut parts = Vec::new();
    if !parsed.title.is_empty() {
        parts.push(parsed.title.clone());
    }
    if !parsed.summary.is_empty() {
        parts.push(parsed.summary.clone());
    }
    if !parsed.tags.is_empty() {
        parts.push(document::hashtags(&parsed.tags).join(" "));
    }
    parts.join("\n\n")
}
