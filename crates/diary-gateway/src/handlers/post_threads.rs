//! Threads posting: container pipeline with a backoff poll schedule and
//! the already-published terminal state.

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::NaiveDate;
use tracing::{error, info};

use diary_coord::Deadline;

use crate::clients::{await_container_ready, PollOutcome};
use crate::domain::document;
use crate::domain::error::ApiError;
use crate::domain::types::{bounds, PublishResponse, ThreadsPostRequest};
use crate::handlers::{
    authenticate_jwt, begin_publish, parse_body, parse_diary_date, require_json_content,
    truncate_chars, upstream_failed, Coordination,
};
use crate::ports::ContainerPublisher;
use crate::service::AppState;

const ACTION: &str = "threads";
const SCOPE: &str = "threads";
const PLATFORM: &str = "Threads";

/// Backoff schedule: two short waits, then longer ones.
const POLL_INTERVALS: [Duration; 5] = [
    Duration::from_secs(3),
    Duration::from_secs(3),
    Duration::from_secs(5),
    Duration::from_secs(5),
    Duration::from_secs(5),
];

/// Budget that must remain before committing to a sleep: the wait itself
/// plus the status call after it.
const PRE_SLEEP_MARGIN: Duration = Duration::from_secs(5);

const DOCUMENT_CEILING: Duration = Duration::from_secs(5);
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
) -> Result<PublishResponse, ApiError> {
    require_json_content(headers)?;
    let subject = authenticate_jwt(headers, &state.config.auth)?;

    let request: ThreadsPostRequest = parse_body(body)?;
    let date = parse_diary_date(request.date.as_deref())?;
    let date_str = date.format("%Y-%m-%d").to_string();
    if let Some(text) = &request.text {
        if text.chars().count() > bounds::THREADS_TEXT_MAX {
            return Err(ApiError::InvalidInput(format!(
                "Text is too long (max {} characters).",
                bounds::THREADS_TEXT_MAX
            )));
        }
    }

    let Some(platform) = state.threads.as_ref() else {
        error!("threads credentials are not configured");
        return Err(ApiError::Config);
    };

    match begin_publish(
        state,
        ACTION,
        SCOPE,
        state.config.quotas.threads_daily,
        &subject,
        &date_str,
    )
    .await?
    {
        Coordination::Replay(post_id) => {
            return Ok(PublishResponse::replayed(post_id, PLATFORM))
        }
        Coordination::Proceed => {}
    }

    let deadline = Deadline::new(state.config.budget.deadline);
    let outcome = protected(state, platform.as_ref(), date, &date_str, &request, &deadline).await;
    state.idempotency.release_lock(ACTION, &date_str).await;
    outcome
}

async fn protected(
    state: &AppState,
    platform: &dyn ContainerPublisher,
    date: NaiveDate,
    date_str: &str,
    request: &ThreadsPostRequest,
    deadline: &Deadline,
) -> Result<PublishResponse, ApiError> {
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

    let image_path = document::image_path(date);
    let image_exists = state
        .content
        .raw_exists(&image_path, clamp(DOCUMENT_CEILING)?)
        .await
        .map_err(|e| upstream_failed("content-store", e))?;
    if !image_exists {
        return Err(ApiError::NotFound(
            "No image found for this date. Generate the image first.".into(),
        ));
    }
    let image_url = state.content.raw_url(&image_path);

    let text = match &request.text {
        Some(text) => text.clone(),
        None => build_text(&parsed),
    };
    let text = truncate_chars(&text, bounds::THREADS_TEXT_MAX);

    let container_id = platform
        .create_container(&image_url, &text, clamp(PLATFORM_CEILING)?)
        .await
        .map_err(|e| upstream_failed(ACTION, e))?;

    let poll = await_container_ready(
        platform,
        &container_id,
        &POLL_INTERVALS,
        PRE_SLEEP_MARGIN,
        deadline,
        margin,
    )
    .await
    .map_err(|e| upstream_failed(ACTION, e))?;

    let post_id = match poll {
        PollOutcome::Finished => platform
            .publish(&container_id, clamp(PLATFORM_CEILING)?)
            .await
            .map_err(|e| upstream_failed(ACTION, e))?,
        PollOutcome::AlreadyPublished => {
            // The platform published the container on its own; publishing
            // again would double-post.
            info!(container_id, "container observed already published");
            container_id
        }
        PollOutcome::Failed => {
            error!(container_id, "platform reported a processing error");
            return Err(ApiError::Upstream);
        }
        PollOutcome::Expired => {
            error!(container_id, "pending container expired before publishing");
            return Err(ApiError::Upstream);
        }
        PollOutcome::AttemptsExhausted | PollOutcome::OutOfTime => {
            return Err(ApiError::DeadlineExceeded)
        }
    };

    state
        .idempotency
        .record_completed(ACTION, date_str, &post_id)
        .await;

    Ok(PublishResponse::posted(post_id, PLATFORM))
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
