//! Diary creation: format the transcript, store the document, hand back a
//! capability token for the follow-on image generation.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use tracing::{error, warn};

use diary_auth::capability;

use crate::domain::document;
use crate::domain::error::ApiError;
use crate::domain::types::{bounds, CreateDiaryRequest, CreateDiaryResponse};
use crate::handlers::{
    authenticate_with_fallback, parse_body, quota_failed, require_json_content, upstream_failed,
};
use crate::service::AppState;

const SCOPE: &str = "diary";

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
) -> Result<CreateDiaryResponse, ApiError> {
    require_json_content(headers)?;
    // The one endpoint still accepting the deprecated shared token.
    let subject = authenticate_with_fallback(headers, &state.config.auth)?;

    let request: CreateDiaryRequest = parse_body(body)?;
    let raw_text = request
        .raw_text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Diary text is required.".into()))?;
    if raw_text.chars().count() > bounds::RAW_TEXT_MAX {
        return Err(ApiError::InvalidInput(format!(
            "Diary text is too long (max {} characters).",
            bounds::RAW_TEXT_MAX
        )));
    }

    // Quota before any collaborator call; a broken counter store refuses
    // the request here.
    match state
        .quota
        .consume(SCOPE, &subject, state.config.quotas.diary_daily)
        .await
        .map_err(quota_failed)?
    {
        diary_coord::QuotaOutcome::Allowed { .. } => {}
        diary_coord::QuotaOutcome::Exceeded { limit, .. } => {
            return Err(ApiError::QuotaExceeded { limit })
        }
    }

    let today = Utc::now().date_naive();
    let date_str = today.format("%Y-%m-%d").to_string();

    let diary = state
        .formatter
        .format_diary(&raw_text, &date_str, state.config.formatter.timeout)
        .await
        .map_err(|e| upstream_failed("formatter", e))?;
    if let Err(issues) = diary.validate() {
        error!(?issues, "formatter output failed schema validation");
        return Err(ApiError::Upstream);
    }

    let markdown = document::render(&diary, today);
    let path = document::diary_path(today);
    let content_timeout = state.config.content.request_timeout;

    // Same-day rewrites need the current version tag. A failed read
    // degrades to a create; the write below still fails cleanly if the
    // document exists.
    let previous_version = match state.content.get_document(&path, content_timeout).await {
        Ok(existing) => existing.map(|d| d.version),
        Err(e) => {
            warn!(path, error = %e, "could not read existing document version");
            None
        }
    };

    let message = format!("diary: {date_str} - {}", diary.title);
    state
        .content
        .put_document(
            &path,
            &markdown,
            previous_version.as_deref(),
            &message,
            content_timeout,
        )
        .await
        .map_err(|e| upstream_failed("content-store", e))?;

    let image_token = state
        .config
        .capability
        .secret
        .as_ref()
        .map(|secret| capability::issue(&date_str, secret.as_bytes()));

    Ok(CreateDiaryResponse {
        success: true,
        title: diary.title.clone(),
        tags: diary.tags.clone(),
        content_url: state.content.raw_url(&path),
        file_path: path,
        date: date_str,
        image_token,
    })
}
