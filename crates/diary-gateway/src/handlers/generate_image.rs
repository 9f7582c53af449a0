//! Image generation: authorize with the capability token, read the stored
//! diary's image prompt, generate, and publish the PNG.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use bytes::Bytes;
use diary_auth::capability;

use crate::domain::document;
use crate::domain::error::ApiError;
use crate::domain::types::{GenerateImageRequest, GenerateImageResponse};
use crate::handlers::{
    parse_body, parse_diary_date, quota_failed, require_json_content, upstream_failed,
};
use crate::service::AppState;

const SCOPE: &str = "image";

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
) -> Result<GenerateImageResponse, ApiError> {
    require_json_content(headers)?;

    let request: GenerateImageRequest = parse_body(body)?;
    let date = parse_diary_date(request.date.as_deref())?;
    let date_str = date.format("%Y-%m-%d").to_string();
    let token = request
        .image_token
        .ok_or_else(|| ApiError::InvalidInput("An image token is required.".into()))?;

    // This endpoint is authorized by the diary-scoped capability token
    // handed out at creation time, not by the claims token.
    let Some(secret) = state.config.capability.secret.as_ref() else {
        error!("capability secret is not configured");
        return Err(ApiError::Config);
    };
    capability::verify(
        &token,
        &date_str,
        secret.as_bytes(),
        state.config.capability.ttl,
    )
    .map_err(|_| ApiError::Auth)?;

    let Some(generator) = state.images.as_ref() else {
        error!("image generator is not configured");
        return Err(ApiError::Config);
    };

    match state
        .quota
        .consume(SCOPE, &date_str, state.config.quotas.image_daily)
        .await
        .map_err(quota_failed)?
    {
        diary_coord::QuotaOutcome::Allowed { .. } => {}
        diary_coord::QuotaOutcome::Exceeded { limit, .. } => {
            return Err(ApiError::QuotaExceeded { limit })
        }
    }

    let content_timeout = state.config.content.request_timeout;
    let diary_path = document::diary_path(date);
    let stored = state
        .content
        .get_document(&diary_path, content_timeout)
        .await
        .map_err(|e| upstream_failed("content-store", e))?
        .ok_or_else(|| ApiError::NotFound("No diary found for this date.".into()))?;

    let parsed = document::parse(&stored.content)
        .ok_or_else(|| ApiError::InvalidInput("The diary document is malformed.".into()))?;
    let prompt = parsed
        .image_prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("The diary has no image prompt.".into()))?;

    let image_timeout = state
        .config
        .images
        .as_ref()
        .map(|c| c.timeout)
        .unwrap_or(std::time::Duration::from_secs(60));
    let image_b64 = generator
        .generate(&prompt, image_timeout)
        .await
        .map_err(|e| upstream_failed("image-generator", e))?;

    let image_path = document::image_path(date);
    // Regeneration overwrites the day's image; fetch the version tag so
    // the update is not a blind write.
    let previous_version = state
        .content
        .get_version(&image_path, content_timeout)
        .await
        .map_err(|e| upstream_failed("content-store", e))?;

    let message = format!("image: {date_str} - generated illustration");
    state
        .content
        .put_binary(
            &image_path,
            &image_b64,
            previous_version.as_deref(),
            &message,
            content_timeout,
        )
        .await
        .map_err(|e| upstream_failed("content-store", e))?;

    Ok(GenerateImageResponse {
        success: true,
        image_url: state.content.raw_url(&image_path),
        image_path,
    })
}
