//! Request handlers, one per action, plus the pipeline pieces they share.
//!
//! Shared here so the five actions cannot drift apart: content-type and
//! body parsing, token authentication, date validation, and the
//! quota → idempotency-check → lock front half of every publish pipeline.

pub mod create_diary;
pub mod generate_image;
pub mod post_bluesky;
pub mod post_instagram;
pub mod post_threads;

use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use diary_auth::jwt;
use diary_coord::{QuotaError, QuotaOutcome, StoreError};

use crate::domain::config::AuthConfig;
use crate::domain::error::ApiError;
use crate::ports::UpstreamError;
use crate::service::AppState;

/// Header carrying the signed token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Require `Content-Type: application/json`.
pub(crate) fn require_json_content(headers: &HeaderMap) -> Result<(), ApiError> {
    let ok = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if ok {
        Ok(())
    } else {
        Err(ApiError::InvalidInput("Invalid request format.".into()))
    }
}

/// Parse the JSON body into a request DTO.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|_| ApiError::InvalidInput("Invalid request format.".into()))
}

/// Verify the claims token and pin its subject. The only accepted path on
/// the posting and image endpoints.
pub(crate) fn authenticate_jwt(headers: &HeaderMap, auth: &AuthConfig) -> Result<String, ApiError> {
    let token = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Auth)?;
    let claims = jwt::verify(token, auth.jwt_secret.as_bytes()).map_err(|_| ApiError::Auth)?;
    if claims.sub != auth.subject {
        return Err(ApiError::Auth);
    }
    Ok(claims.sub)
}

/// Claims token first; the deprecated shared token second. Every use of
/// the fallback is logged at warning level — it is the migration path off
/// the fixed credential, not a supported peer.
pub(crate) fn authenticate_with_fallback(
    headers: &HeaderMap,
    auth: &AuthConfig,
) -> Result<String, ApiError> {
    if let Ok(subject) = authenticate_jwt(headers, auth) {
        return Ok(subject);
    }
    let (Some(expected), Some(supplied)) = (
        auth.legacy_shared_token.as_deref(),
        headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()),
    ) else {
        return Err(ApiError::Auth);
    };
    if constant_time_eq(supplied, expected) {
        warn!("deprecated shared-token credential used; migrate this client to signed tokens");
        return Ok(auth.subject.clone());
    }
    Err(ApiError::Auth)
}

/// Constant-time string equality. Padding keeps the comparison length
/// independent of how much of the secret matched.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());
    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// Validate a `YYYY-MM-DD` string into a real calendar date. The
/// round-trip format check rejects shapes the lenient parser tolerates.
pub(crate) fn parse_diary_date(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::InvalidInput("A date is required.".into()))?;
    let invalid = || ApiError::InvalidInput("The date format is invalid.".into());
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    if date.format("%Y-%m-%d").to_string() != raw {
        return Err(invalid());
    }
    Ok(date)
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Store failure during a coordination step: log and fail closed.
pub(crate) fn store_failed(step: &'static str, error: StoreError) -> ApiError {
    error!(step, error = %error, "coordination store unavailable");
    ApiError::Upstream
}

/// Quota-guard failure: infrastructure, not an over-limit outcome.
pub(crate) fn quota_failed(error: QuotaError) -> ApiError {
    error!(error = %error, "quota consultation failed");
    ApiError::Upstream
}

/// Collaborator failure: credential problems surface as 401, the rest as
/// a generic upstream 500 with detail in the logs.
pub(crate) fn upstream_failed(collaborator: &'static str, error: UpstreamError) -> ApiError {
    match error {
        UpstreamError::CredentialRejected => {
            warn!(collaborator, "upstream rejected our credential");
            ApiError::UpstreamCredential
        }
        other => {
            error!(collaborator, error = %other, "upstream call failed");
            ApiError::Upstream
        }
    }
}

/// Front half of every publish pipeline: quota, completion ledger, lock.
pub(crate) enum Coordination {
    /// A prior completion exists; short-circuit to its recorded result.
    Replay(String),
    /// Lock held; the protected section may run. The caller owns release.
    Proceed,
}

pub(crate) async fn begin_publish(
    state: &AppState,
    action: &'static str,
    scope: &'static str,
    daily_limit: i64,
    identity: &str,
    resource: &str,
) -> Result<Coordination, ApiError> {
    match state
        .quota
        .consume(scope, identity, daily_limit)
        .await
        .map_err(quota_failed)?
    {
        QuotaOutcome::Allowed { .. } => {}
        QuotaOutcome::Exceeded { limit, .. } => return Err(ApiError::QuotaExceeded { limit }),
    }

    if let Some(previous) = state
        .idempotency
        .check_completed(action, resource)
        .await
        .map_err(|e| store_failed("idempotency-check", e))?
    {
        return Ok(Coordination::Replay(previous));
    }

    let acquired = state
        .idempotency
        .acquire_lock(action, resource, state.config.budget.lock_ttl)
        .await
        .map_err(|e| store_failed("lock-acquire", e))?;
    if !acquired {
        return Err(ApiError::Conflict);
    }

    Ok(Coordination::Proceed)
}
