//! Diary-creation pipeline: origin guard, both credential paths, quota,
//! formatter, content store, and the issued capability token.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt;

use diary_auth::capability;
use diary_coord::AtomicStore;

use crate::support::*;

fn create_body() -> serde_json::Value {
    serde_json::json!({ "rawText": "short valid text" })
}

#[tokio::test]
async fn happy_path_formats_stores_and_issues_capability_token() {
    let world = default_world();
    let (status, body) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["title"], "A quiet day");
    assert_eq!(body["date"], today().format("%Y-%m-%d").to_string());
    assert_eq!(world.formatter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(world.content.put_calls.load(Ordering::SeqCst), 1);

    // The issued capability token authorizes image generation for today.
    let token = body["imageToken"].as_str().expect("image token issued");
    let date = today().format("%Y-%m-%d").to_string();
    assert!(capability::verify(
        token,
        &date,
        CAPABILITY_SECRET.as_bytes(),
        Duration::from_secs(300),
    )
    .is_ok());
}

#[tokio::test]
async fn first_use_of_the_day_sets_the_counter_expiry_before_formatting() {
    let world = default_world();
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let quota_key = format!("diary:{SUBJECT}:{}", today().format("%Y-%m-%d"));
    let ops = world.store.ops();
    let incr_at = ops
        .iter()
        .position(|(op, key)| op == "incr" && *key == quota_key)
        .expect("increment ran");
    let expire_at = ops
        .iter()
        .position(|(op, key)| op == "expire" && *key == quota_key)
        .expect("expiry ran");
    assert!(incr_at < expire_at);
    assert_eq!(world.store.inner.has_expiry(&quota_key), Some(true));
    assert_eq!(world.formatter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_counter_store_fails_closed_with_zero_collaborator_calls() {
    let world = default_world();
    world.store.fail_increment.store(true, Ordering::SeqCst);

    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(world.formatter.calls.load(Ordering::SeqCst), 0);
    assert_eq!(world.content.put_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_is_rejected_before_any_store_traffic() {
    let world = default_world();
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&expired_token()), create_body()),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(world.store.ops().is_empty());
    assert_eq!(world.formatter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn quota_boundary_allows_the_limit_and_rejects_one_past_it() {
    let world = default_world();
    let quota_key = format!("diary:{SUBJECT}:{}", today().format("%Y-%m-%d"));

    // 29 uses already counted; this request is number 30 of 30.
    world.store.inner.set(&quota_key, "29").await.unwrap();
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Number 31 is over quota and must not reach the formatter.
    let calls_before = world.formatter.calls.load(Ordering::SeqCst);
    let (status, body) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("(30)"));
    assert_eq!(world.formatter.calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn deprecated_shared_token_still_authenticates() {
    let world = default_world();
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(LEGACY_TOKEN), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let world = default_world();
    let forged = diary_auth::jwt::sign(
        &diary_auth::jwt::Claims::for_subject(SUBJECT, 3600),
        b"some-other-secret",
    );
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&forged), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_subject_is_rejected() {
    let world = default_world();
    let token = diary_auth::jwt::sign(
        &diary_auth::jwt::Claims::for_subject("someone-else", 3600),
        JWT_SECRET.as_bytes(),
    );
    let (status, _) = send(
        &world,
        api_request("/api/create-diary", Some(&token), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_without_an_origin_are_forbidden() {
    let world = default_world();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/create-diary")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-auth-token", valid_token())
        .body(Body::from(create_body().to_string()))
        .unwrap();
    let response = world.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn preflight_short_circuits_with_empty_ok() {
    let world = default_world();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/create-diary")
        .header(header::ORIGIN, ORIGIN)
        .body(Body::empty())
        .unwrap();
    let response = world.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn wrong_method_is_405() {
    let world = default_world();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/create-diary")
        .header(header::ORIGIN, ORIGIN)
        .body(Body::empty())
        .unwrap();
    let response = world.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn missing_and_oversized_text_are_bad_requests() {
    let world = default_world();

    let (status, _) = send(
        &world,
        api_request(
            "/api/create-diary",
            Some(&valid_token()),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &world,
        api_request(
            "/api/create-diary",
            Some(&valid_token()),
            serde_json::json!({ "rawText": "x".repeat(10_001) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_json_content_type_is_a_bad_request() {
    let world = default_world();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/create-diary")
        .header(header::ORIGIN, ORIGIN)
        .header("x-auth-token", valid_token())
        .body(Body::from(create_body().to_string()))
        .unwrap();
    let response = world.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn formatter_failure_is_a_generic_upstream_error() {
    let world = default_world();
    world.formatter.fail.store(true, Ordering::SeqCst);

    let (status, body) = send(
        &world,
        api_request("/api/create-diary", Some(&valid_token()), create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Generic message only; nothing about the collaborator leaks.
    assert_eq!(
        body["error"],
        "Temporary server error. Please try again later."
    );
}
