//! Fail-closed coordination properties: a broken store step must refuse
//! the request before any side-effecting collaborator is touched.

use std::sync::atomic::Ordering;

use axum::http::StatusCode;

use diary_coord::AtomicStore;

use crate::support::*;

fn seeded_world() -> TestWorld {
    build_world(
        test_config(),
        FakeContentStore::default()
            .with_diary(fixed_date(), &sample_diary())
            .with_image(fixed_date()),
    )
}

fn post_body() -> serde_json::Value {
    serde_json::json!({ "date": DATE })
}

#[tokio::test]
async fn quota_increment_failure_blocks_the_platform() {
    let world = seeded_world();
    world.store.fail_increment.store(true, Ordering::SeqCst);

    let (status, body) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Temporary server error. Please try again later."
    );
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(world.instagram.publish_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreadable_completion_ledger_fails_closed() {
    // An unreachable ledger must never be read as "not done yet": that
    // risks a duplicate post.
    let world = seeded_world();
    world.store.fail_get.store(true, Ordering::SeqCst);

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
    // The lock was never attempted either.
    assert_eq!(world.store.count_op("setnx"), 0);
}

#[tokio::test]
async fn failed_lock_acquisition_call_fails_closed() {
    let world = seeded_world();
    world.store.fail_set_if_absent.store(true, Ordering::SeqCst);

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn publish_quota_boundary_matches_the_limit() {
    let world = seeded_world();
    let quota_key = format!("instagram:{SUBJECT}:{}", today().format("%Y-%m-%d"));

    // Four uses counted; number five (the limit) still proceeds.
    world.store.inner.set(&quota_key, "4").await.unwrap();
    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Number six is over quota, reported as such, with no platform call.
    let creates_before = world.instagram.create_calls.load(Ordering::SeqCst);
    let (status, body) = send(
        &world,
        api_request(
            "/api/post-instagram",
            Some(&valid_token()),
            serde_json::json!({ "date": "2026-08-07" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("(5)"));
    assert_eq!(
        world.instagram.create_calls.load(Ordering::SeqCst),
        creates_before
    );
}

#[tokio::test]
async fn missing_platform_credentials_are_a_config_failure() {
    let store = std::sync::Arc::new(ScriptedStore::new());
    let state = diary_gateway::AppState {
        config: std::sync::Arc::new(test_config()),
        quota: diary_coord::QuotaGuard::new(store.clone()),
        idempotency: diary_coord::IdempotencyManager::new(store),
        formatter: std::sync::Arc::new(CountingFormatter::default()),
        content: std::sync::Arc::new(FakeContentStore::default()),
        images: None,
        instagram: None,
        threads: None,
        bluesky: None,
    };
    let router = diary_gateway::build_router(state);

    let request = api_request("/api/post-instagram", Some(&valid_token()), post_body());
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
