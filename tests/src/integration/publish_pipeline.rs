//! Posting pipelines: idempotency replay, lock serialization, guaranteed
//! release, the container poll flow, and the collapsed Bluesky variant.

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::http::StatusCode;

use diary_gateway::ports::ContainerStatus;

use diary_coord::AtomicStore;

use crate::support::*;

fn seeded_content() -> FakeContentStore {
    FakeContentStore::default()
        .with_diary(fixed_date(), &sample_diary())
        .with_image(fixed_date())
}

fn seeded_world() -> TestWorld {
    build_world(test_config(), seeded_content())
}

fn post_body() -> serde_json::Value {
    serde_json::json!({ "date": DATE })
}

#[tokio::test(start_paused = true)]
async fn instagram_posts_records_completion_and_releases_the_lock() {
    let world = seeded_world();
    let (status, body) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["postId"], "post-for-container-1");
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(world.instagram.publish_calls.load(Ordering::SeqCst), 1);

    // Completion ledger entry persists with no expiry.
    assert_eq!(
        world.store.inner.value_of(&format!("instagram:posted:{DATE}")),
        Some("post-for-container-1".into())
    );
    assert_eq!(
        world.store.inner.has_expiry(&format!("instagram:posted:{DATE}")),
        Some(false)
    );

    // Lock taken once, released exactly once.
    assert_eq!(
        world.store.inner.value_of(&format!("instagram:lock:{DATE}")),
        None
    );
    assert_eq!(world.store.count_op("setnx"), 1);
    assert_eq!(world.store.count_op("del"), 1);
}

#[tokio::test]
async fn recorded_completion_replays_without_touching_the_platform() {
    let world = seeded_world();
    world
        .store
        .inner
        .set(&format!("instagram:posted:{DATE}"), "post-42")
        .await
        .unwrap();

    let (status, body) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["postId"], "post-42");
    assert_eq!(body["alreadyPosted"], true);
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
    // Short-circuited before the lock.
    assert_eq!(world.store.count_op("setnx"), 0);
}

#[tokio::test]
async fn held_lock_yields_conflict_without_platform_calls() {
    let world = seeded_world();
    world
        .store
        .inner
        .set_if_absent(&format!("instagram:lock:{DATE}"), "1", 60)
        .await
        .unwrap();

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_duplicates_serialize_one_wins_one_conflicts() {
    let world = seeded_world();
    // Hold the winner inside the protected section long enough for the
    // loser to hit the lock.
    *world.instagram.create_delay.lock() = Duration::from_millis(200);

    let first = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    );
    let second = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    );
    let ((status_a, _), (status_b, _)) = futures::join!(first, second);

    let mut statuses = [status_a, status_b];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    // The side-effecting action ran exactly once.
    assert_eq!(world.instagram.publish_calls.load(Ordering::SeqCst), 1);

    // A third attempt replays the recorded result, still without a second
    // platform call.
    let creates_before = world.instagram.create_calls.load(Ordering::SeqCst);
    let (status, body) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyPosted"], true);
    assert_eq!(
        world.instagram.create_calls.load(Ordering::SeqCst),
        creates_before
    );
}

#[tokio::test]
async fn lock_is_released_on_a_business_error() {
    // Diary present, image missing: the protected section 404s.
    let world = build_world(
        test_config(),
        FakeContentStore::default().with_diary(fixed_date(), &sample_diary()),
    );

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        world.store.inner.value_of(&format!("instagram:lock:{DATE}")),
        None
    );
    assert_eq!(world.store.count_op("del"), 1);
}

#[tokio::test(start_paused = true)]
async fn lock_is_released_on_an_upstream_failure() {
    let world = seeded_world();
    world.instagram.fail_create.store(true, Ordering::SeqCst);

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        world.store.inner.value_of(&format!("instagram:lock:{DATE}")),
        None
    );
    assert_eq!(world.store.count_op("del"), 1);
}

#[tokio::test]
async fn lock_is_released_when_the_deadline_is_already_spent() {
    let mut config = test_config();
    // One nanosecond of usable budget: the first clamp inside the
    // protected section must refuse.
    config.budget.margin = Duration::from_millis(10);
    config.budget.deadline = Duration::from_millis(10) + Duration::from_nanos(1);
    let world = build_world(config, seeded_content());

    let (status, _) = send(
        &world,
        api_request("/api/post-instagram", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(world.instagram.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        world.store.inner.value_of(&format!("instagram:lock:{DATE}")),
        None
    );
    assert_eq!(world.store.count_op("del"), 1);
}

#[tokio::test(start_paused = true)]
async fn threads_skips_publish_when_the_container_is_already_published() {
    let world = build_world(test_config(), seeded_content());
    *world.threads.statuses.lock() = vec![
        ContainerStatus::InProgress,
        ContainerStatus::Published,
    ];

    let (status, body) = send(
        &world,
        api_request("/api/post-threads", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    // Publishing again would double-post; the container id becomes the
    // post id.
    assert_eq!(world.threads.publish_calls.load(Ordering::SeqCst), 0);
    assert_eq!(body["postId"], "container-1");
    assert_eq!(
        world.store.inner.value_of(&format!("threads:posted:{DATE}")),
        Some("container-1".into())
    );
}

#[tokio::test(start_paused = true)]
async fn threads_failed_container_is_an_upstream_error_with_release() {
    let world = build_world(test_config(), seeded_content());
    *world.threads.statuses.lock() = vec![ContainerStatus::Failed];

    let (status, _) = send(
        &world,
        api_request("/api/post-threads", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(world.threads.publish_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        world.store.inner.value_of(&format!("threads:lock:{DATE}")),
        None
    );
}

#[tokio::test]
async fn bluesky_collapsed_flow_uploads_and_records() {
    let world = seeded_world();
    let (status, body) = send(
        &world,
        api_request("/api/post-bluesky", Some(&valid_token()), post_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let uri = body["postUri"].as_str().unwrap();
    assert!(uri.starts_with("at://"));
    assert_eq!(world.bluesky.session_calls.load(Ordering::SeqCst), 1);
    assert_eq!(world.bluesky.upload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(world.bluesky.post_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        world.store.inner.value_of(&format!("bluesky:posted:{DATE}")),
        Some(uri.to_string())
    );
    assert_eq!(
        world.store.inner.value_of(&format!("bluesky:lock:{DATE}")),
        None
    );
}

#[tokio::test]
async fn posting_without_a_diary_is_not_found() {
    let world = build_world(test_config(), FakeContentStore::default());
    let (status, _) = send(
        &world,
        api_request("/api/post-bluesky", Some(&valid_token()), post_body()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_dates_are_rejected_before_coordination() {
    let world = seeded_world();
    for bad in ["2026-99-99", "2026-8-6", "yesterday"] {
        let (status, _) = send(
            &world,
            api_request(
                "/api/post-instagram",
                Some(&valid_token()),
                serde_json::json!({ "date": bad }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad:?}");
    }
    assert!(world.store.ops().is_empty());
}

#[tokio::test]
async fn oversized_platform_text_is_rejected() {
    let world = seeded_world();
    let cases = [
        ("/api/post-instagram", "caption", 2_201),
        ("/api/post-threads", "text", 501),
        ("/api/post-bluesky", "text", 301),
    ];
    for (path, field, len) in cases {
        let (status, _) = send(
            &world,
            api_request(
                path,
                Some(&valid_token()),
                serde_json::json!({ "date": DATE, field: "x".repeat(len) }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
    }
}
