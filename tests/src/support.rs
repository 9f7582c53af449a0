//! Shared fakes and builders for the integration tests.
//!
//! The store fake wraps the real in-memory store (real INCR/SETNX/TTL
//! semantics) and adds per-operation failure switches plus a call log, so
//! tests can break exactly one coordination step and assert what was and
//! was not touched.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use tower::ServiceExt;

use diary_auth::jwt::{self, Claims};
use diary_coord::{AtomicStore, IdempotencyManager, MemoryStore, QuotaGuard, StoreError};
use diary_gateway::domain::config::AppConfig;
use diary_gateway::domain::types::FormattedDiary;
use diary_gateway::ports::{
    BlueskyApi, BlueskySession, ContainerPublisher, ContainerStatus, ContentStore, Formatter,
    ImageGenerator, StoredDocument, UpstreamError, UpstreamResult,
};
use diary_gateway::{build_router, AppState};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const CAPABILITY_SECRET: &str = "test-image-secret";
pub const LEGACY_TOKEN: &str = "legacy-shared-token";
pub const ORIGIN: &str = "https://diary.example.com";
pub const SUBJECT: &str = "diary-admin";
pub const DATE: &str = "2026-08-06";

// ---------------------------------------------------------------------------
// Store fake
// ---------------------------------------------------------------------------

/// In-memory store with failure switches and a call log.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub fail_increment: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_set_if_absent: AtomicBool,
    ops: Mutex<Vec<(String, String)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, op: &str, key: &str) {
        self.ops.lock().push((op.to_string(), key.to_string()));
    }

    /// Every (operation, key) pair seen, in order.
    pub fn ops(&self) -> Vec<(String, String)> {
        self.ops.lock().clone()
    }

    pub fn count_op(&self, op: &str) -> usize {
        self.ops.lock().iter().filter(|(o, _)| o == op).count()
    }
}

#[async_trait]
impl AtomicStore for ScriptedStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        self.log("incr", key);
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(StoreError::Status(503));
        }
        self.inner.increment(key).await
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        self.log("expire", key);
        self.inner.set_expiry(key, seconds).await
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.log("ttl", key);
        self.inner.ttl(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.log("get", key);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Status(503));
        }
        self.inner.get(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        self.log("setnx", key);
        if self.fail_set_if_absent.load(Ordering::SeqCst) {
            return Err(StoreError::Status(503));
        }
        self.inner.set_if_absent(key, value, ttl_seconds).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.log("set", key);
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.log("del", key);
        self.inner.delete(key).await
    }
}

// ---------------------------------------------------------------------------
// Collaborator fakes
// ---------------------------------------------------------------------------

pub fn sample_diary() -> FormattedDiary {
    FormattedDiary {
        title: "A quiet day".into(),
        summary: "Slept in.\nWalked by the river.\nCooked dinner.".into(),
        body: "The morning started slowly.\n\nLater, the river.".into(),
        tags: vec!["#diary".into(), "#river".into()],
        image_prompt: "a calm river at dusk, watercolor".into(),
    }
}

/// Formatter returning a fixed diary, counting calls, optionally failing.
#[derive(Default)]
pub struct CountingFormatter {
    pub calls: AtomicU32,
    pub fail: AtomicBool,
}

#[async_trait]
impl Formatter for CountingFormatter {
    async fn format_diary(
        &self,
        _raw_text: &str,
        _date: &str,
        _timeout: Duration,
    ) -> UpstreamResult<FormattedDiary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(502));
        }
        Ok(sample_diary())
    }
}

/// Content store over two in-memory maps (documents and published files).
#[derive(Default)]
pub struct FakeContentStore {
    pub documents: Mutex<std::collections::HashMap<String, String>>,
    pub raw_files: Mutex<std::collections::HashMap<String, Bytes>>,
    pub put_calls: AtomicU32,
}

impl FakeContentStore {
    pub fn with_diary(self, date: chrono::NaiveDate, diary: &FormattedDiary) -> Self {
        let path = diary_gateway::domain::document::diary_path(date);
        let content = diary_gateway::domain::document::render(diary, date);
        self.documents.lock().insert(path, content);
        self
    }

    pub fn with_image(self, date: chrono::NaiveDate) -> Self {
        let path = diary_gateway::domain::document::image_path(date);
        self.raw_files.lock().insert(path, Bytes::from_static(b"png"));
        self
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn get_document(
        &self,
        path: &str,
        _timeout: Duration,
    ) -> UpstreamResult<Option<StoredDocument>> {
        Ok(self.documents.lock().get(path).map(|content| StoredDocument {
            content: content.clone(),
            version: "v1".into(),
        }))
    }

    async fn get_version(&self, path: &str, _timeout: Duration) -> UpstreamResult<Option<String>> {
        Ok(self.documents.lock().get(path).map(|_| "v1".to_string()))
    }

    async fn put_document(
        &self,
        path: &str,
        content: &str,
        _previous_version: Option<&str>,
        _message: &str,
        _timeout: Duration,
    ) -> UpstreamResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().insert(path.into(), content.into());
        Ok(())
    }

    async fn put_binary(
        &self,
        path: &str,
        content_b64: &str,
        _previous_version: Option<&str>,
        _message: &str,
        _timeout: Duration,
    ) -> UpstreamResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.raw_files
            .lock()
            .insert(path.into(), Bytes::from(content_b64.to_string()));
        Ok(())
    }

    async fn raw_exists(&self, path: &str, _timeout: Duration) -> UpstreamResult<bool> {
        Ok(self.raw_files.lock().contains_key(path))
    }

    async fn fetch_raw(&self, path: &str, _timeout: Duration) -> UpstreamResult<Option<Bytes>> {
        Ok(self.raw_files.lock().get(path).cloned())
    }

    fn raw_url(&self, path: &str) -> String {
        format!("https://raw.test.example/{path}")
    }
}

/// Image generator returning a fixed payload.
#[derive(Default)]
pub struct FakeImageGenerator {
    pub calls: AtomicU32,
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, _prompt: &str, _timeout: Duration) -> UpstreamResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("aW1hZ2U=".into())
    }
}

/// Container platform with a scripted status sequence and call counters.
pub struct FakePublisher {
    pub statuses: Mutex<Vec<ContainerStatus>>,
    pub create_calls: AtomicU32,
    pub publish_calls: AtomicU32,
    pub fail_create: AtomicBool,
    /// Hold the create call open, to widen lock-contention windows.
    pub create_delay: Mutex<Duration>,
}

impl Default for FakePublisher {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(vec![ContainerStatus::Finished]),
            create_calls: AtomicU32::new(0),
            publish_calls: AtomicU32::new(0),
            fail_create: AtomicBool::new(false),
            create_delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl FakePublisher {
    pub fn with_statuses(statuses: Vec<ContainerStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ContainerPublisher for FakePublisher {
    async fn create_container(
        &self,
        _image_url: &str,
        _text: &str,
        _timeout: Duration,
    ) -> UpstreamResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(500));
        }
        Ok("container-1".into())
    }

    async fn container_status(
        &self,
        _container_id: &str,
        _timeout: Duration,
    ) -> UpstreamResult<ContainerStatus> {
        let mut statuses = self.statuses.lock();
        if statuses.len() > 1 {
            Ok(statuses.remove(0))
        } else {
            Ok(*statuses.first().unwrap_or(&ContainerStatus::Finished))
        }
    }

    async fn publish(&self, container_id: &str, _timeout: Duration) -> UpstreamResult<String> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("post-for-{container_id}"))
    }
}

/// Collapsed-variant platform recording its call sequence.
#[derive(Default)]
pub struct FakeBluesky {
    pub session_calls: AtomicU32,
    pub upload_calls: AtomicU32,
    pub post_calls: AtomicU32,
}

#[async_trait]
impl BlueskyApi for FakeBluesky {
    async fn create_session(&self, _timeout: Duration) -> UpstreamResult<BlueskySession> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BlueskySession {
            access_jwt: "jwt".into(),
            did: "did:plc:test".into(),
        })
    }

    async fn upload_blob(
        &self,
        _session: &BlueskySession,
        _bytes: Bytes,
        _timeout: Duration,
    ) -> UpstreamResult<serde_json::Value> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "$type": "blob" }))
    }

    async fn create_post(
        &self,
        _session: &BlueskySession,
        _text: &str,
        _image_alt: &str,
        _blob: serde_json::Value,
        _timeout: Duration,
    ) -> UpstreamResult<String> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        Ok("at://did:plc:test/app.bsky.feed.post/1".into())
    }
}

// ---------------------------------------------------------------------------
// State and request builders
// ---------------------------------------------------------------------------

/// The full wired test world, with handles to every fake.
pub struct TestWorld {
    pub router: Router,
    pub store: Arc<ScriptedStore>,
    pub formatter: Arc<CountingFormatter>,
    pub content: Arc<FakeContentStore>,
    pub images: Arc<FakeImageGenerator>,
    pub instagram: Arc<FakePublisher>,
    pub threads: Arc<FakePublisher>,
    pub bluesky: Arc<FakeBluesky>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = JWT_SECRET.into();
    config.auth.subject = SUBJECT.into();
    config.auth.legacy_shared_token = Some(LEGACY_TOKEN.into());
    config.origins.allowed = vec![ORIGIN.into()];
    config.origins.allow_headers = "Content-Type, X-Auth-Token".into();
    config.capability.secret = Some(CAPABILITY_SECRET.into());
    config.store.url = "https://kv.test.example".into();
    config.store.token = "token".into();
    config
}

pub fn build_world(config: AppConfig, content: FakeContentStore) -> TestWorld {
    let store = Arc::new(ScriptedStore::new());
    let formatter = Arc::new(CountingFormatter::default());
    let content = Arc::new(content);
    let images = Arc::new(FakeImageGenerator::default());
    let instagram = Arc::new(FakePublisher::default());
    let threads = Arc::new(FakePublisher::with_statuses(vec![
        ContainerStatus::Finished,
    ]));
    let bluesky = Arc::new(FakeBluesky::default());

    let state = AppState {
        config: Arc::new(config),
        quota: QuotaGuard::new(store.clone()),
        idempotency: IdempotencyManager::new(store.clone()),
        formatter: formatter.clone(),
        content: content.clone(),
        images: Some(images.clone()),
        instagram: Some(instagram.clone()),
        threads: Some(threads.clone()),
        bluesky: Some(bluesky.clone()),
    };

    TestWorld {
        router: build_router(state),
        store,
        formatter,
        content,
        images,
        instagram,
        threads,
        bluesky,
    }
}

pub fn default_world() -> TestWorld {
    build_world(test_config(), FakeContentStore::default())
}

pub fn valid_token() -> String {
    jwt::sign(
        &Claims::for_subject(SUBJECT, 3600),
        JWT_SECRET.as_bytes(),
    )
}

pub fn expired_token() -> String {
    let claims = Claims {
        sub: SUBJECT.into(),
        exp: diary_auth::unix_now() - 1000,
        iat: None,
        nbf: None,
    };
    jwt::sign(&claims, JWT_SECRET.as_bytes())
}

/// POST an API request with origin, content-type, and optional token.
pub fn api_request(path: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("x-auth-token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Drive one request through a clone of the router.
pub async fn send(world: &TestWorld, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response: Response<Body> = world.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// Today's UTC date, matching what the handlers compute.
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

pub fn fixed_date() -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(DATE, "%Y-%m-%d").unwrap()
}
