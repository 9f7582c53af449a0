//! Relay service assembly: shared state, router, middleware stack, and the
//! server entry point.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use diary_coord::{HttpStore, IdempotencyManager, QuotaGuard};

use crate::clients::{
    AnthropicFormatter, BlueskyClient, GithubContentStore, InstagramClient, OpenAiImageGenerator,
    ThreadsClient,
};
use crate::domain::config::AppConfig;
use crate::domain::error::{ApiError, GatewayError};
use crate::handlers;
use crate::middleware::{OriginGuardConfig, OriginGuardLayer};
use crate::ports::{BlueskyApi, ContainerPublisher, ContentStore, Formatter, ImageGenerator};

/// Shared state handed to every handler. All collaborators sit behind
/// ports so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub quota: QuotaGuard,
    pub idempotency: IdempotencyManager,
    pub formatter: Arc<dyn Formatter>,
    pub content: Arc<dyn ContentStore>,
    pub images: Option<Arc<dyn ImageGenerator>>,
    pub instagram: Option<Arc<dyn ContainerPublisher>>,
    pub threads: Option<Arc<dyn ContainerPublisher>>,
    pub bluesky: Option<Arc<dyn BlueskyApi>>,
}

/// Build the relay router over the given state: the action routes wrapped
/// in the origin guard, plus an unguarded health probe.
pub fn build_router(state: AppState) -> Router {
    let origin_guard = OriginGuardLayer::new(OriginGuardConfig {
        allowed_origins: state.config.origins.allowed.clone(),
        allow_headers: state.config.origins.allow_headers.clone(),
    });

    let api = Router::new()
        .route(
            "/create-diary",
            post(handlers::create_diary::handle).fallback(method_not_allowed),
        )
        .route(
            "/generate-image",
            post(handlers::generate_image::handle).fallback(method_not_allowed),
        )
        .route(
            "/post-instagram",
            post(handlers::post_instagram::handle).fallback(method_not_allowed),
        )
        .route(
            "/post-threads",
            post(handlers::post_threads::handle).fallback(method_not_allowed),
        )
        .route(
            "/post-bluesky",
            post(handlers::post_bluesky::handle).fallback(method_not_allowed),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(origin_guard),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// The assembled relay: production adapters wired into a router.
pub struct RelayService {
    config: Arc<AppConfig>,
    router: Router,
}

impl RelayService {
    /// Wire production collaborators from the configuration.
    pub fn new(config: AppConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let config = Arc::new(config);

        let client = reqwest::Client::builder()
            .user_agent(format!("diary-relay/{}", crate::VERSION))
            .build()
            .map_err(|e| GatewayError::Config(format!("http client: {e}")))?;

        let store = Arc::new(HttpStore::new(
            client.clone(),
            config.store.url.clone(),
            config.store.token.clone(),
            config.store.request_timeout,
        ));

        let state = AppState {
            quota: QuotaGuard::new(store.clone()),
            idempotency: IdempotencyManager::new(store),
            formatter: Arc::new(AnthropicFormatter::new(
                client.clone(),
                config.formatter.clone(),
            )),
            content: Arc::new(GithubContentStore::new(
                client.clone(),
                config.content.clone(),
            )),
            images: config.images.clone().map(|c| {
                Arc::new(OpenAiImageGenerator::new(client.clone(), c)) as Arc<dyn ImageGenerator>
            }),
            instagram: config.instagram.clone().map(|c| {
                Arc::new(InstagramClient::new(client.clone(), c)) as Arc<dyn ContainerPublisher>
            }),
            threads: config.threads.clone().map(|c| {
                Arc::new(ThreadsClient::new(client.clone(), c)) as Arc<dyn ContainerPublisher>
            }),
            bluesky: config
                .bluesky
                .clone()
                .map(|c| Arc::new(BlueskyClient::new(client, c)) as Arc<dyn BlueskyApi>),
            config: Arc::clone(&config),
        };

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> Result<(), GatewayError> {
        let addr = self.config.bind_addr();
        info!(%addr, "starting diary relay");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
