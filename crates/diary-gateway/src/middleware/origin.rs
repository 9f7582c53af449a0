//! Origin Guard: per-request web-origin validation and preflight handling.
//!
//! Runs before authentication and business logic. The policy is stricter
//! than additive CORS: a non-preflight request *must* declare an allowed
//! origin (rejecting curl-style tooling outright), and preflights are
//! answered here without ever reaching a route.

use axum::body::Body;
use axum::http::header::{HeaderValue, ORIGIN, VARY};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::debug;

use crate::domain::error::ApiError;

const ALLOW_ORIGIN: &str = "access-control-allow-origin";
const ALLOW_METHODS: &str = "access-control-allow-methods";
const ALLOW_HEADERS: &str = "access-control-allow-headers";
const ALLOWED_METHODS_VALUE: &str = "POST, OPTIONS";

/// Origin guard configuration.
#[derive(Clone, Default)]
pub struct OriginGuardConfig {
    /// Exact origin strings allowed to call the API.
    pub allowed_origins: Vec<String>,
    /// Value echoed in `Access-Control-Allow-Headers`.
    pub allow_headers: String,
}

impl OriginGuardConfig {
    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Origin guard layer.
#[derive(Clone)]
pub struct OriginGuardLayer {
    config: Arc<OriginGuardConfig>,
}

impl OriginGuardLayer {
    pub fn new(config: OriginGuardConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for OriginGuardLayer {
    type Service = OriginGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OriginGuardService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Origin guard service.
#[derive(Clone)]
pub struct OriginGuardService<S> {
    inner: S,
    config: Arc<OriginGuardConfig>,
}

impl<S> Service<Request<Body>> for OriginGuardService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let origin = req
                .headers()
                .get(ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let is_preflight = req.method() == Method::OPTIONS;

            if is_preflight {
                // Preflights terminate here; the real request follows as a
                // separate round-trip.
                if let Some(origin) = &origin {
                    if !config.is_allowed(origin) {
                        debug!(origin, "preflight from disallowed origin");
                        return Ok(ApiError::OriginDenied.into_response());
                    }
                }
                let mut response = StatusCode::OK.into_response();
                apply_cors_headers(&mut response, origin.as_deref(), &config);
                return Ok(response);
            }

            // Requests without a declared origin are not from the browser
            // client; reject before any authentication work.
            let Some(origin) = origin else {
                debug!("request without Origin header");
                return Ok(ApiError::OriginDenied.into_response());
            };
            if !config.is_allowed(&origin) {
                debug!(origin, "request from disallowed origin");
                return Ok(ApiError::OriginDenied.into_response());
            }

            let mut response = inner.call(req).await?;
            apply_cors_headers(&mut response, Some(&origin), &config);
            Ok(response)
        })
    }
}

/// Echo the allowed origin and mark the response origin-dependent so
/// shared caches vary by it.
fn apply_cors_headers(
    response: &mut Response,
    allowed_origin: Option<&str>,
    config: &OriginGuardConfig,
) {
    let headers = response.headers_mut();
    if let Some(origin) = allowed_origin {
        if config.is_allowed(origin) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(ALLOW_ORIGIN, value);
                headers.insert(VARY, HeaderValue::from_static("Origin"));
            }
        }
    }
    headers.insert(
        ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS_VALUE),
    );
    if let Ok(value) = HeaderValue::from_str(&config.allow_headers) {
        headers.insert(ALLOW_HEADERS, value);
    }
}
