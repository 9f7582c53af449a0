//! Relay configuration with validation.
//!
//! Tunables carry defaults and deserialize with `#[serde(default)]`;
//! secrets and account identifiers come from the environment via
//! [`AppConfig::from_env`]. `validate()` runs at startup so a misconfigured
//! relay refuses to boot instead of failing per-request.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::GatewayError;

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server bind settings.
    pub server: ServerConfig,
    /// Origin allow-list for the browser client.
    pub origins: OriginConfig,
    /// Claims-token settings.
    pub auth: AuthConfig,
    /// Capability-token settings for image generation.
    pub capability: CapabilityConfig,
    /// Remote atomic store settings.
    pub store: StoreConfig,
    /// Per-action daily quotas.
    pub quotas: QuotaConfig,
    /// Deadline budget and lock lifetime for protected sections.
    pub budget: BudgetConfig,
    /// Text-formatter collaborator.
    pub formatter: FormatterConfig,
    /// Content-store collaborator.
    pub content: ContentConfig,
    /// Image-generation collaborator (absent = endpoint disabled).
    pub images: Option<ImageConfig>,
    /// Instagram credentials (absent = endpoint disabled).
    pub instagram: Option<InstagramConfig>,
    /// Threads credentials (absent = endpoint disabled).
    pub threads: Option<ThreadsConfig>,
    /// Bluesky credentials (absent = endpoint disabled).
    pub bluesky: Option<BlueskyConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            origins: OriginConfig::default(),
            auth: AuthConfig::default(),
            capability: CapabilityConfig::default(),
            store: StoreConfig::default(),
            quotas: QuotaConfig::default(),
            budget: BudgetConfig::default(),
            formatter: FormatterConfig::default(),
            content: ContentConfig::default(),
            images: None,
            instagram: None,
            threads: None,
            bluesky: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Exact origin strings the browser client may call from.
    pub allowed: Vec<String>,
    /// Value for `Access-Control-Allow-Headers`.
    pub allow_headers: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for the claims token.
    pub jwt_secret: String,
    /// Subject the claims token must carry.
    pub subject: String,
    /// Deprecated shared token accepted as a fallback on the diary
    /// endpoint only; every use is logged at warning level.
    pub legacy_shared_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Dedicated secret for the image capability token. Absent disables
    /// issuance and the generate-image endpoint.
    pub secret: Option<String>,
    /// Absolute token lifetime measured from issuance.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl: diary_auth::capability::DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub token: String,
    /// Per-command request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub diary_daily: i64,
    pub image_daily: i64,
    pub instagram_daily: i64,
    pub threads_daily: i64,
    pub bluesky_daily: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            diary_daily: 30,
            image_daily: 10,
            instagram_daily: 5,
            threads_daily: 3,
            bluesky_daily: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Wall-clock budget for a protected section.
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    /// Safety margin reserved from the remaining budget before each call.
    #[serde(with = "humantime_serde")]
    pub margin: Duration,
    /// Mutual-exclusion lock lifetime.
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            deadline: diary_coord::deadline::DEFAULT_BUDGET,
            margin: diary_coord::deadline::DEFAULT_MARGIN,
            lock_ttl: diary_coord::idempotency::DEFAULT_LOCK_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 2000,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub api_base: String,
    pub raw_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: String,
    /// Timeout for content operations outside a deadline-budgeted section.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".into(),
            raw_base: "https://raw.githubusercontent.com".into(),
            owner: String::new(),
            repo: String::new(),
            branch: "main".into(),
            token: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub size: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/images/generations".into(),
            api_key: String::new(),
            model: "dall-e-3".into(),
            size: "1024x1024".into(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub api_base: String,
    pub access_token: String,
    pub account_id: String,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v21.0".into(),
            access_token: String::new(),
            account_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadsConfig {
    pub api_base: String,
    pub access_token: String,
    pub user_id: String,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.threads.net/v1.0".into(),
            access_token: String::new(),
            user_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    pub service: String,
    pub identifier: String,
    pub app_password: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: "https://bsky.social".into(),
            identifier: String::new(),
            app_password: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        let mut config = Self {
            auth: AuthConfig {
                jwt_secret: require("JWT_SECRET")?,
                subject: env_or("DIARY_ADMIN_SUBJECT", "diary-admin"),
                legacy_shared_token: optional("AUTH_TOKEN"),
            },
            ..Self::default()
        };

        config.origins.allowed = require("ALLOWED_ORIGINS")?
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        config.origins.allow_headers = env_or("ALLOW_HEADERS", "Content-Type, X-Auth-Token");

        config.capability.secret = optional("IMAGE_TOKEN_SECRET");

        config.store.url = require("UPSTASH_REDIS_REST_URL")?;
        config.store.token = require("UPSTASH_REDIS_REST_TOKEN")?;

        config.formatter.api_key = require("CLAUDE_API_KEY")?;
        if let Some(model) = optional("CLAUDE_MODEL") {
            config.formatter.model = model;
        }

        config.content.token = require("GITHUB_TOKEN")?;
        config.content.owner = require("GITHUB_OWNER")?;
        config.content.repo = require("GITHUB_REPO")?;
        if let Some(branch) = optional("GITHUB_BRANCH") {
            config.content.branch = branch;
        }

        if let Some(api_key) = optional("OPENAI_API_KEY") {
            config.images = Some(ImageConfig {
                api_key,
                ..ImageConfig::default()
            });
        }

        if let (Some(access_token), Some(account_id)) = (
            optional("INSTAGRAM_ACCESS_TOKEN"),
            optional("INSTAGRAM_BUSINESS_ACCOUNT_ID"),
        ) {
            config.instagram = Some(InstagramConfig {
                access_token,
                account_id,
                ..InstagramConfig::default()
            });
        }

        if let (Some(access_token), Some(user_id)) =
            (optional("THREADS_ACCESS_TOKEN"), optional("THREADS_USER_ID"))
        {
            config.threads = Some(ThreadsConfig {
                access_token,
                user_id,
                ..ThreadsConfig::default()
            });
        }

        if let (Some(identifier), Some(app_password)) =
            (optional("BLUESKY_IDENTIFIER"), optional("BLUESKY_APP_PASSWORD"))
        {
            config.bluesky = Some(BlueskyConfig {
                identifier,
                app_password,
                ..BlueskyConfig::default()
            });
        }

        if let Some(port) = optional("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid PORT value {port:?}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(GatewayError::Config("JWT secret must not be empty".into()));
        }
        if self.auth.subject.is_empty() {
            return Err(GatewayError::Config("admin subject must not be empty".into()));
        }
        if self.origins.allowed.is_empty() {
            return Err(GatewayError::Config(
                "origin allow-list must not be empty".into(),
            ));
        }
        if self.store.url.is_empty() || self.store.token.is_empty() {
            return Err(GatewayError::Config("store URL and token are required".into()));
        }
        let quotas = [
            self.quotas.diary_daily,
            self.quotas.image_daily,
            self.quotas.instagram_daily,
            self.quotas.threads_daily,
            self.quotas.bluesky_daily,
        ];
        if quotas.iter().any(|&q| q < 1) {
            return Err(GatewayError::Config("daily quotas must be at least 1".into()));
        }
        if self.budget.deadline <= self.budget.margin {
            return Err(GatewayError::Config(
                "deadline budget must exceed the safety margin".into(),
            ));
        }
        if self.budget.lock_ttl.as_secs() == 0 {
            return Err(GatewayError::Config("lock TTL must not be zero".into()));
        }
        Ok(())
    }

    /// HTTP bind address.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

fn require(name: &str) -> Result<String, GatewayError> {
    optional(name).ok_or_else(|| GatewayError::Config(format!("{name} is not set")))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}
