//! HTTP surface for the voice-diary relay.
//!
//! Every endpoint is a stateless, short-lived invocation composing the same
//! trust-and-coordination pipeline:
//!
//! ```text
//! Origin Guard → method check → token verification → Quota Guard
//!     → idempotency check → lock acquire
//!     → deadline-budgeted upstream calls
//!     → completion record → lock release (guaranteed)
//! ```
//!
//! The pipeline pieces live in `diary-auth` (tokens) and `diary-coord`
//! (remote-store coordination); this crate supplies the Origin Guard, the
//! per-action handlers, the collaborator clients (text formatter, content
//! store, image generator, social platforms), configuration, and the error
//! taxonomy mapping every outcome to a stable HTTP status with a
//! non-leaking JSON body.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod clients;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod service;

pub use domain::config::AppConfig;
pub use domain::error::{ApiError, GatewayError};
pub use service::{build_router, AppState, RelayService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
