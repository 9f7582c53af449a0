//! Tower middleware for the relay's HTTP surface.

pub mod origin;

pub use origin::{OriginGuardConfig, OriginGuardLayer};
