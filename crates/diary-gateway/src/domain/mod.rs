//! Domain types: configuration, error taxonomy, wire DTOs, and the diary
//! document format.

pub mod config;
pub mod document;
pub mod error;
pub mod types;
