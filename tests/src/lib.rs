//! # Diary Relay Test Suite
//!
//! Unified test crate for choreography that spans the workspace crates:
//! full handler pipelines driven through the real router against an
//! in-memory atomic store and scripted collaborator fakes.
//!
//! ```text
//! tests/src/
//! ├── support.rs        # fakes: store wrapper, collaborators, state builder
//! └── integration/      # cross-crate pipeline tests
//!     ├── create_diary.rs
//!     ├── publish_pipeline.rs
//!     └── coordination.rs
//! ```
//!
//! Run with `cargo test -p diary-tests`.

pub mod support;

#[cfg(test)]
mod integration {
    mod coordination;
    mod create_diary;
    mod publish_pipeline;
}
