//! Coordination layer for the diary relay.
//!
//! Every relay invocation is stateless and may run concurrently with any
//! number of siblings, so all cross-request coordination goes through a
//! remote atomic key-value store:
//!
//! - [`store`] — the [`AtomicStore`] port and its REST adapter
//!   ([`HttpStore`]). Single-key operations only; the store's per-key
//!   atomicity is the only ordering guarantee anything here relies on.
//! - [`quota`] — per-scope, per-identity, per-UTC-day counters with
//!   fail-closed semantics.
//! - [`idempotency`] — the completion ledger that makes side-effecting
//!   actions happen at most once per resource, plus the short-TTL lock
//!   that serializes concurrent attempts.
//! - [`deadline`] — the wall-clock budgeter that bounds every downstream
//!   call inside a protected section.
//! - [`memory`] — an in-process store with real INCR/SETNX/TTL semantics,
//!   for tests and local development only. Production coordination must
//!   use the remote store; process-local state cannot hold across
//!   instances.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod deadline;
pub mod error;
pub mod idempotency;
pub mod memory;
pub mod quota;
pub mod store;

pub use deadline::Deadline;
pub use error::{QuotaError, StoreError};
pub use idempotency::IdempotencyManager;
pub use memory::MemoryStore;
pub use quota::{QuotaGuard, QuotaOutcome};
pub use store::{AtomicStore, HttpStore};
