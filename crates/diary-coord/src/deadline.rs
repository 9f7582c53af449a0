//! Wall-clock budget for a protected section.
//!
//! The hosting environment kills an invocation at a hard ceiling, so every
//! handler fixes one deadline on entry to its protected section and derives
//! each downstream call's timeout from what is left. Running out of budget
//! becomes a clean, reportable outcome instead of an ungraceful kill.

use std::time::{Duration, Instant};

/// Default budget for a protected section, safely under the platform's
/// hard execution ceiling.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(25);

/// Default safety margin subtracted from the remaining time, covering
/// response serialization and cleanup after the last call.
pub const DEFAULT_MARGIN: Duration = Duration::from_secs(2);

/// A fixed instant by which the protected section must be done. Owned by a
/// single handler invocation; never persisted or shared.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Fix the deadline `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Time left before the deadline after reserving `margin`, or `None`
    /// when there is not enough left to safely proceed.
    pub fn remaining(&self, margin: Duration) -> Option<Duration> {
        let left = self.at.checked_duration_since(Instant::now())?;
        let usable = left.checked_sub(margin)?;
        (!usable.is_zero()).then_some(usable)
    }

    /// Timeout for one downstream call: the call's own ceiling, clamped to
    /// the remaining budget. `None` means the call must not be attempted.
    pub fn clamp(&self, ceiling: Duration, margin: Duration) -> Option<Duration> {
        self.remaining(margin).map(|left| left.min(ceiling))
    }
}
