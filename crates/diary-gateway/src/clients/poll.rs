//! Cooperative readiness polling for pending media containers.
//!
//! An ordered sequence of (wait, check) pairs: each iteration re-checks the
//! deadline before sleeping, caps the sleep at the remaining budget, checks
//! again after waking, and stops on a terminal status or an exhausted
//! schedule. A failed status check is logged and skipped — one flaky read
//! should not abort a post that is still in flight — except a credential
//! rejection, which cannot heal and is surfaced immediately.

use std::time::Duration;

use tracing::warn;

use diary_coord::Deadline;

use crate::ports::{ContainerPublisher, ContainerStatus, UpstreamError, UpstreamResult};

/// Ceiling for one status round-trip.
const STATUS_CEILING: Duration = Duration::from_secs(3);

/// How a poll run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Container is ready to publish.
    Finished,
    /// Container is already live; skip the publish round-trip.
    AlreadyPublished,
    /// Platform reported a processing error.
    Failed,
    /// The pending container aged out before becoming ready.
    Expired,
    /// Every scheduled check ran without reaching a terminal status.
    AttemptsExhausted,
    /// The deadline budget ran out mid-schedule.
    OutOfTime,
}

/// Drive `publisher`'s container to a terminal state, or run out of
/// schedule/budget trying.
pub async fn await_container_ready(
    publisher: &dyn ContainerPublisher,
    container_id: &str,
    intervals: &[Duration],
    pre_sleep_margin: Duration,
    deadline: &Deadline,
    margin: Duration,
) -> UpstreamResult<PollOutcome> {
    for interval in intervals {
        // Enough budget must remain for the wait plus the check itself.
        let Some(before_sleep) = deadline.remaining(pre_sleep_margin) else {
            return Ok(PollOutcome::OutOfTime);
        };
        tokio::time::sleep((*interval).min(before_sleep)).await;

        let Some(status_timeout) = deadline.clamp(STATUS_CEILING, margin) else {
            return Ok(PollOutcome::OutOfTime);
        };

        match publisher.container_status(container_id, status_timeout).await {
            Ok(ContainerStatus::InProgress) => {}
            Ok(ContainerStatus::Finished) => return Ok(PollOutcome::Finished),
            Ok(ContainerStatus::Published) => return Ok(PollOutcome::AlreadyPublished),
            Ok(ContainerStatus::Failed) => return Ok(PollOutcome::Failed),
            Ok(ContainerStatus::Expired) => return Ok(PollOutcome::Expired),
            Err(UpstreamError::CredentialRejected) => {
                return Err(UpstreamError::CredentialRejected)
            }
            Err(e) => {
                warn!(container_id, error = %e, "status check failed, continuing poll");
            }
        }
    }
    Ok(PollOutcome::AttemptsExhausted)
}
