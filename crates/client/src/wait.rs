//! Waiting for a phase to open.
//!
//! A caller that arrives early sleeps once until the boundary computed
//! from the coordinator's own clock, then re-validates the actual phase;
//! time may have advanced past the intended window entirely, and only the
//! re-check decides. Timing out is a normal, retryable outcome.

use std::future::Future;
use std::time::Duration;

use energy_auction_types::Phase;
use tracing::debug;

/// Status fields the wait needs, as reported by the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub bidding_start: u64,
    pub bidding_end: u64,
    pub reveal_end: u64,
    /// The coordinator's clock at query time. All boundary math uses this,
    /// never the local clock.
    pub now: u64,
}

/// Outcome of waiting for a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The target phase is current.
    Reached,
    /// The round has already moved past the target phase.
    AlreadyPassed,
    /// The timeout elapsed first; re-check status and decide again.
    TimedOut,
}

fn order(phase: Phase) -> u8 {
    match phase {
        Phase::NoRound => 0,
        Phase::PreBidding => 1,
        Phase::Bidding => 2,
        Phase::Reveal => 3,
        Phase::AwaitingClose => 4,
        Phase::Closed => 5,
    }
}

/// Seconds until `target` opens, judged by the coordinator's clock.
fn seconds_until(target: Phase, status: &StatusSnapshot) -> u64 {
    let boundary = match target {
        Phase::NoRound | Phase::PreBidding => return 0,
        Phase::Bidding => status.bidding_start,
        Phase::Reveal => status.bidding_end,
        // AwaitingClose opens strictly after the reveal window.
        Phase::AwaitingClose => status.reveal_end + 1,
        // Closing is an action, not a timer; just poll.
        Phase::Closed => return 1,
    };
    boundary.saturating_sub(status.now)
}

/// Wait until `target` is the current phase, re-fetching status after
/// every sleep.
pub async fn wait_for_phase<F, Fut>(
    mut fetch_status: F,
    target: Phase,
    timeout: Duration,
) -> anyhow::Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<StatusSnapshot>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let status = fetch_status().await?;

        if status.phase == target {
            return Ok(WaitOutcome::Reached);
        }
        if order(status.phase) > order(target) {
            return Ok(WaitOutcome::AlreadyPassed);
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(WaitOutcome::TimedOut);
        }

        // Sleep to the phase boundary (at least one second so a lagging
        // coordinator clock cannot spin us), bounded by the timeout.
        let until_open = seconds_until(target, &status).max(1);
        let sleep = Duration::from_secs(until_open).min(remaining);
        debug!(?target, sleep_secs = sleep.as_secs(), "waiting for phase");
        tokio::time::sleep(sleep).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn snapshot(phase: Phase, now: u64) -> StatusSnapshot {
        StatusSnapshot {
            phase,
            bidding_start: 100,
            bidding_end: 200,
            reveal_end: 300,
            now,
        }
    }

    #[tokio::test]
    async fn reached_immediately() {
        let outcome = wait_for_phase(
            || async { Ok(snapshot(Phase::Bidding, 150)) },
            Phase::Bidding,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Reached);
    }

    #[tokio::test]
    async fn already_passed_detected_without_sleeping() {
        let outcome = wait_for_phase(
            || async { Ok(snapshot(Phase::AwaitingClose, 500)) },
            Phase::Bidding,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::AlreadyPassed);
    }

    #[tokio::test]
    async fn sleeps_to_boundary_then_revalidates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let outcome = wait_for_phase(
            move || {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    // Bidding opens one second after the first observation.
                    Ok(match n {
                        0 => snapshot(Phase::PreBidding, 99),
                        _ => snapshot(Phase::Bidding, 101),
                    })
                }
            },
            Phase::Bidding,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Reached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_timeout_reports_timed_out() {
        let outcome = wait_for_phase(
            || async { Ok(snapshot(Phase::PreBidding, 50)) },
            Phase::Bidding,
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }
}
