//! Payout delivery: the funds-transfer port and the retry queue.
//!
//! Settlement never moves money directly. It enqueues payouts; delivery
//! runs through [`flush_payouts`], which retries transient failures with
//! exponential backoff and flags a payout for manual resolution once its
//! attempt budget is spent. One failing recipient never blocks the rest.

use std::collections::HashMap;
use std::sync::Mutex;

use energy_auction_types::{BidderId, Payout, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::CoordinatorConfig;
use crate::state::CoordinatorState;

/// A funds transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transfer failed: {reason}")]
pub struct TransferError {
    pub reason: String,
    /// Whether another attempt may succeed.
    pub retryable: bool,
}

impl TransferError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Port to the deployment's funds-transfer mechanism. Implementations must
/// provide at-least-once semantics: the coordinator retries against them.
pub trait FundsTransfer: Send + Sync {
    fn transfer(&self, recipient: &BidderId, amount: u64) -> Result<(), TransferError>;
}

/// Delivery status of a queued payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Delivered,
    /// Attempt budget spent or the failure was permanent; held for manual
    /// resolution.
    Abandoned,
}

/// A payout owed to a recipient, with its delivery bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingPayout {
    pub round_id: u64,
    pub payout: Payout,
    pub attempts: u32,
    pub not_before: Timestamp,
    pub status: PayoutStatus,
}

impl PendingPayout {
    pub fn new(round_id: u64, payout: Payout, now: Timestamp) -> Self {
        Self {
            round_id,
            payout,
            attempts: 0,
            not_before: now,
            status: PayoutStatus::Pending,
        }
    }
}

/// Result of one flush pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub delivered: usize,
    pub rescheduled: usize,
    pub abandoned: usize,
}

/// Attempt delivery of every due pending payout.
///
/// Each entry is tried at most once per pass; a transient failure pushes
/// its next attempt out by `backoff * 2^(attempts-1)` seconds.
pub fn flush_payouts(
    state: &mut CoordinatorState,
    transfer: &dyn FundsTransfer,
    now: Timestamp,
    config: &CoordinatorConfig,
) -> FlushSummary {
    let mut summary = FlushSummary::default();

    for entry in &mut state.pending_payouts {
        if entry.status != PayoutStatus::Pending || entry.not_before > now {
            continue;
        }

        entry.attempts += 1;
        match transfer.transfer(&entry.payout.recipient, entry.payout.amount) {
            Ok(()) => {
                entry.status = PayoutStatus::Delivered;
                summary.delivered += 1;
                info!(
                    round = entry.round_id,
                    recipient = %entry.payout.recipient,
                    amount = entry.payout.amount,
                    "payout delivered"
                );
            }
            Err(err) if err.retryable && entry.attempts < config.payout_max_attempts => {
                let backoff =
                    config.payout_retry_backoff_secs << (entry.attempts.saturating_sub(1));
                entry.not_before = now + backoff;
                summary.rescheduled += 1;
                warn!(
                    round = entry.round_id,
                    recipient = %entry.payout.recipient,
                    attempt = entry.attempts,
                    retry_in = backoff,
                    "payout delivery failed, will retry: {err}"
                );
            }
            Err(err) => {
                entry.status = PayoutStatus::Abandoned;
                summary.abandoned += 1;
                error!(
                    round = entry.round_id,
                    recipient = %entry.payout.recipient,
                    amount = entry.payout.amount,
                    attempts = entry.attempts,
                    "payout abandoned, manual resolution required: {err}"
                );
            }
        }
    }

    summary
}

/// In-memory transfer double for tests: records deliveries and can be
/// told to fail for specific recipients.
#[derive(Default)]
pub struct MockTransfer {
    delivered: Mutex<Vec<(BidderId, u64)>>,
    failures: Mutex<HashMap<BidderId, TransferError>>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make transfers to `recipient` fail with `err` until cleared.
    pub fn fail_for(&self, recipient: BidderId, err: TransferError) {
        self.failures.lock().unwrap().insert(recipient, err);
    }

    pub fn clear_failure(&self, recipient: &BidderId) {
        self.failures.lock().unwrap().remove(recipient);
    }

    pub fn delivered(&self) -> Vec<(BidderId, u64)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn total_delivered_to(&self, recipient: &BidderId) -> u64 {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, amount)| amount)
            .sum()
    }
}

impl FundsTransfer for MockTransfer {
    fn transfer(&self, recipient: &BidderId, amount: u64) -> Result<(), TransferError> {
        if let Some(err) = self.failures.lock().unwrap().get(recipient) {
            return Err(err.clone());
        }
        self.delivered
            .lock()
            .unwrap()
            .push((recipient.clone(), amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_auction_types::PayoutKind;

    fn queue_payout(state: &mut CoordinatorState, name: &str, amount: u64, now: Timestamp) {
        state.pending_payouts.push(PendingPayout::new(
            1,
            Payout {
                recipient: BidderId::from(name),
                amount,
                kind: PayoutKind::LoserRefund,
            },
            now,
        ));
    }

    #[test]
    fn flush_delivers_due_payouts() {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig::default();
        let transfer = MockTransfer::new();

        queue_payout(&mut state, "alice", 10, 0);
        queue_payout(&mut state, "bob", 7, 0);

        let summary = flush_payouts(&mut state, &transfer, 0, &config);
        assert_eq!(summary.delivered, 2);
        assert_eq!(transfer.delivered().len(), 2);
        assert!(state
            .pending_payouts
            .iter()
            .all(|p| p.status == PayoutStatus::Delivered));
    }

    #[test]
    fn transient_failure_reschedules_with_backoff() {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig::default();
        let transfer = MockTransfer::new();
        let alice = BidderId::from("alice");

        transfer.fail_for(alice.clone(), TransferError::transient("link down"));
        queue_payout(&mut state, "alice", 10, 0);

        let summary = flush_payouts(&mut state, &transfer, 0, &config);
        assert_eq!(summary.rescheduled, 1);
        assert_eq!(state.pending_payouts[0].status, PayoutStatus::Pending);
        assert_eq!(
            state.pending_payouts[0].not_before,
            config.payout_retry_backoff_secs
        );

        // Not due yet: nothing happens.
        let summary = flush_payouts(&mut state, &transfer, 1, &config);
        assert_eq!(summary, FlushSummary::default());

        // Recovered: delivers once due.
        transfer.clear_failure(&alice);
        let summary = flush_payouts(&mut state, &transfer, 10, &config);
        assert_eq!(summary.delivered, 1);
        assert_eq!(transfer.total_delivered_to(&alice), 10);
    }

    #[test]
    fn attempt_budget_exhaustion_abandons_without_blocking_others() {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig {
            payout_max_attempts: 3,
            ..Default::default()
        };
        let transfer = MockTransfer::new();

        transfer.fail_for(BidderId::from("alice"), TransferError::transient("down"));
        queue_payout(&mut state, "alice", 10, 0);
        queue_payout(&mut state, "bob", 7, 0);

        let mut now = 0;
        for _ in 0..3 {
            flush_payouts(&mut state, &transfer, now, &config);
            now += 1_000;
        }

        assert_eq!(state.pending_payouts[0].status, PayoutStatus::Abandoned);
        assert_eq!(state.pending_payouts[0].attempts, 3);
        assert_eq!(state.pending_payouts[1].status, PayoutStatus::Delivered);
        assert_eq!(transfer.total_delivered_to(&BidderId::from("bob")), 7);
    }

    #[test]
    fn permanent_failure_abandons_immediately() {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig::default();
        let transfer = MockTransfer::new();

        transfer.fail_for(
            BidderId::from("alice"),
            TransferError::permanent("unknown account"),
        );
        queue_payout(&mut state, "alice", 10, 0);

        let summary = flush_payouts(&mut state, &transfer, 0, &config);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(state.pending_payouts[0].attempts, 1);
    }
}
