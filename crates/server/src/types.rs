//! RPC-compatible types for the coordinator service.
//!
//! These are JSON-serializable versions of the core auction types.

use energy_auction_coordinator::{PayoutStatus, PendingPayout, RoundStatus};
use energy_auction_types::{Bid, Payout, PayoutKind, SettlementResult};
use serde::{Deserialize, Serialize};

/// Parameters for starting a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundParams {
    pub sender: String,
    pub energy_kwh: u64,
    /// Omitted durations fall back to the server's configured defaults.
    pub bidding_duration_secs: Option<u64>,
    pub reveal_duration_secs: Option<u64>,
    pub reserve_price: Option<u64>,
}

/// Parameters for submitting a sealed bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBidParams {
    pub sender: String,
    pub round_id: u64,
    /// Hex-encoded 32-byte commitment.
    pub commitment: String,
    pub deposit: u64,
}

/// Parameters for revealing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRevealParams {
    pub sender: String,
    pub round_id: u64,
    pub value: u64,
    pub nonce: String,
}

/// Parameters for closing a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseAuctionParams {
    pub sender: String,
    pub round_id: u64,
}

/// Parameters for resetting the round clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRoundParams {
    pub sender: String,
    pub bidding_duration_secs: Option<u64>,
    pub reveal_duration_secs: Option<u64>,
}

/// Round status for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStatusRpc {
    pub round_id: Option<u64>,
    pub phase: String,
    pub energy_kwh: u64,
    pub reserve_price: u64,
    pub bidding_start: u64,
    pub bidding_end: u64,
    pub reveal_end: u64,
    pub closed: bool,
    pub num_bids: usize,
    pub num_revealed: usize,
    /// The coordinator's authoritative time at query evaluation.
    pub now: u64,
}

impl From<RoundStatus> for RoundStatusRpc {
    fn from(s: RoundStatus) -> Self {
        Self {
            round_id: s.round_id,
            phase: s.phase.as_str().to_string(),
            energy_kwh: s.energy_kwh,
            reserve_price: s.reserve_price,
            bidding_start: s.bidding_start,
            bidding_end: s.bidding_end,
            reveal_end: s.reveal_end,
            closed: s.closed,
            num_bids: s.num_bids,
            num_revealed: s.num_revealed,
            now: s.now,
        }
    }
}

/// A bid for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRpc {
    pub bidder: String,
    pub commitment: String,
    pub deposit: u64,
    pub submitted_at: u64,
    pub revealed: bool,
    pub revealed_value: Option<u64>,
}

impl From<&Bid> for BidRpc {
    fn from(b: &Bid) -> Self {
        Self {
            bidder: b.bidder.to_string(),
            commitment: b.commitment.to_hex(),
            deposit: b.deposit,
            submitted_at: b.submitted_at,
            revealed: b.revealed(),
            revealed_value: b.revealed_value,
        }
    }
}

fn payout_kind_str(kind: PayoutKind) -> &'static str {
    match kind {
        PayoutKind::LoserRefund => "loser_refund",
        PayoutKind::WinnerRefund => "winner_refund",
        PayoutKind::SellerProceeds => "seller_proceeds",
    }
}

/// A settled payout for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRpc {
    pub recipient: String,
    pub amount: u64,
    pub kind: String,
}

impl From<&Payout> for PayoutRpc {
    fn from(p: &Payout) -> Self {
        Self {
            recipient: p.recipient.to_string(),
            amount: p.amount,
            kind: payout_kind_str(p.kind).to_string(),
        }
    }
}

/// Settlement result for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResultRpc {
    pub round_id: u64,
    pub winner: Option<String>,
    pub clearing_price: u64,
    pub energy_kwh: u64,
    pub num_revealed: u32,
    pub settled_at: u64,
    pub payouts: Vec<PayoutRpc>,
    pub forfeited: Vec<(String, u64)>,
}

impl From<SettlementResult> for SettlementResultRpc {
    fn from(r: SettlementResult) -> Self {
        Self {
            round_id: r.round_id,
            winner: r.winner.map(|w| w.to_string()),
            clearing_price: r.clearing_price,
            energy_kwh: r.energy_kwh,
            num_revealed: r.num_revealed,
            settled_at: r.settled_at,
            payouts: r.payouts.iter().map(PayoutRpc::from).collect(),
            forfeited: r
                .forfeited
                .into_iter()
                .map(|(bidder, amount)| (bidder.to_string(), amount))
                .collect(),
        }
    }
}

/// A queued payout with its delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayoutRpc {
    pub round_id: u64,
    pub recipient: String,
    pub amount: u64,
    pub kind: String,
    pub attempts: u32,
    pub not_before: u64,
    pub status: String,
}

impl From<&PendingPayout> for PendingPayoutRpc {
    fn from(p: &PendingPayout) -> Self {
        Self {
            round_id: p.round_id,
            recipient: p.payout.recipient.to_string(),
            amount: p.payout.amount,
            kind: payout_kind_str(p.payout.kind).to_string(),
            attempts: p.attempts,
            not_before: p.not_before,
            status: match p.status {
                PayoutStatus::Pending => "pending",
                PayoutStatus::Delivered => "delivered",
                PayoutStatus::Abandoned => "abandoned",
            }
            .to_string(),
        }
    }
}

/// Outcome counters from a payout flush pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushSummaryRpc {
    pub delivered: usize,
    pub rescheduled: usize,
    pub abandoned: usize,
}
