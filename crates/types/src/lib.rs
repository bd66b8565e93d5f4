//! Core type definitions for the sealed-bid energy auction.
//!
//! This crate provides the shared data structures used across the auction
//! system: round and phase bookkeeping, sealed bids, settlement results,
//! and the commitment scheme that binds a reveal to its earlier sealed bid.

use serde::{Deserialize, Serialize};

pub mod commitment;

pub use commitment::{seal_bid, verify_reveal, CommitmentParseError, SealedCommitment};

/// Unix timestamp in seconds.
pub type Timestamp = u64;

// =========================
// IDENTITY
// =========================

/// Opaque, stable bidder identity.
///
/// The coordinator treats this as an uninterpreted key; whatever identity
/// scheme the deployment uses (account address, agent name) maps onto it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidderId(pub String);

impl BidderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BidderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BidderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =========================
// ROUND & PHASES
// =========================

/// Auction lifecycle phase, derived purely from a round's timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No round has been started.
    NoRound,
    /// Before `bidding_start`.
    PreBidding,
    /// Sealed bids accepted.
    Bidding,
    /// Reveals accepted.
    Reveal,
    /// Past `reveal_end`, settlement not yet run.
    AwaitingClose,
    /// Settled; only reset or a fresh start can follow.
    Closed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NoRound => "no_round",
            Phase::PreBidding => "pre_bidding",
            Phase::Bidding => "bidding",
            Phase::Reveal => "reveal",
            Phase::AwaitingClose => "awaiting_close",
            Phase::Closed => "closed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_round" => Ok(Phase::NoRound),
            "pre_bidding" => Ok(Phase::PreBidding),
            "bidding" => Ok(Phase::Bidding),
            "reveal" => Ok(Phase::Reveal),
            "awaiting_close" => Ok(Phase::AwaitingClose),
            "closed" => Ok(Phase::Closed),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// A single trading round: one energy lot, one bidding window, one reveal
/// window, one settlement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionRound {
    pub round_id: u64,
    /// The party offering the energy; receives the clearing proceeds.
    pub seller: BidderId,
    /// Energy on offer, in kWh.
    pub energy_kwh: u64,
    /// Minimum price the lot clears at. Zero means no reserve.
    pub reserve_price: u64,
    pub bidding_start: Timestamp,
    pub bidding_end: Timestamp,
    pub reveal_end: Timestamp,
    /// Set exactly once, by settlement.
    pub closed: bool,
}

impl AuctionRound {
    /// Phase of this round at `now`.
    ///
    /// Window edges: bids are accepted while `now < bidding_end`; reveals
    /// from `bidding_end` through `reveal_end` inclusive; close only once
    /// `now > reveal_end`.
    pub fn phase_at(&self, now: Timestamp) -> Phase {
        if self.closed {
            Phase::Closed
        } else if now < self.bidding_start {
            Phase::PreBidding
        } else if now < self.bidding_end {
            Phase::Bidding
        } else if now <= self.reveal_end {
            Phase::Reveal
        } else {
            Phase::AwaitingClose
        }
    }
}

// =========================
// BIDS
// =========================

/// One participant's sealed bid for the current round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: BidderId,
    /// Hash of `(value, nonce)`; opened at reveal time.
    pub commitment: SealedCommitment,
    /// Collateral held in escrow; the winner's payment is drawn from it.
    pub deposit: u64,
    pub submitted_at: Timestamp,
    /// Set by a successful reveal.
    pub revealed_value: Option<u64>,
}

impl Bid {
    pub fn revealed(&self) -> bool {
        self.revealed_value.is_some()
    }
}

// =========================
// SETTLEMENT
// =========================

/// What a settled payout is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutKind {
    /// Full deposit back to a non-winning revealer.
    LoserRefund,
    /// Winner's deposit minus the clearing price.
    WinnerRefund,
    /// Clearing price plus any forfeited deposits, to the seller.
    SellerProceeds,
}

/// A single owed transfer produced by settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: BidderId,
    pub amount: u64,
    pub kind: PayoutKind,
}

/// Outcome of closing a round. Computed exactly once, queried any number
/// of times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub round_id: u64,
    /// `None` when no bid revealed at or above the reserve.
    pub winner: Option<BidderId>,
    /// Second-highest revealed value; reserve for a lone revealer; zero
    /// with no winner.
    pub clearing_price: u64,
    pub energy_kwh: u64,
    pub num_revealed: u32,
    pub settled_at: Timestamp,
    pub payouts: Vec<Payout>,
    /// Deposits kept from bidders who sealed but never revealed.
    pub forfeited: Vec<(BidderId, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round() -> AuctionRound {
        AuctionRound {
            round_id: 1,
            seller: BidderId::from("seller"),
            energy_kwh: 5,
            reserve_price: 0,
            bidding_start: 100,
            bidding_end: 200,
            reveal_end: 300,
            closed: false,
        }
    }

    #[test]
    fn phase_windows() {
        let r = round();
        assert_eq!(r.phase_at(99), Phase::PreBidding);
        assert_eq!(r.phase_at(100), Phase::Bidding);
        assert_eq!(r.phase_at(199), Phase::Bidding);
        assert_eq!(r.phase_at(200), Phase::Reveal);
        assert_eq!(r.phase_at(300), Phase::Reveal);
        assert_eq!(r.phase_at(301), Phase::AwaitingClose);
    }

    #[test]
    fn phase_closed_wins() {
        let mut r = round();
        r.closed = true;
        assert_eq!(r.phase_at(150), Phase::Closed);
        assert_eq!(r.phase_at(10_000), Phase::Closed);
    }

    #[test]
    fn bid_revealed_flag() {
        let mut bid = Bid {
            bidder: BidderId::from("alice"),
            commitment: seal_bid(10, "n"),
            deposit: 10,
            submitted_at: 150,
            revealed_value: None,
        };
        assert!(!bid.revealed());
        bid.revealed_value = Some(10);
        assert!(bid.revealed());
    }

    #[test]
    fn settlement_result_round_trips_through_json() {
        let result = SettlementResult {
            round_id: 7,
            winner: Some(BidderId::from("carol")),
            clearing_price: 10,
            energy_kwh: 5,
            num_revealed: 3,
            settled_at: 400,
            payouts: vec![Payout {
                recipient: BidderId::from("carol"),
                amount: 5,
                kind: PayoutKind::WinnerRefund,
            }],
            forfeited: vec![(BidderId::from("dave"), 3)],
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: SettlementResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.winner, result.winner);
        assert_eq!(back.payouts, result.payouts);
        assert_eq!(back.forfeited, result.forfeited);
    }
}
