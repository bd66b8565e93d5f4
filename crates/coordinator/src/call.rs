//! Call message types for the coordinator.
//!
//! State-changing operations arrive as one tagged message type rather
//! than being dispatched on caller identity strings; the handler for each
//! variant does its own validation.

use energy_auction_types::{SealedCommitment, SettlementResult};
use serde::{Deserialize, Serialize};

/// State-changing calls accepted by the coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuctionCall {
    /// Open a new round for the given energy lot.
    StartRound {
        energy_kwh: u64,
        /// Bidding window length in seconds.
        bidding_duration: u64,
        /// Reveal window length in seconds.
        reveal_duration: u64,
        /// Optional minimum clearing price.
        reserve_price: Option<u64>,
    },

    /// Record a sealed commitment with its deposit.
    SubmitBid {
        round_id: u64,
        commitment: SealedCommitment,
        deposit: u64,
    },

    /// Open a sealed bid.
    SubmitReveal {
        round_id: u64,
        value: u64,
        nonce: String,
    },

    /// Settle the round.
    CloseAuction { round_id: u64 },

    /// Re-arm the clock for the next round.
    ResetRound {
        bidding_duration: u64,
        reveal_duration: u64,
    },
}

/// What a successfully handled call produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CallOutcome {
    RoundStarted(u64),
    BidAccepted,
    RevealAccepted,
    Settled(SettlementResult),
    RoundReset(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_auction_types::seal_bid;

    #[test]
    fn calls_round_trip_through_json() {
        let call = AuctionCall::SubmitBid {
            round_id: 3,
            commitment: seal_bid(50, "nonce"),
            deposit: 50,
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"type\":\"submit_bid\""));

        let back: AuctionCall = serde_json::from_str(&json).unwrap();
        match back {
            AuctionCall::SubmitBid {
                round_id, deposit, ..
            } => {
                assert_eq!(round_id, 3);
                assert_eq!(deposit, 50);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
