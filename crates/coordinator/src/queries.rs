//! Read-only queries over coordinator state.
//!
//! Queries never fail on missing data: an empty ledger answers with
//! empty collections and `None`, so monitoring callers need no special
//! casing around idle periods.

use energy_auction_types::{Bid, BidderId, Phase, SettlementResult, Timestamp};
use serde::{Deserialize, Serialize};

use crate::payout::PendingPayout;
use crate::state::CoordinatorState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuctionQuery {
    /// Status of a round (the current one when `round_id` is omitted).
    GetStatus { round_id: Option<u64> },

    /// Settlement result for a round.
    GetResult { round_id: u64 },

    /// Bidders in the current round, in recording order.
    ListBidders,

    /// A bidder's bid in the current round.
    GetBid { bidder: BidderId },

    /// A bidder's escrow balance.
    GetEscrow { bidder: BidderId },

    /// Payouts owed but not yet delivered.
    PendingPayouts,
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    Status(RoundStatus),
    Result(Option<SettlementResult>),
    Bidders(Vec<BidderId>),
    Bid(Option<Bid>),
    Escrow(u64),
    PendingPayouts(Vec<PendingPayout>),
}

/// Snapshot of a round's clock and ledger counters.
///
/// Carries the coordinator's own `now` so callers compute waits against
/// the authoritative clock instead of their local one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundStatus {
    pub round_id: Option<u64>,
    pub phase: Phase,
    pub energy_kwh: u64,
    pub reserve_price: u64,
    pub bidding_start: Timestamp,
    pub bidding_end: Timestamp,
    pub reveal_end: Timestamp,
    pub closed: bool,
    pub num_bids: usize,
    pub num_revealed: usize,
    pub now: Timestamp,
}

impl RoundStatus {
    fn idle(now: Timestamp) -> Self {
        Self {
            round_id: None,
            phase: Phase::NoRound,
            energy_kwh: 0,
            reserve_price: 0,
            bidding_start: 0,
            bidding_end: 0,
            reveal_end: 0,
            closed: false,
            num_bids: 0,
            num_revealed: 0,
            now,
        }
    }
}

/// Status of the given round, or the current one.
pub fn round_status(state: &CoordinatorState, round_id: Option<u64>, now: Timestamp) -> RoundStatus {
    let id = round_id.or(state.current);
    let Some(round) = id.and_then(|id| state.rounds.get(&id)) else {
        return RoundStatus::idle(now);
    };

    // Bid counters only exist for the round the ledger belongs to.
    let (num_bids, num_revealed) = if state.current == Some(round.round_id) {
        (
            state.bids.len(),
            state.bids.values().filter(|b| b.revealed()).count(),
        )
    } else {
        let result = state.results.get(&round.round_id);
        let revealed = result.map(|r| r.num_revealed as usize).unwrap_or(0);
        (0, revealed)
    };

    RoundStatus {
        round_id: Some(round.round_id),
        phase: round.phase_at(now),
        energy_kwh: round.energy_kwh,
        reserve_price: round.reserve_price,
        bidding_start: round.bidding_start,
        bidding_end: round.bidding_end,
        reveal_end: round.reveal_end,
        closed: round.closed,
        num_bids,
        num_revealed,
        now,
    }
}

/// Handle a query.
pub fn handle_query(
    state: &CoordinatorState,
    now: Timestamp,
    query: AuctionQuery,
) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetStatus { round_id } => {
            AuctionQueryResponse::Status(round_status(state, round_id, now))
        }

        AuctionQuery::GetResult { round_id } => {
            AuctionQueryResponse::Result(state.results.get(&round_id).cloned())
        }

        AuctionQuery::ListBidders => {
            AuctionQueryResponse::Bidders(state.bidder_order.clone())
        }

        AuctionQuery::GetBid { bidder } => {
            AuctionQueryResponse::Bid(state.bids.get(&bidder).cloned())
        }

        AuctionQuery::GetEscrow { bidder } => {
            AuctionQueryResponse::Escrow(state.get_escrow(&bidder))
        }

        AuctionQuery::PendingPayouts => {
            AuctionQueryResponse::PendingPayouts(state.pending_payouts.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::handlers::{handle_start_round, handle_submit_bid, CallContext};
    use energy_auction_types::seal_bid;

    fn ctx(sender: &str, timestamp: Timestamp) -> CallContext {
        CallContext {
            sender: BidderId::from(sender),
            timestamp,
        }
    }

    #[test]
    fn status_when_idle_is_no_round() {
        let state = CoordinatorState::new();
        let status = round_status(&state, None, 42);
        assert_eq!(status.phase, Phase::NoRound);
        assert_eq!(status.round_id, None);
        assert_eq!(status.now, 42);
    }

    #[test]
    fn status_tracks_ledger_counters() {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig::default();
        let round_id =
            handle_start_round(&mut state, &ctx("seller", 100), 5, 100, 100, None).unwrap();
        handle_submit_bid(
            &mut state,
            &ctx("a", 150),
            &config,
            round_id,
            seal_bid(10, "n"),
            10,
        )
        .unwrap();

        let status = round_status(&state, None, 150);
        assert_eq!(status.round_id, Some(round_id));
        assert_eq!(status.phase, Phase::Bidding);
        assert_eq!(status.num_bids, 1);
        assert_eq!(status.num_revealed, 0);
    }

    #[test]
    fn queries_return_empty_rather_than_failing() {
        let state = CoordinatorState::new();

        let response = handle_query(&state, 0, AuctionQuery::ListBidders);
        assert!(matches!(
            response,
            AuctionQueryResponse::Bidders(bidders) if bidders.is_empty()
        ));

        let response = handle_query(
            &state,
            0,
            AuctionQuery::GetBid {
                bidder: BidderId::from("nobody"),
            },
        );
        assert!(matches!(response, AuctionQueryResponse::Bid(None)));

        let response = handle_query(&state, 0, AuctionQuery::GetResult { round_id: 9 });
        assert!(matches!(response, AuctionQueryResponse::Result(None)));
    }
}
