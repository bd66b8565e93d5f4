//! Handlers for the coordinator's state-changing operations.
//!
//! Every handler takes the shared state, a [`CallContext`] carrying the
//! caller identity and the authoritative timestamp, and validates phase
//! and integrity rules before touching state. A handler that returns an
//! error has changed nothing.

use energy_auction_types::{
    verify_reveal, AuctionRound, Bid, BidderId, Phase, SealedCommitment, SettlementResult,
    Timestamp,
};
use tracing::info;

use crate::call::{AuctionCall, CallOutcome};
use crate::config::CoordinatorConfig;
use crate::error::AuctionError;
use crate::payout::PendingPayout;
use crate::settlement;
use crate::state::CoordinatorState;

/// Context provided by the host for each call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Caller identity; the round starter becomes the seller.
    pub sender: BidderId,
    /// Authoritative current time. All phase checks use this value, never
    /// a clock read mid-handler.
    pub timestamp: Timestamp,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Dispatch a call message to its handler.
pub fn handle_call(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    config: &CoordinatorConfig,
    call: AuctionCall,
) -> HandlerResult<CallOutcome> {
    match call {
        AuctionCall::StartRound {
            energy_kwh,
            bidding_duration,
            reveal_duration,
            reserve_price,
        } => handle_start_round(
            state,
            ctx,
            energy_kwh,
            bidding_duration,
            reveal_duration,
            reserve_price,
        )
        .map(CallOutcome::RoundStarted),

        AuctionCall::SubmitBid {
            round_id,
            commitment,
            deposit,
        } => handle_submit_bid(state, ctx, config, round_id, commitment, deposit)
            .map(|_| CallOutcome::BidAccepted),

        AuctionCall::SubmitReveal {
            round_id,
            value,
            nonce,
        } => handle_submit_reveal(state, ctx, round_id, value, &nonce)
            .map(|_| CallOutcome::RevealAccepted),

        AuctionCall::CloseAuction { round_id } => {
            handle_close_auction(state, ctx, round_id).map(CallOutcome::Settled)
        }

        AuctionCall::ResetRound {
            bidding_duration,
            reveal_duration,
        } => handle_reset_round(state, ctx, bidding_duration, reveal_duration)
            .map(CallOutcome::RoundReset),
    }
}

/// Start a fresh round, moving the offered energy into escrow for its
/// duration.
///
/// Rejected while any unclosed round exists: a round past its reveal end
/// still holds deposits and must be closed, never silently abandoned.
pub fn handle_start_round(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    energy_kwh: u64,
    bidding_duration: u64,
    reveal_duration: u64,
    reserve_price: Option<u64>,
) -> HandlerResult<u64> {
    if energy_kwh == 0 {
        return Err(AuctionError::ZeroEnergy);
    }
    if bidding_duration == 0 || reveal_duration == 0 {
        return Err(AuctionError::InvalidTiming);
    }
    if let Some(round) = state.current_round() {
        if !round.closed {
            return Err(AuctionError::RoundActive);
        }
    }

    let round_id = state.allocate_round_id();
    let now = ctx.timestamp;
    let round = AuctionRound {
        round_id,
        seller: ctx.sender.clone(),
        energy_kwh,
        reserve_price: reserve_price.unwrap_or(0),
        bidding_start: now,
        bidding_end: now + bidding_duration,
        reveal_end: now + bidding_duration + reveal_duration,
        closed: false,
    };

    info!(
        round = round_id,
        seller = %ctx.sender,
        energy_kwh,
        bidding_end = round.bidding_end,
        reveal_end = round.reveal_end,
        "round started"
    );

    state.rounds.insert(round_id, round);
    state.current = Some(round_id);
    state.clear_ledger();

    Ok(round_id)
}

/// Record a sealed bid and take the deposit into escrow.
pub fn handle_submit_bid(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    config: &CoordinatorConfig,
    round_id: u64,
    commitment: SealedCommitment,
    deposit: u64,
) -> HandlerResult<()> {
    let round = state.current_round().ok_or(AuctionError::NoActiveRound)?;
    if round.round_id != round_id {
        return Err(AuctionError::RoundMismatch(round_id));
    }

    let phase = round.phase_at(ctx.timestamp);
    if phase != Phase::Bidding {
        return Err(AuctionError::WrongPhase {
            expected: Phase::Bidding,
            got: phase,
        });
    }

    if state.bids.contains_key(&ctx.sender) {
        return Err(AuctionError::DuplicateBid);
    }
    if deposit == 0 {
        return Err(AuctionError::ZeroDeposit);
    }
    if deposit < config.min_deposit {
        return Err(AuctionError::InsufficientDeposit {
            required: config.min_deposit,
            got: deposit,
        });
    }

    let bid = Bid {
        bidder: ctx.sender.clone(),
        commitment,
        deposit,
        submitted_at: ctx.timestamp,
        revealed_value: None,
    };

    state.bids.insert(ctx.sender.clone(), bid);
    state.bidder_order.push(ctx.sender.clone());
    state.add_escrow(ctx.sender.clone(), deposit);

    info!(round = round_id, bidder = %ctx.sender, deposit, "sealed bid recorded");

    Ok(())
}

/// Open a sealed bid by disclosing its `(value, nonce)` pair.
pub fn handle_submit_reveal(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    round_id: u64,
    value: u64,
    nonce: &str,
) -> HandlerResult<()> {
    let round = state.current_round().ok_or(AuctionError::NoActiveRound)?;
    if round.round_id != round_id {
        return Err(AuctionError::RoundMismatch(round_id));
    }

    let phase = round.phase_at(ctx.timestamp);
    if phase != Phase::Reveal {
        return Err(AuctionError::WrongPhase {
            expected: Phase::Reveal,
            got: phase,
        });
    }

    let bid = state
        .bids
        .get_mut(&ctx.sender)
        .ok_or(AuctionError::NoBidFound)?;
    if bid.revealed() {
        return Err(AuctionError::AlreadyRevealed);
    }
    if !verify_reveal(&bid.commitment, value, nonce) {
        return Err(AuctionError::CommitmentMismatch);
    }

    bid.revealed_value = Some(value);

    info!(round = round_id, bidder = %ctx.sender, value, "bid revealed");

    Ok(())
}

/// Settle the round: pick the winner, fix the clearing price, queue the
/// refunds, and mark the round closed exactly once.
pub fn handle_close_auction(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    round_id: u64,
) -> HandlerResult<SettlementResult> {
    let round = state.current_round().ok_or(AuctionError::NoActiveRound)?;
    if round.round_id != round_id {
        return Err(AuctionError::RoundMismatch(round_id));
    }
    if round.closed {
        return Err(AuctionError::AlreadyClosed);
    }

    let phase = round.phase_at(ctx.timestamp);
    if phase != Phase::AwaitingClose {
        return Err(AuctionError::WrongPhase {
            expected: Phase::AwaitingClose,
            got: phase,
        });
    }

    let result = settlement::settle(round, &state.bids_in_order(), ctx.timestamp)?;

    // Settlement succeeded; apply it. Deposits leave escrow here and are
    // owed back (or to the seller) through the payout queue.
    let deposits: Vec<(BidderId, u64)> = state
        .bids
        .values()
        .map(|bid| (bid.bidder.clone(), bid.deposit))
        .collect();
    for (bidder, deposit) in deposits {
        state.subtract_escrow(&bidder, deposit);
    }

    let now = ctx.timestamp;
    for payout in &result.payouts {
        state
            .pending_payouts
            .push(PendingPayout::new(round_id, payout.clone(), now));
    }

    if let Some(round) = state.current_round_mut() {
        round.closed = true;
    }
    state.results.insert(round_id, result.clone());

    info!(
        round = round_id,
        winner = result.winner.as_ref().map(|w| w.as_str()).unwrap_or("none"),
        clearing_price = result.clearing_price,
        num_revealed = result.num_revealed,
        "round settled"
    );

    Ok(result)
}

/// Re-arm the clock for the next round, carrying the closed round's lot
/// forward with an empty bid ledger.
pub fn handle_reset_round(
    state: &mut CoordinatorState,
    ctx: &CallContext,
    bidding_duration: u64,
    reveal_duration: u64,
) -> HandlerResult<u64> {
    if bidding_duration == 0 || reveal_duration == 0 {
        return Err(AuctionError::InvalidTiming);
    }

    let previous = state.current_round().ok_or(AuctionError::NoActiveRound)?;
    if !previous.closed {
        return Err(AuctionError::NotClosed);
    }
    let (seller, energy_kwh, reserve_price) = (
        previous.seller.clone(),
        previous.energy_kwh,
        previous.reserve_price,
    );

    let round_id = state.allocate_round_id();
    let now = ctx.timestamp;
    state.rounds.insert(
        round_id,
        AuctionRound {
            round_id,
            seller,
            energy_kwh,
            reserve_price,
            bidding_start: now,
            bidding_end: now + bidding_duration,
            reveal_end: now + bidding_duration + reveal_duration,
            closed: false,
        },
    );
    state.current = Some(round_id);
    state.clear_ledger();

    info!(round = round_id, requested_by = %ctx.sender, "round reset");

    Ok(round_id)
}
