//! End-to-end integration tests for the sealed-bid energy auction.
//!
//! These tests exercise the full round lifecycle:
//! 1. Round start
//! 2. Sealed bid submission with deposits
//! 3. Reveal with commitment verification
//! 4. Settlement at the second price
//! 5. Payout delivery and reset for the next round

use energy_auction_client::BidBuilder;
use energy_auction_coordinator::{
    flush_payouts, handlers, payout::MockTransfer, AuctionError, CallContext, CoordinatorConfig,
    CoordinatorState, FileStore, PayoutStatus, SnapshotStore, TransferError,
};
use energy_auction_types::{seal_bid, BidderId, PayoutKind, Phase, Timestamp};

fn ctx(sender: &str, timestamp: Timestamp) -> CallContext {
    CallContext {
        sender: BidderId::from(sender),
        timestamp,
    }
}

/// Start a round at t=1000 with 100s bidding and 100s reveal windows.
fn start_standard_round(state: &mut CoordinatorState) -> u64 {
    handlers::handle_start_round(state, &ctx("seller", 1_000), 5, 100, 100, None).unwrap()
}

fn submit(
    state: &mut CoordinatorState,
    config: &CoordinatorConfig,
    round_id: u64,
    name: &str,
    value: u64,
    nonce: &str,
    at: Timestamp,
) {
    handlers::handle_submit_bid(
        state,
        &ctx(name, at),
        config,
        round_id,
        seal_bid(value, nonce),
        value,
    )
    .unwrap();
}

fn reveal(
    state: &mut CoordinatorState,
    round_id: u64,
    name: &str,
    value: u64,
    nonce: &str,
    at: Timestamp,
) {
    handlers::handle_submit_reveal(state, &ctx(name, at), round_id, value, nonce).unwrap();
}

/// The complete happy path: four bidders, full reveal, Vickrey
/// settlement, payout delivery, reset, and a second round.
#[test]
fn test_full_auction_lifecycle() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();
    let transfer = MockTransfer::new();

    // ========================================
    // Phase 1: Round start
    // ========================================

    let round_id = start_standard_round(&mut state);
    let round = state.current_round().unwrap();
    assert!(round.bidding_start < round.bidding_end);
    assert!(round.bidding_end < round.reveal_end);
    assert_eq!(round.phase_at(1_050), Phase::Bidding);

    // ========================================
    // Phase 2: Sealed bids (prepared the way a bidder agent would)
    // ========================================

    let mut rng = rand::rngs::OsRng;
    let bids: Vec<_> = [("house-a", 10u64), ("house-b", 7), ("house-c", 15), ("house-d", 3)]
        .into_iter()
        .map(|(name, value)| {
            let prepared = BidBuilder::new(value).build(&mut rng).unwrap();
            handlers::handle_submit_bid(
                &mut state,
                &ctx(name, 1_050),
                &config,
                round_id,
                prepared.commitment,
                prepared.deposit,
            )
            .unwrap();
            (name, prepared)
        })
        .collect();

    assert_eq!(state.bidder_order.len(), 4);
    assert_eq!(state.get_escrow(&BidderId::from("house-c")), 15);

    // ========================================
    // Phase 3: Reveals
    // ========================================

    for (name, prepared) in &bids {
        handlers::handle_submit_reveal(
            &mut state,
            &ctx(name, 1_150),
            round_id,
            prepared.value,
            &prepared.nonce,
        )
        .unwrap();
    }

    // ========================================
    // Phase 4: Settlement
    // ========================================

    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();

    assert_eq!(result.winner, Some(BidderId::from("house-c")));
    assert_eq!(result.clearing_price, 10);
    assert_eq!(result.energy_kwh, 5);
    assert_eq!(result.num_revealed, 4);

    let winner_refund = result
        .payouts
        .iter()
        .find(|p| p.recipient.as_str() == "house-c")
        .unwrap();
    assert_eq!(winner_refund.kind, PayoutKind::WinnerRefund);
    assert_eq!(winner_refund.amount, 5);

    // ========================================
    // Phase 5: Payout delivery
    // ========================================

    let summary = flush_payouts(&mut state, &transfer, 1_201, &config);
    assert_eq!(summary.delivered, result.payouts.len());
    assert_eq!(transfer.total_delivered_to(&BidderId::from("house-a")), 10);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("house-b")), 7);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("house-d")), 3);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("house-c")), 5);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("seller")), 10);

    // ========================================
    // Phase 6: Reset and run again
    // ========================================

    let next_id = handlers::handle_reset_round(&mut state, &ctx("seller", 2_000), 50, 50).unwrap();
    assert_ne!(next_id, round_id);
    assert!(state.bids.is_empty());

    submit(&mut state, &config, next_id, "house-a", 20, "na2", 2_010);
    reveal(&mut state, next_id, "house-a", 20, "na2", 2_060);
    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 2_101), next_id).unwrap();
    assert_eq!(result.winner, Some(BidderId::from("house-a")));

    // First round's result is still there, unchanged.
    assert_eq!(state.results[&round_id].clearing_price, 10);
}

#[test]
fn test_tie_breaks_to_first_recorded_bidder() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();
    let round_id = start_standard_round(&mut state);

    submit(&mut state, &config, round_id, "alice", 15, "na", 1_010);
    submit(&mut state, &config, round_id, "bob", 15, "nb", 1_020);
    submit(&mut state, &config, round_id, "carol", 7, "nc", 1_030);

    reveal(&mut state, round_id, "bob", 15, "nb", 1_150);
    reveal(&mut state, round_id, "alice", 15, "na", 1_160);
    reveal(&mut state, round_id, "carol", 7, "nc", 1_170);

    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();

    // Alice bid first; reveal order must not matter.
    assert_eq!(result.winner, Some(BidderId::from("alice")));
    assert_eq!(result.clearing_price, 15);
}

#[test]
fn test_no_reveals_ends_with_no_winner_and_full_refunds() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();
    let transfer = MockTransfer::new();
    let round_id = start_standard_round(&mut state);

    submit(&mut state, &config, round_id, "alice", 10, "na", 1_010);
    submit(&mut state, &config, round_id, "bob", 8, "nb", 1_020);

    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();

    assert_eq!(result.winner, None);
    assert_eq!(result.clearing_price, 0);
    assert!(result.forfeited.is_empty());

    flush_payouts(&mut state, &transfer, 1_201, &config);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("alice")), 10);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("bob")), 8);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("seller")), 0);
}

#[test]
fn test_single_revealer_pays_the_reserve() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();

    let round_id =
        handlers::handle_start_round(&mut state, &ctx("seller", 1_000), 5, 100, 100, Some(40))
            .unwrap();

    submit(&mut state, &config, round_id, "alice", 60, "na", 1_010);
    submit(&mut state, &config, round_id, "bob", 50, "nb", 1_020);
    reveal(&mut state, round_id, "alice", 60, "na", 1_150);

    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();

    assert_eq!(result.winner, Some(BidderId::from("alice")));
    assert_eq!(result.clearing_price, 40);

    // Bob sealed but never revealed: deposit forfeited to the seller.
    assert_eq!(result.forfeited, vec![(BidderId::from("bob"), 50)]);
    let seller_proceeds = result
        .payouts
        .iter()
        .find(|p| p.kind == PayoutKind::SellerProceeds)
        .unwrap();
    assert_eq!(seller_proceeds.amount, 40 + 50);
}

#[test]
fn test_phase_enforcement_across_the_lifecycle() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();
    let round_id = start_standard_round(&mut state);
    let commitment = seal_bid(10, "n");

    // Bid after the bidding window.
    let late_bid = handlers::handle_submit_bid(
        &mut state,
        &ctx("alice", 1_100),
        &config,
        round_id,
        commitment,
        10,
    );
    assert!(matches!(
        late_bid,
        Err(AuctionError::WrongPhase {
            expected: Phase::Bidding,
            ..
        })
    ));

    submit(&mut state, &config, round_id, "alice", 10, "n", 1_050);

    // Reveal during bidding.
    let early_reveal =
        handlers::handle_submit_reveal(&mut state, &ctx("alice", 1_050), round_id, 10, "n");
    assert!(matches!(
        early_reveal,
        Err(AuctionError::WrongPhase {
            expected: Phase::Reveal,
            ..
        })
    ));

    // Close during reveal.
    let early_close = handlers::handle_close_auction(&mut state, &ctx("seller", 1_200), round_id);
    assert!(matches!(
        early_close,
        Err(AuctionError::WrongPhase {
            expected: Phase::AwaitingClose,
            ..
        })
    ));

    // Reveal after the reveal window.
    let late_reveal =
        handlers::handle_submit_reveal(&mut state, &ctx("alice", 1_300), round_id, 10, "n");
    assert!(matches!(
        late_reveal,
        Err(AuctionError::WrongPhase {
            expected: Phase::Reveal,
            ..
        })
    ));
}

#[test]
fn test_double_close_rejected_and_result_stable() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig::default();
    let round_id = start_standard_round(&mut state);

    submit(&mut state, &config, round_id, "alice", 10, "na", 1_010);
    reveal(&mut state, round_id, "alice", 10, "na", 1_150);

    let first =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();
    let queued = state.pending_payouts.len();

    let second = handlers::handle_close_auction(&mut state, &ctx("seller", 1_300), round_id);
    assert_eq!(second, Err(AuctionError::AlreadyClosed));

    // Identical result on every query, nothing re-queued.
    let stored = &state.results[&round_id];
    assert_eq!(stored.winner, first.winner);
    assert_eq!(stored.clearing_price, first.clearing_price);
    assert_eq!(stored.settled_at, first.settled_at);
    assert_eq!(state.pending_payouts.len(), queued);
}

#[test]
fn test_competing_starts_resolve_to_one_round() {
    let mut state = CoordinatorState::new();

    let first = handlers::handle_start_round(&mut state, &ctx("seller-1", 1_000), 5, 100, 100, None);
    let second =
        handlers::handle_start_round(&mut state, &ctx("seller-2", 1_000), 7, 100, 100, None);

    assert!(first.is_ok());
    assert_eq!(second, Err(AuctionError::RoundActive));
    assert_eq!(
        state.current_round().unwrap().seller,
        BidderId::from("seller-1")
    );
}

/// Restarting mid-round from a snapshot must preserve commitments,
/// deposits, and reveal flags; otherwise deposits strand or reveals can
/// be replayed.
#[test]
fn test_snapshot_restart_mid_round() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("auction.json"));
    let config = CoordinatorConfig::default();

    let round_id;
    {
        let mut state = CoordinatorState::new();
        round_id = start_standard_round(&mut state);
        submit(&mut state, &config, round_id, "alice", 10, "na", 1_010);
        submit(&mut state, &config, round_id, "bob", 12, "nb", 1_020);
        reveal(&mut state, round_id, "alice", 10, "na", 1_150);
        store.persist(&state).unwrap();
    }

    // "Restart": load from disk and keep going.
    let mut state = store.load().unwrap().unwrap();
    assert_eq!(state.current, Some(round_id));
    assert_eq!(state.get_escrow(&BidderId::from("bob")), 12);

    // Alice cannot re-reveal after the restart.
    let replay = handlers::handle_submit_reveal(&mut state, &ctx("alice", 1_160), round_id, 10, "na");
    assert_eq!(replay, Err(AuctionError::AlreadyRevealed));

    // Bob's persisted commitment still verifies.
    reveal(&mut state, round_id, "bob", 12, "nb", 1_170);

    let result =
        handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();
    assert_eq!(result.winner, Some(BidderId::from("bob")));
    assert_eq!(result.clearing_price, 10);
}

#[test]
fn test_failing_payout_does_not_block_others() {
    let mut state = CoordinatorState::new();
    let config = CoordinatorConfig {
        payout_max_attempts: 2,
        ..Default::default()
    };
    let transfer = MockTransfer::new();
    let round_id = start_standard_round(&mut state);

    submit(&mut state, &config, round_id, "alice", 10, "na", 1_010);
    submit(&mut state, &config, round_id, "bob", 12, "nb", 1_020);
    reveal(&mut state, round_id, "alice", 10, "na", 1_150);
    reveal(&mut state, round_id, "bob", 12, "nb", 1_150);

    handlers::handle_close_auction(&mut state, &ctx("seller", 1_201), round_id).unwrap();

    transfer.fail_for(BidderId::from("alice"), TransferError::transient("offline"));

    let mut now = 1_201;
    for _ in 0..2 {
        flush_payouts(&mut state, &transfer, now, &config);
        now += 60;
    }

    let alice_entry = state
        .pending_payouts
        .iter()
        .find(|p| p.payout.recipient.as_str() == "alice")
        .unwrap();
    assert_eq!(alice_entry.status, PayoutStatus::Abandoned);

    // Everyone else was paid: bob won at 10, refund 2; seller got 10.
    assert_eq!(transfer.total_delivered_to(&BidderId::from("bob")), 2);
    assert_eq!(transfer.total_delivered_to(&BidderId::from("seller")), 10);
}
