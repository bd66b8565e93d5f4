//! Coordinator state: the round registry, the bid ledger for the current
//! round, settlement results, and escrowed deposits.
//!
//! This is the single shared mutable aggregate of the system. Callers wrap
//! it in one exclusive lock; everything in this module assumes it is
//! reached through that lock.

use std::collections::HashMap;

use energy_auction_types::{AuctionRound, Bid, BidderId, SettlementResult};
use serde::{Deserialize, Serialize};

use crate::payout::PendingPayout;

/// Durable coordinator state. Everything in here survives a restart via
/// the snapshot store; losing it mid-round would strand deposits or allow
/// double reveals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorState {
    /// Next round ID to assign.
    pub next_round_id: u64,

    /// All rounds ever started, by ID. Closed rounds stay queryable.
    pub rounds: HashMap<u64, AuctionRound>,

    /// ID of the round bids and reveals apply to, if any.
    pub current: Option<u64>,

    /// Sealed bids for the current round, keyed by bidder.
    pub bids: HashMap<BidderId, Bid>,

    /// Bidders in the order their bids were recorded. Settlement breaks
    /// ties in favor of the earliest entry.
    pub bidder_order: Vec<BidderId>,

    /// Settlement results by round ID.
    pub results: HashMap<u64, SettlementResult>,

    /// Deposits currently held, by bidder.
    pub escrow: HashMap<BidderId, u64>,

    /// Payouts owed but not yet delivered.
    pub pending_payouts: Vec<PendingPayout>,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self {
            next_round_id: 1,
            rounds: HashMap::new(),
            current: None,
            bids: HashMap::new(),
            bidder_order: Vec::new(),
            results: HashMap::new(),
            escrow: HashMap::new(),
            pending_payouts: Vec::new(),
        }
    }

    /// Get the next round ID and increment.
    pub fn allocate_round_id(&mut self) -> u64 {
        let id = self.next_round_id;
        self.next_round_id += 1;
        id
    }

    /// The round bids currently apply to.
    pub fn current_round(&self) -> Option<&AuctionRound> {
        self.current.and_then(|id| self.rounds.get(&id))
    }

    pub fn current_round_mut(&mut self) -> Option<&mut AuctionRound> {
        let id = self.current?;
        self.rounds.get_mut(&id)
    }

    /// Bids for the current round in recording order.
    pub fn bids_in_order(&self) -> Vec<&Bid> {
        self.bidder_order
            .iter()
            .filter_map(|bidder| self.bids.get(bidder))
            .collect()
    }

    /// Empty the bid ledger for a fresh round.
    pub fn clear_ledger(&mut self) {
        self.bids.clear();
        self.bidder_order.clear();
    }

    /// Get a bidder's escrow balance.
    pub fn get_escrow(&self, bidder: &BidderId) -> u64 {
        self.escrow.get(bidder).copied().unwrap_or(0)
    }

    /// Add to a bidder's escrow.
    pub fn add_escrow(&mut self, bidder: BidderId, amount: u64) {
        *self.escrow.entry(bidder).or_insert(0) += amount;
    }

    /// Subtract from a bidder's escrow. Returns false (and leaves the
    /// balance untouched) when the balance is insufficient.
    pub fn subtract_escrow(&mut self, bidder: &BidderId, amount: u64) -> bool {
        if let Some(balance) = self.escrow.get_mut(bidder) {
            if *balance >= amount {
                *balance -= amount;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_auction_types::seal_bid;

    #[test]
    fn allocate_round_id_increments() {
        let mut state = CoordinatorState::new();
        assert_eq!(state.allocate_round_id(), 1);
        assert_eq!(state.allocate_round_id(), 2);
        assert_eq!(state.allocate_round_id(), 3);
    }

    #[test]
    fn escrow_operations() {
        let mut state = CoordinatorState::new();
        let alice = BidderId::from("alice");

        assert_eq!(state.get_escrow(&alice), 0);

        state.add_escrow(alice.clone(), 100);
        assert_eq!(state.get_escrow(&alice), 100);

        state.add_escrow(alice.clone(), 50);
        assert_eq!(state.get_escrow(&alice), 150);

        assert!(state.subtract_escrow(&alice, 75));
        assert_eq!(state.get_escrow(&alice), 75);

        assert!(!state.subtract_escrow(&alice, 100));
        assert_eq!(state.get_escrow(&alice), 75);
    }

    #[test]
    fn bids_in_order_follows_recording_order() {
        let mut state = CoordinatorState::new();
        for (name, value) in [("carol", 15), ("alice", 10), ("bob", 7)] {
            let bidder = BidderId::from(name);
            state.bids.insert(
                bidder.clone(),
                Bid {
                    bidder: bidder.clone(),
                    commitment: seal_bid(value, name),
                    deposit: value,
                    submitted_at: 0,
                    revealed_value: None,
                },
            );
            state.bidder_order.push(bidder);
        }

        let order: Vec<&str> = state
            .bids_in_order()
            .iter()
            .map(|b| b.bidder.as_str())
            .collect();
        assert_eq!(order, vec!["carol", "alice", "bob"]);
    }
}
