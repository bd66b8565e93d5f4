//! Client SDK for bidding in sealed-bid energy auctions.
//!
//! This crate provides a high-level API for:
//! - Sealing bids with a secret nonce
//! - Waiting for a phase to open without busy-polling
//! - A CLI speaking the coordinator's JSON-RPC surface

pub mod bid;
pub mod wait;

pub use bid::{prepare_bid, BidBuilder, BidError, PreparedBid};
pub use wait::{wait_for_phase, StatusSnapshot, WaitOutcome};
