//! Sealed-bid (Vickrey) auction coordinator for peer-to-peer energy
//! trading.
//!
//! This crate implements the phased round state machine:
//!
//! - Round clock: bidding and reveal windows as absolute timestamps, with
//!   phase derived purely from time comparisons
//! - Bid ledger: sealed commitments with deposits, reveal verification
//! - Settlement: highest revealed value wins at the second-highest price,
//!   refunds queued per recipient, round closed exactly once
//!
//! # Architecture
//!
//! - `call`: message types for state-changing operations
//! - `handlers`: business logic for processing calls
//! - `settlement`: winner determination and payout computation
//! - `queries`: read-only state access
//! - `state`: the shared coordinator aggregate
//! - `payout`: funds-transfer port and retry queue
//! - `store`: snapshot persistence
//! - `config`: operating parameters
//! - `error`: error types and classification
//!
//! # Example
//!
//! ```
//! use energy_auction_coordinator::{handlers, CallContext, CoordinatorConfig, CoordinatorState};
//! use energy_auction_types::{seal_bid, BidderId};
//!
//! let mut state = CoordinatorState::new();
//! let config = CoordinatorConfig::default();
//!
//! let ctx = CallContext { sender: BidderId::from("seller"), timestamp: 1_000 };
//! let round_id = handlers::handle_start_round(&mut state, &ctx, 5, 300, 180, None)?;
//!
//! let ctx = CallContext { sender: BidderId::from("house1"), timestamp: 1_010 };
//! let commitment = seal_bid(50, "secret-nonce");
//! handlers::handle_submit_bid(&mut state, &ctx, &config, round_id, commitment, 50)?;
//! # Ok::<(), energy_auction_coordinator::AuctionError>(())
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod handlers;
pub mod payout;
pub mod queries;
pub mod settlement;
pub mod state;
pub mod store;

pub use call::{AuctionCall, CallOutcome};
pub use config::{ConfigValidationError, CoordinatorConfig};
pub use error::{AuctionError, ErrorClass};
pub use handlers::{CallContext, HandlerResult};
pub use payout::{flush_payouts, FundsTransfer, PendingPayout, PayoutStatus, TransferError};
pub use queries::{handle_query, round_status, AuctionQuery, AuctionQueryResponse, RoundStatus};
pub use state::CoordinatorState;
pub use store::{FileStore, MemoryStore, SnapshotStore};
