//! Snapshot persistence for coordinator state.
//!
//! The whole aggregate is small (one round, its bids, results, escrow,
//! payout queue), so durability is a single JSON snapshot written after
//! every successful mutation rather than a keyed store.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::AuctionError;
use crate::state::CoordinatorState;

/// Persistence port for the coordinator aggregate.
pub trait SnapshotStore: Send + Sync {
    /// Persist the current state.
    fn persist(&self, state: &CoordinatorState) -> Result<(), AuctionError>;

    /// Load the last persisted state, or `None` when nothing was saved.
    ///
    /// An unreadable snapshot is a fatal error: callers must halt rather
    /// than start from guessed state.
    fn load(&self) -> Result<Option<CoordinatorState>, AuctionError>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn persist(&self, state: &CoordinatorState) -> Result<(), AuctionError> {
        let json = serde_json::to_string(state)
            .map_err(|e| AuctionError::Storage(e.to_string()))?;
        *self.slot.lock().unwrap() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<CoordinatorState>, AuctionError> {
        self.slot
            .lock()
            .unwrap()
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| AuctionError::Storage(e.to_string()))
    }
}

/// JSON file store. Writes go to a temporary sibling first and are
/// renamed into place, so a crash mid-write never leaves a torn snapshot.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for FileStore {
    fn persist(&self, state: &CoordinatorState) -> Result<(), AuctionError> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| AuctionError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json).map_err(|e| AuctionError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| AuctionError::Storage(e.to_string()))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<CoordinatorState>, AuctionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|e| AuctionError::Storage(e.to_string()))?;
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| AuctionError::Storage(format!("{}: {e}", self.path.display())))?;
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::handlers::{handle_start_round, handle_submit_bid, CallContext};
    use energy_auction_types::{seal_bid, BidderId};

    fn sample_state() -> CoordinatorState {
        let mut state = CoordinatorState::new();
        let config = CoordinatorConfig::default();
        let ctx = CallContext {
            sender: BidderId::from("seller"),
            timestamp: 100,
        };
        let round_id = handle_start_round(&mut state, &ctx, 5, 100, 100, None).unwrap();
        let bid_ctx = CallContext {
            sender: BidderId::from("alice"),
            timestamp: 150,
        };
        handle_submit_bid(
            &mut state,
            &bid_ctx,
            &config,
            round_id,
            seal_bid(50, "nonce"),
            50,
        )
        .unwrap();
        state
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let state = sample_state();
        store.persist(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.current, state.current);
        assert_eq!(loaded.bids.len(), 1);
        assert_eq!(loaded.get_escrow(&BidderId::from("alice")), 50);
    }

    #[test]
    fn file_store_round_trip_preserves_commitments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("auction.json"));
        assert!(store.load().unwrap().is_none());

        let state = sample_state();
        store.persist(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        let bid = &loaded.bids[&BidderId::from("alice")];
        // A reveal against the reloaded commitment still verifies.
        assert!(energy_auction_types::verify_reveal(&bid.commitment, 50, "nonce"));
    }

    #[test]
    fn file_store_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auction.json");
        let store = FileStore::new(&path);

        let state = sample_state();
        store.persist(&state).unwrap();
        store.persist(&state).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auction.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = FileStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, AuctionError::Storage(_)));
    }
}
