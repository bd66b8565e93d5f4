//! Sealed-bid commitment scheme.
//!
//! A bidder seals `(value, nonce)` into a SHA-256 hash during bidding and
//! discloses the pair during reveal. The preimage encoding is canonical:
//! a domain tag, the fixed-width value, and the length-prefixed nonce, so
//! no two distinct `(value, nonce)` pairs produce the same byte string.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const DOMAIN_TAG: &[u8] = b"SEALED_BID_V1:";

/// A sealed bid commitment (32-byte SHA-256 digest).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealedCommitment(pub [u8; 32]);

/// Errors from parsing a hex-encoded commitment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitmentParseError {
    #[error("commitment must be 64 hex characters, got {0}")]
    WrongLength(usize),

    #[error("invalid hex encoding")]
    InvalidHex,
}

impl SealedCommitment {
    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CommitmentParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(CommitmentParseError::WrongLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|_| CommitmentParseError::InvalidHex)?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Self(digest))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for SealedCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for SealedCommitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealedCommitment({})", self.to_hex())
    }
}

/// Seal a bid value with a bidder-chosen nonce.
pub fn seal_bid(value: u64, nonce: &str) -> SealedCommitment {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(value.to_le_bytes());
    hasher.update((nonce.len() as u64).to_le_bytes());
    hasher.update(nonce.as_bytes());
    SealedCommitment(hasher.finalize().into())
}

/// Check a revealed `(value, nonce)` pair against a stored commitment.
pub fn verify_reveal(commitment: &SealedCommitment, value: u64, nonce: &str) -> bool {
    seal_bid(value, nonce) == *commitment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_is_deterministic() {
        assert_eq!(seal_bid(50, "random123"), seal_bid(50, "random123"));
    }

    #[test]
    fn seal_differs_by_value_and_nonce() {
        let base = seal_bid(50, "random123");
        assert_ne!(base, seal_bid(51, "random123"));
        assert_ne!(base, seal_bid(50, "random124"));
    }

    #[test]
    fn encoding_is_unambiguous() {
        // Without the length prefix these two would share a preimage
        // suffix; with it they must not collide.
        let a = seal_bid(1, "23");
        let b = seal_bid(1, "2");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_matching_pair_only() {
        let c = seal_bid(75, "secure456");
        assert!(verify_reveal(&c, 75, "secure456"));
        assert!(!verify_reveal(&c, 76, "secure456"));
        assert!(!verify_reveal(&c, 75, "secure457"));
    }

    #[test]
    fn hex_round_trip() {
        let c = seal_bid(9, "n");
        let parsed = SealedCommitment::from_hex(&c.to_hex()).unwrap();
        assert_eq!(parsed, c);

        let prefixed = SealedCommitment::from_hex(&format!("0x{}", c.to_hex())).unwrap();
        assert_eq!(prefixed, c);
    }

    #[test]
    fn hex_rejects_bad_input() {
        assert_eq!(
            SealedCommitment::from_hex("abcd"),
            Err(CommitmentParseError::WrongLength(4))
        );
        assert_eq!(
            SealedCommitment::from_hex(&"zz".repeat(32)),
            Err(CommitmentParseError::InvalidHex)
        );
    }
}
