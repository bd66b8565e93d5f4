//! Sealed bid preparation.

use energy_auction_types::{seal_bid, SealedCommitment};
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;

/// Length of a generated nonce, in characters.
const NONCE_LEN: usize = 24;

/// Errors that can occur during bid preparation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidError {
    #[error("bid value must be positive")]
    ZeroValue,

    #[error("deposit {deposit} is below the bid value {value}")]
    DepositBelowValue { deposit: u64, value: u64 },
}

/// A sealed bid ready for submission.
///
/// The `value` and `nonce` stay with the bidder until the reveal window;
/// only the commitment and deposit go to the coordinator.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    pub commitment: SealedCommitment,
    /// The bid amount (keep secret until reveal).
    pub value: u64,
    /// The sealing nonce (keep secret until reveal).
    pub nonce: String,
    /// Deposit submitted alongside the commitment.
    pub deposit: u64,
}

/// Seal a bid, generating a random nonce.
///
/// The deposit defaults to the bid value, which guarantees it covers any
/// clearing price the bid can win at.
pub fn prepare_bid<R: Rng>(value: u64, rng: &mut R) -> Result<PreparedBid, BidError> {
    BidBuilder::new(value).build(rng)
}

/// Builder for sealed bids with explicit deposit or nonce choices.
pub struct BidBuilder {
    value: u64,
    deposit: Option<u64>,
    nonce: Option<String>,
}

impl BidBuilder {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            deposit: None,
            nonce: None,
        }
    }

    /// Override the deposit. Must be at least the bid value: a smaller
    /// deposit could leave the winner unable to cover the clearing price,
    /// which blocks settlement for everyone.
    pub fn deposit(mut self, deposit: u64) -> Self {
        self.deposit = Some(deposit);
        self
    }

    /// Supply a nonce instead of generating one.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn build<R: Rng>(self, rng: &mut R) -> Result<PreparedBid, BidError> {
        if self.value == 0 {
            return Err(BidError::ZeroValue);
        }
        let deposit = self.deposit.unwrap_or(self.value);
        if deposit < self.value {
            return Err(BidError::DepositBelowValue {
                deposit,
                value: self.value,
            });
        }

        let nonce = self.nonce.unwrap_or_else(|| {
            (0..NONCE_LEN)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect()
        });

        Ok(PreparedBid {
            commitment: seal_bid(self.value, &nonce),
            value: self.value,
            nonce,
            deposit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_auction_types::verify_reveal;
    use rand::rngs::OsRng;

    #[test]
    fn prepared_bid_verifies_against_its_commitment() {
        let mut rng = OsRng;
        let bid = prepare_bid(50, &mut rng).unwrap();

        assert_eq!(bid.value, 50);
        assert_eq!(bid.deposit, 50);
        assert_eq!(bid.nonce.len(), NONCE_LEN);
        assert!(verify_reveal(&bid.commitment, bid.value, &bid.nonce));
    }

    #[test]
    fn generated_nonces_differ() {
        let mut rng = OsRng;
        let a = prepare_bid(50, &mut rng).unwrap();
        let b = prepare_bid(50, &mut rng).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn builder_honors_explicit_nonce_and_deposit() {
        let mut rng = OsRng;
        let bid = BidBuilder::new(75)
            .nonce("secure456")
            .deposit(100)
            .build(&mut rng)
            .unwrap();

        assert_eq!(bid.deposit, 100);
        assert_eq!(bid.commitment, energy_auction_types::seal_bid(75, "secure456"));
    }

    #[test]
    fn builder_rejects_bad_amounts() {
        let mut rng = OsRng;
        assert_eq!(
            BidBuilder::new(0).build(&mut rng).unwrap_err(),
            BidError::ZeroValue
        );
        assert_eq!(
            BidBuilder::new(50).deposit(10).build(&mut rng).unwrap_err(),
            BidError::DepositBelowValue {
                deposit: 10,
                value: 50
            }
        );
    }
}
