//! Coordinator error types.

use energy_auction_types::Phase;
use thiserror::Error;

/// Errors returned by the auction coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("no active round")]
    NoActiveRound,

    #[error("round {0} is not the current round")]
    RoundMismatch(u64),

    #[error("a round is already active")]
    RoundActive,

    #[error("wrong phase: expected {expected}, got {got}")]
    WrongPhase { expected: Phase, got: Phase },

    #[error("bidder has already placed a bid this round")]
    DuplicateBid,

    #[error("deposit must be positive")]
    ZeroDeposit,

    #[error("energy amount must be positive")]
    ZeroEnergy,

    #[error("invalid timing configuration")]
    InvalidTiming,

    #[error("no sealed bid found for bidder")]
    NoBidFound,

    #[error("reveal does not match the sealed commitment")]
    CommitmentMismatch,

    #[error("bid already revealed")]
    AlreadyRevealed,

    #[error("auction already closed")]
    AlreadyClosed,

    #[error("round must be closed before reset")]
    NotClosed,

    #[error("insufficient deposit: need {required}, got {got}")]
    InsufficientDeposit { required: u64, got: u64 },

    #[error("result not available for round {0}")]
    ResultNotAvailable(u64),

    #[error("persisted state unreadable: {0}")]
    Storage(String),
}

/// Coarse classification used by callers to pick a recovery strategy.
///
/// Everything except `TransientInfra` and `Fatal` is a caller error and is
/// never retried by the coordinator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operation arrived outside its valid phase; wait and retry.
    PhaseViolation,
    /// Commitment or reveal bookkeeping rejected the call; do not retry.
    IntegrityViolation,
    /// Round lifecycle rule violated (double close, reset before close).
    StateViolation,
    /// Amounts out of range for the operation.
    ResourceViolation,
    /// Infrastructure hiccup; retry with backoff.
    TransientInfra,
    /// Persisted state corrupt; halt and alert, never guess.
    Fatal,
}

impl AuctionError {
    pub fn class(&self) -> ErrorClass {
        use AuctionError::*;
        match self {
            NoActiveRound | WrongPhase { .. } => ErrorClass::PhaseViolation,
            DuplicateBid | NoBidFound | CommitmentMismatch | AlreadyRevealed => {
                ErrorClass::IntegrityViolation
            }
            RoundMismatch(_) | RoundActive | AlreadyClosed | NotClosed => {
                ErrorClass::StateViolation
            }
            ZeroDeposit | ZeroEnergy | InvalidTiming | InsufficientDeposit { .. }
            | ResultNotAvailable(_) => ErrorClass::ResourceViolation,
            Storage(_) => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_cover_the_taxonomy() {
        assert_eq!(AuctionError::NoActiveRound.class(), ErrorClass::PhaseViolation);
        assert_eq!(
            AuctionError::WrongPhase {
                expected: Phase::Bidding,
                got: Phase::Reveal
            }
            .class(),
            ErrorClass::PhaseViolation
        );
        assert_eq!(
            AuctionError::CommitmentMismatch.class(),
            ErrorClass::IntegrityViolation
        );
        assert_eq!(AuctionError::AlreadyClosed.class(), ErrorClass::StateViolation);
        assert_eq!(
            AuctionError::InsufficientDeposit { required: 10, got: 5 }.class(),
            ErrorClass::ResourceViolation
        );
        assert_eq!(
            AuctionError::Storage("bad".into()).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn messages_are_specific() {
        let err = AuctionError::WrongPhase {
            expected: Phase::Bidding,
            got: Phase::AwaitingClose,
        };
        assert_eq!(
            err.to_string(),
            "wrong phase: expected bidding, got awaiting_close"
        );
    }
}
