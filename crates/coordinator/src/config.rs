//! Coordinator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Operating parameters for the coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bidding window length used when a start/reset call does not supply
    /// one, in seconds.
    pub default_bidding_duration: u64,

    /// Reveal window length used when a start/reset call does not supply
    /// one, in seconds.
    pub default_reveal_duration: u64,

    /// Smallest deposit accepted with a sealed bid.
    pub min_deposit: u64,

    /// Delivery attempts per payout before it is flagged for manual
    /// resolution.
    pub payout_max_attempts: u32,

    /// Base delay between payout delivery attempts, in seconds. Doubles
    /// on every retry.
    pub payout_retry_backoff_secs: u64,

    /// Where to persist state snapshots. `None` keeps state in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_bidding_duration: 300,
            default_reveal_duration: 180,
            min_deposit: 1,
            payout_max_attempts: 5,
            payout_retry_backoff_secs: 2,
            snapshot_path: None,
        }
    }
}

impl CoordinatorConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_bidding_duration == 0 {
            return Err(ConfigValidationError::ZeroDuration("bidding"));
        }
        if self.default_reveal_duration == 0 {
            return Err(ConfigValidationError::ZeroDuration("reveal"));
        }
        if self.min_deposit == 0 {
            return Err(ConfigValidationError::ZeroMinDeposit);
        }
        if self.payout_max_attempts == 0 {
            return Err(ConfigValidationError::ZeroPayoutAttempts);
        }
        Ok(())
    }
}

/// Errors from validating a coordinator configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{0} duration cannot be zero")]
    ZeroDuration(&'static str),

    #[error("minimum deposit cannot be zero")]
    ZeroMinDeposit,

    #[error("payout attempt budget cannot be zero")]
    ZeroPayoutAttempts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CoordinatorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_durations_rejected() {
        let mut config = CoordinatorConfig::default();
        config.default_bidding_duration = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::ZeroDuration("bidding"))
        ));

        let mut config = CoordinatorConfig::default();
        config.default_reveal_duration = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::ZeroDuration("reveal"))
        ));
    }

    #[test]
    fn zero_payout_attempts_rejected() {
        let mut config = CoordinatorConfig::default();
        config.payout_max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::ZeroPayoutAttempts)
        ));
    }
}
