//! Remote-call subsystems used by the pipeline: similarity search, fingerprint
//! persistence and comment posting.

pub mod comment;
pub mod fingerprint;
pub mod search;

use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};

/// Bounded exponential backoff shared by the database-backed subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &dupradar_core::config::DatabaseConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.retry_delay_ms,
        }
    }

    /// No retries: a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Delays between attempts; yields `max_attempts - 1` items.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.base_delay_ms.max(1))
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_yields_one_delay_per_retry() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 10,
        };
        assert_eq!(policy.strategy().count(), 3);
        assert_eq!(RetryPolicy::none().strategy().count(), 0);
    }

    #[test]
    fn test_delays_are_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1_000,
        };
        assert!(policy.strategy().all(|d| d <= Duration::from_secs(5)));
    }
}
