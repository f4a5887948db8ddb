//! # Retry Logic and Backoff Strategies
//!
//! One retry policy shape shared by mutation delivery and the live channel
//! reconnector: a failure budget plus a delay strategy.
//!
//! ## Strategies
//!
//! - **Schedule**: explicit delays, the last one repeating as the cap
//!   (mutation delivery: 1s, 5s, 15s, 15s, ...)
//! - **Exponential**: a base delay doubling per attempt up to a cap
//!   (live channel: 1s, 2s, 4s, ... 30s)
//!
//! ## Usage
//!
//! ```rust
//! use fieldsync::offline::retry::RetryPolicy;
//! use fieldsync::shared::AppConfig;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::mutation_delivery(&AppConfig::default());
//! assert_eq!(policy.delay(1), Duration::from_secs(1));
//! assert!(policy.is_exhausted(3));
//! ```

use crate::shared::config::AppConfig;
use std::time::Duration;

/// How long to wait before the next attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Explicit delays; attempts past the end reuse the last entry
    Schedule(Vec<Duration>),
    /// `base * 2^(attempt - 1)`, capped at `max`
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound on any delay
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1);
        match self {
            Self::Schedule(delays) => delays
                .get(index as usize)
                .or_else(|| delays.last())
                .copied()
                .unwrap_or(Duration::ZERO),
            Self::Exponential { base, max } => {
                let factor = 1u32.checked_shl(index).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(*max)
            }
        }
    }
}

/// Failure budget plus backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures after which no further automatic attempt is made
    pub max_attempts: u32,
    /// Delay strategy between attempts
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, strategy: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            strategy,
        }
    }

    /// Policy for delivering queued mutations
    pub fn mutation_delivery(config: &AppConfig) -> Self {
        Self::new(
            config.max_retries,
            BackoffStrategy::Schedule(config.retry_delays.clone()),
        )
    }

    /// Policy for reconnecting the live channel
    pub fn reconnect(config: &AppConfig) -> Self {
        Self::new(
            config.reconnect_max_attempts,
            BackoffStrategy::Exponential {
                base: config.reconnect_base_delay,
                max: config.reconnect_max_delay,
            },
        )
    }

    /// Whether `failures` has used up the budget
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    /// Whether another attempt is allowed after `failures`
    pub fn should_retry(&self, failures: u32) -> bool {
        !self.is_exhausted(failures)
    }

    /// Delay to wait after `failures` failed attempts
    pub fn delay(&self, failures: u32) -> Duration {
        self.strategy.delay(failures)
    }
}
