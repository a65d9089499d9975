//! Retry policies and backoff timing.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How the wait between attempts grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Constant interval.
    #[default]
    None,
    /// `interval * 2^(attempt - 1)`.
    Exponential,
}

/// Retry settings of one handler.
///
/// A failed attempt is retried while `attempt <= retry_count`, so a count
/// of `n` allows `n + 1` attempts before the handler runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub interval: Duration,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Run the handler on the first failure.
    pub const NONE: RetryPolicy = RetryPolicy {
        retry_count: 0,
        interval: Duration::ZERO,
        backoff: BackoffStrategy::None,
    };

    pub fn new(retry_count: u32, interval: Duration, backoff: BackoffStrategy) -> Self {
        RetryPolicy {
            retry_count,
            interval,
            backoff,
        }
    }

    /// Wait before retrying after failed attempt `attempt` (1-based).
    /// Saturates instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::None => self.interval,
            BackoffStrategy::Exponential => {
                let factor = 1_u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                self.interval.saturating_mul(factor)
            }
        }
    }

    /// Total attempts allowed, the first one included.
    #[inline]
    pub fn attempt_limit(&self) -> u64 {
        u64::from(self.retry_count) + 1
    }
}

/// Busy-wait for `delay` on the monotonic clock. Blocks the calling thread.
pub fn spin_wait(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let start = Instant::now();
    while start.elapsed() < delay {
        std::hint::spin_loop();
    }
}
