//! Exponential backoff with jitter between retry attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::RetryConfig;

/// Delay policy derived from a [`RetryConfig`]. A zero base means no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn none() -> Self {
        Self { base_ms: 0, max_ms: 0 }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms.max(config.base_delay_ms),
        }
    }

    pub fn is_none(&self) -> bool {
        self.base_ms == 0
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.is_none() {
            return Duration::ZERO;
        }

        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let capped_delay = self.base_ms.saturating_mul(exponential_base).min(self.max_ms);

        // Up to 10% jitter on top of the capped delay.
        let jitter_range = capped_delay / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}
