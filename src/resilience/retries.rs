//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke a failing call up to `max_attempts` times in total
//! - Stop at the first success, or at the first error the caller marks as not retryable
//! - Propagate the last failure once attempts are exhausted
//! - Optionally wait (exponential backoff + jitter) between attempts
//!
//! # Design Decisions
//! - Attempts are strictly sequential and run on the caller's thread
//! - The attempt counter lives on the stack of a single `execute` call
//! - Cumulative outcome counters are atomics, so one retrier can be shared

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use serde::Serialize;

use crate::config::schema::RetryConfig;
use crate::config::validation::validate_retry;
use crate::error::ConfigError;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Cumulative outcomes of calls made through a [`Retrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryMetrics {
    pub successful_calls_without_retry: u64,
    pub successful_calls_with_retry: u64,
    pub failed_calls_without_retry: u64,
    pub failed_calls_with_retry: u64,
}

#[derive(Debug, Default)]
struct Counters {
    successful_without_retry: AtomicU64,
    successful_with_retry: AtomicU64,
    failed_without_retry: AtomicU64,
    failed_with_retry: AtomicU64,
}

/// How a single `execute` call ended.
#[derive(Debug, Clone, Copy)]
enum Finish {
    Succeeded { retried: bool },
    /// The error was rejected by the retry predicate, on any attempt.
    NotRetryable,
    /// Every attempt failed with a retryable error.
    Exhausted,
}

/// A named, bounded retry policy.
#[derive(Debug)]
pub struct Retrier {
    name: String,
    config: RetryConfig,
    backoff: Backoff,
    counters: Counters,
}

impl Retrier {
    /// Create a retrier, failing if the config is invalid.
    pub fn new(name: impl Into<String>, config: RetryConfig) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut errors = Vec::new();
        validate_retry(&format!("retries.{}", name), &config, &mut errors);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self::build(name, config))
    }

    pub fn with_default_config(name: impl Into<String>) -> Self {
        Self::build(name.into(), RetryConfig::default())
    }

    pub(crate) fn build(name: String, config: RetryConfig) -> Self {
        Self {
            backoff: Backoff::from_config(&config),
            name,
            config,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op`, retrying every error.
    pub fn execute<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.execute_with(op, |_| true)
    }

    /// Run `op`, retrying only errors for which `retry_on` returns true.
    pub fn execute_with<T, E, F, P>(&self, mut op: F, retry_on: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match op() {
                Ok(value) => {
                    self.finish(Finish::Succeeded { retried: attempt > 1 });
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !retry_on(&err) {
                tracing::debug!(retry = %self.name, attempt, "Error is not retryable");
                self.finish(Finish::NotRetryable);
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::warn!(retry = %self.name, attempts = attempt, "Retries exhausted");
                self.finish(Finish::Exhausted);
                return Err(err);
            }

            let delay = self.backoff.delay(attempt);
            tracing::debug!(retry = %self.name, attempt, delay_ms = delay.as_millis() as u64, "Attempt failed, retrying");
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            attempt += 1;
        }
    }

    pub fn metrics(&self) -> RetryMetrics {
        RetryMetrics {
            successful_calls_without_retry: self.counters.successful_without_retry.load(Ordering::Relaxed),
            successful_calls_with_retry: self.counters.successful_with_retry.load(Ordering::Relaxed),
            failed_calls_without_retry: self.counters.failed_without_retry.load(Ordering::Relaxed),
            failed_calls_with_retry: self.counters.failed_with_retry.load(Ordering::Relaxed),
        }
    }

    fn finish(&self, finish: Finish) {
        let (counter, kind) = match finish {
            Finish::Succeeded { retried: false } => (&self.counters.successful_without_retry, "successful_without_retry"),
            Finish::Succeeded { retried: true } => (&self.counters.successful_with_retry, "successful_with_retry"),
            Finish::NotRetryable => (&self.counters.failed_without_retry, "failed_without_retry"),
            Finish::Exhausted => (&self.counters.failed_with_retry, "failed_with_retry"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_retry_call(&self.name, kind);
    }
}
