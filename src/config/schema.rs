//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for circuit
//! breakers and retriers. All types derive Serde traits for deserialization
//! from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::{validate_circuit_breaker, validate_retry};
use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Config used for circuit breakers created on demand by name.
    pub circuit_breaker_defaults: CircuitBreakerConfig,

    /// Config used for retriers created on demand by name.
    pub retry_defaults: RetryConfig,

    /// Named circuit breaker instances.
    pub circuit_breakers: BTreeMap<String, CircuitBreakerConfig>,

    /// Named retry instances.
    pub retries: BTreeMap<String, RetryConfig>,
}

/// Circuit breaker configuration. Immutable once a breaker is built from it.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate in percent at or above which the circuit opens.
    pub failure_rate_threshold: f32,

    /// Window size (in calls) while CLOSED.
    pub ring_buffer_size_in_closed_state: usize,

    /// Window size (in calls) of the HALF_OPEN trial.
    pub ring_buffer_size_in_half_open_state: usize,

    /// Time spent OPEN before a trial is allowed, in milliseconds.
    pub wait_duration_in_open_state_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            ring_buffer_size_in_closed_state: 100,
            ring_buffer_size_in_half_open_state: 10,
            wait_duration_in_open_state_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Start a builder from the defaults.
    pub fn custom() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn wait_duration_in_open_state(&self) -> Duration {
        Duration::from_millis(self.wait_duration_in_open_state_ms)
    }
}

/// Builder for [`CircuitBreakerConfig`]; validation happens in `build`.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn failure_rate_threshold(mut self, threshold: f32) -> Self {
        self.config.failure_rate_threshold = threshold;
        self
    }

    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        self.config.ring_buffer_size_in_closed_state = size;
        self
    }

    pub fn ring_buffer_size_in_half_open_state(mut self, size: usize) -> Self {
        self.config.ring_buffer_size_in_half_open_state = size;
        self
    }

    pub fn wait_duration_in_open_state(mut self, wait: Duration) -> Self {
        self.config.wait_duration_in_open_state_ms = wait.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        let mut errors = Vec::new();
        validate_circuit_breaker("circuit_breaker", &self.config, &mut errors);
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds (0 disables waiting).
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl RetryConfig {
    /// Start a builder from the defaults.
    pub fn custom() -> RetryConfigBuilder {
        RetryConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RetryConfig`]; validation happens in `build`.
#[derive(Debug, Clone)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.base_delay_ms = base.as_millis().try_into().unwrap_or(u64::MAX);
        self.config.max_delay_ms = max.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        let mut errors = Vec::new();
        validate_retry("retry", &self.config, &mut errors);
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info" or "resilience_core=debug").
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
