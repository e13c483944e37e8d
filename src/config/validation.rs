//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold in (0, 100], sizes and attempts > 0)
//! - Validate the log filter directive
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};

/// A single semantic rule violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_rate_threshold must be in (0, 100], got {value}")]
    ThresholdOutOfRange { scope: String, value: f32 },

    #[error("{scope}: {field} must be at least 1")]
    ZeroBufferSize { scope: String, field: &'static str },

    #[error("{scope}: max_attempts must be at least 1")]
    ZeroMaxAttempts { scope: String },

    #[error("{scope}: max_delay_ms ({max}) must not be below base_delay_ms ({base})")]
    InvalidDelayRange { scope: String, base: u64, max: u64 },

    #[error("observability.log_level '{0}' is not a valid filter directive")]
    InvalidLogLevel(String),

    #[error("instance names must not be empty")]
    EmptyName,
}

/// Validate a whole configuration, collecting every violation.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    validate_circuit_breaker("circuit_breaker_defaults", &config.circuit_breaker_defaults, &mut errors);
    validate_retry("retry_defaults", &config.retry_defaults, &mut errors);

    for (name, cb) in &config.circuit_breakers {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }
        validate_circuit_breaker(&format!("circuit_breakers.{}", name), cb, &mut errors);
    }

    for (name, retry) in &config.retries {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }
        validate_retry(&format!("retries.{}", name), retry, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_circuit_breaker(scope: &str, config: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    let threshold = config.failure_rate_threshold;
    // Written so that NaN fails too.
    if !(threshold > 0.0 && threshold <= 100.0) {
        errors.push(ValidationError::ThresholdOutOfRange {
            scope: scope.to_string(),
            value: threshold,
        });
    }

    if config.ring_buffer_size_in_closed_state == 0 {
        errors.push(ValidationError::ZeroBufferSize {
            scope: scope.to_string(),
            field: "ring_buffer_size_in_closed_state",
        });
    }

    if config.ring_buffer_size_in_half_open_state == 0 {
        errors.push(ValidationError::ZeroBufferSize {
            scope: scope.to_string(),
            field: "ring_buffer_size_in_half_open_state",
        });
    }
}

pub fn validate_retry(scope: &str, config: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if config.max_attempts == 0 {
        errors.push(ValidationError::ZeroMaxAttempts { scope: scope.to_string() });
    }

    if config.base_delay_ms > 0 && config.max_delay_ms < config.base_delay_ms {
        errors.push(ValidationError::InvalidDelayRange {
            scope: scope.to_string(),
            base: config.base_delay_ms,
            max: config.max_delay_ms,
        });
    }
}
