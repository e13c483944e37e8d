//! Named circuit breakers and retriers.
//!
//! # Responsibilities
//! - Build one instance per named entry of a [`ResilienceConfig`]
//! - Hand out the same `Arc` for the same name on every lookup
//! - Create unknown names on demand from the configured defaults
//!
//! # Design Decisions
//! - No global state: the application owns the registry and passes it (or
//!   the instances it hands out) to consumers explicitly
//! - DashMap entry API makes get-or-create atomic under concurrent lookups

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::schema::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};
use crate::config::validation::{validate_circuit_breaker, validate_retry};
use crate::error::ConfigError;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::retries::Retrier;

#[derive(Debug, Default)]
pub struct Registry {
    circuit_breaker_defaults: CircuitBreakerConfig,
    retry_defaults: RetryConfig,
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    retries: DashMap<String, Arc<Retrier>>,
}

impl Registry {
    /// Registry using the given defaults for on-demand instances.
    pub fn new(circuit_breaker_defaults: CircuitBreakerConfig, retry_defaults: RetryConfig) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        validate_circuit_breaker("circuit_breaker_defaults", &circuit_breaker_defaults, &mut errors);
        validate_retry("retry_defaults", &retry_defaults, &mut errors);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self {
            circuit_breaker_defaults,
            retry_defaults,
            circuit_breakers: DashMap::new(),
            retries: DashMap::new(),
        })
    }

    /// Registry with every named instance of `config` created up front.
    pub fn from_config(config: &ResilienceConfig) -> Result<Self, ConfigError> {
        let registry = Self::new(config.circuit_breaker_defaults, config.retry_defaults)?;

        for (name, cb) in &config.circuit_breakers {
            registry.circuit_breaker_with(name, *cb)?;
        }
        for (name, retry) in &config.retries {
            registry.retry_with(name, *retry)?;
        }

        tracing::info!(
            circuit_breakers = registry.circuit_breakers.len(),
            retries = registry.retries.len(),
            "Resilience registry initialized"
        );
        Ok(registry)
    }

    /// Get the named breaker, creating it from the defaults if absent.
    pub fn circuit_breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.circuit_breakers.get(name) {
            return existing.clone();
        }

        self.circuit_breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(circuit_breaker = %name, "Creating circuit breaker from defaults");
                Arc::new(CircuitBreaker::build(name.to_string(), self.circuit_breaker_defaults))
            })
            .clone()
    }

    /// Get the named breaker, creating it with `config` if absent.
    ///
    /// An existing breaker is returned as is, even if its config differs.
    pub fn circuit_breaker_with(&self, name: &str, config: CircuitBreakerConfig) -> Result<Arc<CircuitBreaker>, ConfigError> {
        match self.circuit_breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let cb = Arc::new(CircuitBreaker::new(name, config)?);
                entry.insert(cb.clone());
                Ok(cb)
            }
        }
    }

    /// Get the named retrier, creating it from the defaults if absent.
    pub fn retry(&self, name: &str) -> Arc<Retrier> {
        if let Some(existing) = self.retries.get(name) {
            return existing.clone();
        }

        self.retries
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(retry = %name, "Creating retrier from defaults");
                Arc::new(Retrier::build(name.to_string(), self.retry_defaults))
            })
            .clone()
    }

    /// Get the named retrier, creating it with `config` if absent.
    pub fn retry_with(&self, name: &str, config: RetryConfig) -> Result<Arc<Retrier>, ConfigError> {
        match self.retries.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let retry = Arc::new(Retrier::new(name, config)?);
                entry.insert(retry.clone());
                Ok(retry)
            }
        }
    }

    /// Names of all breakers, sorted.
    pub fn circuit_breaker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuit_breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Names of all retriers, sorted.
    pub fn retry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.retries.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}
