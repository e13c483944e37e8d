//! Error types shared across the crate.
//!
//! # Taxonomy
//! - `CallError::Failure`: the wrapped callable failed (last failure after retries)
//! - `CallError::CallNotPermitted`: the breaker was OPEN, nothing was invoked
//! - `ConfigError`: invalid configuration, raised at construction time only

use std::fmt;

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Failure of a single protected call.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The circuit breaker rejected the call without invoking the callable.
    #[error("circuit breaker '{name}' is OPEN and does not permit further calls")]
    CallNotPermitted { name: String },

    /// The underlying callable failed.
    #[error("call failed: {0}")]
    Failure(#[source] E),
}

impl<E> CallError<E> {
    /// True if the call was shed by an open circuit.
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, CallError::CallNotPermitted { .. })
    }

    /// Return the underlying failure, if the callable was actually invoked.
    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Failure(e) => Some(e),
            CallError::CallNotPermitted { .. } => None,
        }
    }
}

/// Error type for configuration loading and construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", JoinErrors(.0))]
    Validation(Vec<ValidationError>),
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

struct JoinErrors<'a>(&'a [ValidationError]);

impl fmt::Display for JoinErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
