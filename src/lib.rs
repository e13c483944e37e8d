//! In-process resilience primitives: a sliding-window circuit breaker and a
//! bounded retrier, composable around any synchronous call.

pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;

pub use config::schema::ResilienceConfig;
pub use error::{CallError, ConfigError};
pub use resilience::{CircuitBreaker, Decorators, Registry, Retrier, Service};
