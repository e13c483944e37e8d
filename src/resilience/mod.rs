//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call through a decorated service:
//!     → decorator.rs (compose policies around the raw service)
//!     → retries.rs (bounded attempts, optional backoff.rs delay)
//!     → circuit_breaker.rs (permit per attempt, fail fast when OPEN)
//!     → ring_buffer.rs (outcome window driving the failure rate)
//! ```
//!
//! # Design Decisions
//! - Everything is synchronous and runs on the caller's thread
//! - Rejections by an open circuit are never retried
//! - Instances are named and owned by the application through registry.rs

pub mod backoff;
pub mod circuit_breaker;
pub mod decorator;
pub mod registry;
pub mod retries;
pub mod ring_buffer;

pub use circuit_breaker::{CircuitBreaker, Metrics, Permit, State};
pub use decorator::{service_fn, Decorated, Decorators, Service, ServiceFn};
pub use registry::Registry;
pub use retries::{Retrier, RetryMetrics};
pub use ring_buffer::{Outcome, RingBuffer};
