//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! circuit breaker / retrier
//!     → tracing events (transitions at info, rejections and attempts at debug)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → whatever `metrics` recorder the host installs
//! ```

pub mod logging;
pub mod metrics;
