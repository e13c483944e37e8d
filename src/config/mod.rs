//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → registry builds one breaker / retrier per named entry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a breaker keeps its config for life
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Direct construction of a breaker or retrier runs the same checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config};
pub use schema::CircuitBreakerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::ResilienceConfig;
pub use schema::RetryConfig;
pub use validation::ValidationError;
