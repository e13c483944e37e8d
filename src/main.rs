//! Resilience demo CLI.
//!
//! Drives the circuit breaker and the retrier against a simulated remote
//! service so their behaviour can be watched from a terminal.
//!
//! ```text
//!   resilience-demo ──▶ Registry (from config) ──▶ Decorated service
//!                                                      │
//!                         Retrier ─▶ CircuitBreaker ─▶ SimulatedService
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use resilience_core::config::{load_config, CircuitBreakerConfig, ResilienceConfig, RetryConfig};
use resilience_core::observability::logging::init_logging;
use resilience_core::{CallError, Decorators, Registry, Service};

#[derive(Parser)]
#[command(name = "resilience-demo", version)]
#[command(about = "Drive a circuit breaker and a retrier against a simulated remote service", long_about = None)]
struct Cli {
    /// TOML configuration file (built-in demo settings when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send calls through a circuit breaker
    CircuitBreaker {
        /// Breaker name to look up in the registry
        #[arg(long, default_value = "remote")]
        name: String,

        /// Number of calls to make
        #[arg(short = 'n', long, default_value_t = 12)]
        calls: u32,

        /// The service fails this many calls, then recovers (default: never recovers)
        #[arg(short, long)]
        fail_first: Option<u32>,

        /// Pause between calls in milliseconds
        #[arg(short, long, default_value_t = 0)]
        pause_ms: u64,
    },
    /// Make one call through a retrier
    Retry {
        /// Retrier name to look up in the registry
        #[arg(short, long, default_value = "remote")]
        name: String,

        /// The service fails this many calls, then recovers (default: never recovers)
        #[arg(short, long)]
        fail_first: Option<u32>,
    },
    /// Validate the configuration and print it
    CheckConfig,
}

#[derive(Debug, thiserror::Error)]
#[error("remote service unavailable (invocation #{0})")]
struct RemoteError(u32);

/// Stand-in for a remote dependency: fails its first `fail_first` invocations.
struct SimulatedService {
    fail_first: Option<u32>,
    invocations: AtomicU32,
}

impl SimulatedService {
    fn new(fail_first: Option<u32>) -> Self {
        Self {
            fail_first,
            invocations: AtomicU32::new(0),
        }
    }

    fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Service<u32> for SimulatedService {
    type Output = u32;
    type Error = RemoteError;

    fn process(&self, input: u32) -> Result<u32, RemoteError> {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_first {
            Some(limit) if n > limit => Ok(input),
            _ => Err(RemoteError(n)),
        }
    }
}

/// Settings used when no config file is given.
fn demo_config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.circuit_breakers.insert(
        "remote".to_string(),
        CircuitBreakerConfig {
            failure_rate_threshold: 20.0,
            ring_buffer_size_in_closed_state: 5,
            ring_buffer_size_in_half_open_state: 2,
            wait_duration_in_open_state_ms: 1000,
        },
    );
    config.retries.insert(
        "remote".to_string(),
        RetryConfig {
            max_attempts: 2,
            ..Default::default()
        },
    );
    config
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => demo_config(),
    };

    init_logging(&config.observability)?;
    tracing::info!(config = ?cli.config, "resilience-demo v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = Registry::from_config(&config)?;

    match cli.command {
        Commands::CircuitBreaker {
            name,
            calls,
            fail_first,
            pause_ms,
        } => {
            let service = Arc::new(SimulatedService::new(fail_first));
            let cb = registry.circuit_breaker(&name);
            let decorated = Decorators::of(service.clone()).with_circuit_breaker(cb.clone()).decorate();

            for i in 0..calls {
                match decorated.process(i) {
                    Ok(value) => println!("call {:>3}: ok ({})", i, value),
                    Err(CallError::CallNotPermitted { .. }) => println!("call {:>3}: rejected, circuit {}", i, cb.state()),
                    Err(CallError::Failure(e)) => println!("call {:>3}: failed: {}", i, e),
                }
                if pause_ms > 0 {
                    thread::sleep(Duration::from_millis(pause_ms));
                }
            }

            let report = json!({
                "circuit_breaker": name,
                "service_invocations": service.invocations(),
                "metrics": cb.metrics(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Retry { name, fail_first } => {
            let service = Arc::new(SimulatedService::new(fail_first));
            let retry = registry.retry(&name);
            let decorated = Decorators::of(service.clone()).with_retry(retry.clone()).decorate();

            match decorated.process(1) {
                Ok(value) => println!("call: ok ({})", value),
                Err(e) => println!("call: {}", e),
            }

            let report = json!({
                "retry": name,
                "service_invocations": service.invocations(),
                "metrics": retry.metrics(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
