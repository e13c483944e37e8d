//! Metrics emission.
//!
//! # Metrics
//! - `resilience_circuit_breaker_calls_total` (counter): outcomes by breaker and kind
//! - `resilience_circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `resilience_circuit_breaker_transitions_total` (counter): state changes
//! - `resilience_retry_calls_total` (counter): finished retried calls by kind
//!
//! # Design Decisions
//! - Emits through the `metrics` facade only; installing an exporter is up to the host
//! - Without a recorder every call is a no-op

use metrics::{counter, gauge};

use crate::resilience::circuit_breaker::State;

/// Record a call outcome seen by a breaker ("successful", "failed", "not_permitted").
pub fn record_call(breaker: &str, kind: &'static str) {
    counter!(
        "resilience_circuit_breaker_calls_total",
        "name" => breaker.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record a breaker state transition and update the state gauge.
pub fn record_state_transition(breaker: &str, from: State, to: State) {
    counter!(
        "resilience_circuit_breaker_transitions_total",
        "name" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);

    gauge!("resilience_circuit_breaker_state", "name" => breaker.to_string()).set(f64::from(to as u8));
}

/// Record how a retried call finished.
pub fn record_retry_call(retry: &str, kind: &'static str) {
    counter!(
        "resilience_retry_calls_total",
        "name" => retry.to_string(),
        "kind" => kind
    )
    .increment(1);
}
