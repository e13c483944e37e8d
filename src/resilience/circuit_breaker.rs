//! Circuit breaker for protecting a remote dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through and outcomes are buffered
//! - Open: dependency assumed down, calls fail fast and nothing is recorded
//! - Half-Open: a bounded trial window decides whether to close again
//!
//! # State Transitions
//! ```text
//! Closed → Open: closed-state ring is full and failure rate >= threshold
//! Open → Half-Open: first permit request after wait_duration_in_open_state
//! Half-Open → Closed: half-open ring is full and failure rate < threshold
//! Half-Open → Open: half-open ring is full and failure rate >= threshold
//! ```
//!
//! # Design Decisions
//! - One mutex guards state, ring and counters; the protected call runs outside it
//! - The Open → Half-Open check is lazy (compared against a stored `Instant`)
//! - Every transition bumps an epoch; outcomes for permits issued under an
//!   older epoch are dropped so they never leak into a fresh window
//! - Entering Open keeps the ring that tripped it, so metrics keep explaining why
//! - `execute` records a call that unwinds without returning as a failure

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::config::schema::CircuitBreakerConfig;
use crate::config::validation::validate_circuit_breaker;
use crate::error::{CallError, ConfigError};
use crate::observability::metrics;
use crate::resilience::ring_buffer::{Outcome, RingBuffer};

/// Circuit breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission to perform one call. Must be handed back through
/// [`CircuitBreaker::on_success`] or [`CircuitBreaker::on_failure`].
#[must_use = "a granted permit must be reported with on_success or on_failure"]
#[derive(Debug)]
pub struct Permit {
    epoch: u64,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub state: State,
    /// Percentage of failures in the active ring; `None` until the ring is full.
    pub failure_rate: Option<f32>,
    pub number_of_buffered_calls: usize,
    pub number_of_failed_calls: usize,
    pub number_of_successful_calls: usize,
    pub max_number_of_buffered_calls: usize,
    /// Calls rejected since creation (or the last reset).
    pub number_of_not_permitted_calls: u64,
}

#[derive(Debug)]
struct Inner {
    state: State,
    buffer: RingBuffer,
    epoch: u64,
    entered_at: Instant,
    half_open_permits: usize,
    not_permitted: u64,
}

/// A named circuit breaker. Share it behind an `Arc` between callers.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker, failing if the config is invalid.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        let name = name.into();
        let mut errors = Vec::new();
        validate_circuit_breaker(&format!("circuit_breakers.{}", name), &config, &mut errors);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self::build(name, config))
    }

    /// Create a breaker with the default config.
    pub fn with_default_config(name: impl Into<String>) -> Self {
        Self::build(name.into(), CircuitBreakerConfig::default())
    }

    pub(crate) fn build(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                buffer: RingBuffer::new(config.ring_buffer_size_in_closed_state),
                epoch: 0,
                entered_at: Instant::now(),
                half_open_permits: 0,
                not_permitted: 0,
            }),
            name,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    /// Ask for permission to make one call.
    ///
    /// An OPEN breaker whose wait duration has elapsed moves to HALF_OPEN
    /// here and grants the first trial permit.
    pub fn try_acquire_permission(&self) -> Option<Permit> {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => Some(Permit { epoch: inner.epoch }),
            State::Open => {
                if inner.entered_at.elapsed() >= self.config.wait_duration_in_open_state() {
                    self.transition(&mut inner, State::HalfOpen);
                    inner.half_open_permits = 1;
                    Some(Permit { epoch: inner.epoch })
                } else {
                    self.reject(&mut inner)
                }
            }
            State::HalfOpen => {
                if inner.half_open_permits < self.config.ring_buffer_size_in_half_open_state {
                    inner.half_open_permits += 1;
                    Some(Permit { epoch: inner.epoch })
                } else {
                    self.reject(&mut inner)
                }
            }
        }
    }

    pub fn on_success(&self, permit: Permit) {
        self.on_result(permit, Outcome::Success);
    }

    pub fn on_failure(&self, permit: Permit) {
        self.on_result(permit, Outcome::Failure);
    }

    /// Run `call` under this breaker: reject when no permit is available,
    /// otherwise invoke it once and record the outcome.
    pub fn execute<T, E, F>(&self, call: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.try_acquire_permission().ok_or_else(|| CallError::CallNotPermitted {
            name: self.name.clone(),
        })?;
        let pending = PendingCall {
            breaker: self,
            permit: Some(permit),
        };

        match call() {
            Ok(value) => {
                pending.finish(Outcome::Success);
                Ok(value)
            }
            Err(e) => {
                pending.finish(Outcome::Failure);
                Err(CallError::Failure(e))
            }
        }
    }

    pub fn metrics(&self) -> Metrics {
        let inner = self.lock();
        let (buffered, failed) = inner.buffer.counts();
        Metrics {
            state: inner.state,
            failure_rate: inner.buffer.failure_rate(),
            number_of_buffered_calls: buffered,
            number_of_failed_calls: failed,
            number_of_successful_calls: buffered - failed,
            max_number_of_buffered_calls: inner.buffer.capacity(),
            number_of_not_permitted_calls: inner.not_permitted,
        }
    }

    pub fn transition_to_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, State::Open);
    }

    pub fn transition_to_half_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, State::HalfOpen);
    }

    pub fn transition_to_closed(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, State::Closed);
    }

    /// Return to CLOSED with an empty ring and cleared counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let from = inner.state;
        inner.state = State::Closed;
        inner.buffer = RingBuffer::new(self.config.ring_buffer_size_in_closed_state);
        inner.epoch += 1;
        inner.entered_at = Instant::now();
        inner.half_open_permits = 0;
        inner.not_permitted = 0;

        tracing::info!(circuit_breaker = %self.name, from = %from, "Circuit breaker reset");
        if from != State::Closed {
            metrics::record_state_transition(&self.name, from, State::Closed);
        }
    }

    fn on_result(&self, permit: Permit, outcome: Outcome) {
        let mut inner = self.lock();
        if permit.epoch != inner.epoch {
            tracing::debug!(
                circuit_breaker = %self.name,
                state = %inner.state,
                "Ignoring outcome of a permit issued before the last transition"
            );
            return;
        }

        metrics::record_call(&self.name, if outcome.is_failure() { "failed" } else { "successful" });
        inner.buffer.record(outcome);

        let Some(rate) = inner.buffer.failure_rate() else {
            return;
        };
        let tripped = rate >= self.config.failure_rate_threshold;

        match inner.state {
            State::Closed if tripped => self.transition(&mut inner, State::Open),
            State::HalfOpen if tripped => self.transition(&mut inner, State::Open),
            State::HalfOpen => self.transition(&mut inner, State::Closed),
            _ => {}
        }
    }

    fn reject(&self, inner: &mut Inner) -> Option<Permit> {
        inner.not_permitted += 1;
        metrics::record_call(&self.name, "not_permitted");
        tracing::debug!(circuit_breaker = %self.name, state = %inner.state, "Call not permitted");
        None
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from = inner.state;
        if from == to {
            return;
        }
        let failure_rate = inner.buffer.failure_rate();

        inner.state = to;
        inner.epoch += 1;
        inner.entered_at = Instant::now();
        inner.half_open_permits = 0;
        match to {
            State::Closed => inner.buffer = RingBuffer::new(self.config.ring_buffer_size_in_closed_state),
            State::HalfOpen => inner.buffer = RingBuffer::new(self.config.ring_buffer_size_in_half_open_state),
            State::Open => {}
        }

        tracing::info!(
            circuit_breaker = %self.name,
            from = %from,
            to = %to,
            failure_rate = ?failure_rate,
            "Circuit breaker state transition"
        );
        metrics::record_state_transition(&self.name, from, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves Inner consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A permit held across a call made by [`CircuitBreaker::execute`].
///
/// If the call unwinds before an outcome is reported, the permit is recorded
/// as a failure on drop. Otherwise a HALF_OPEN trial slot would stay taken
/// and the trial could never complete.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    permit: Option<Permit>,
}

impl PendingCall<'_> {
    fn finish(mut self, outcome: Outcome) {
        if let Some(permit) = self.permit.take() {
            self.breaker.on_result(permit, outcome);
        }
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            tracing::warn!(
                circuit_breaker = %self.breaker.name,
                "Call ended without an outcome, recording it as a failure"
            );
            self.breaker.on_result(permit, Outcome::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::time::Duration;

    fn breaker(threshold: f32, closed: usize, half_open: usize) -> CircuitBreaker {
        let config = CircuitBreakerConfig::custom()
            .failure_rate_threshold(threshold)
            .ring_buffer_size_in_closed_state(closed)
            .ring_buffer_size_in_half_open_state(half_open)
            .wait_duration_in_open_state(Duration::from_secs(5))
            .build()
            .unwrap();
        CircuitBreaker::new("test", config).unwrap()
    }

    fn record(cb: &CircuitBreaker, outcomes: &[Outcome]) {
        for outcome in outcomes {
            let permit = cb.try_acquire_permission().expect("permit");
            match outcome {
                Outcome::Success => cb.on_success(permit),
                Outcome::Failure => cb.on_failure(permit),
            }
        }
    }

    fn expire_wait(cb: &CircuitBreaker) {
        let wait = cb.config().wait_duration_in_open_state();
        cb.lock().entered_at = Instant::now().checked_sub(wait + Duration::from_millis(1)).unwrap();
    }

    use crate::resilience::ring_buffer::Outcome::{Failure, Success};

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = CircuitBreakerConfig {
            ring_buffer_size_in_closed_state: 0,
            failure_rate_threshold: 0.0,
            ..Default::default()
        };
        match CircuitBreaker::new("bad", config).unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_config_breaker() {
        let cb = CircuitBreaker::with_default_config("defaults");
        assert_eq!(cb.name(), "defaults");
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.metrics().max_number_of_buffered_calls, 100);
    }

    #[test]
    fn test_stays_closed_below_capacity() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure, Failure, Failure, Failure]);

        let metrics = cb.metrics();
        assert_eq!(metrics.state, State::Closed);
        assert_eq!(metrics.failure_rate, None);
        assert_eq!(metrics.number_of_buffered_calls, 4);
        assert_eq!(metrics.number_of_failed_calls, 4);
    }

    #[test]
    fn test_opens_when_ring_full_and_rate_reached() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure; 5]);

        let metrics = cb.metrics();
        assert_eq!(metrics.state, State::Open);
        assert_eq!(metrics.failure_rate, Some(100.0));
        assert_eq!(metrics.number_of_buffered_calls, 5);
        assert_eq!(metrics.number_of_failed_calls, 5);
    }

    #[test]
    fn test_boundary_rate_trips() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Success, Success, Success, Success, Failure]);
        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.metrics().failure_rate, Some(20.0));
    }

    #[test]
    fn test_sliding_window_evaluated_per_call() {
        let cb = breaker(50.0, 5, 2);
        record(&cb, &[Success, Success, Success, Success, Failure]);
        assert_eq!(cb.state(), State::Closed);
        record(&cb, &[Failure]);
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.metrics().failure_rate, Some(40.0));
        record(&cb, &[Failure]);
        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.metrics().failure_rate, Some(60.0));
    }

    #[test]
    fn test_open_rejects_without_recording() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure; 5]);

        for _ in 0..3 {
            assert!(cb.try_acquire_permission().is_none());
        }
        let metrics = cb.metrics();
        assert_eq!(metrics.number_of_buffered_calls, 5);
        assert_eq!(metrics.number_of_not_permitted_calls, 3);
    }

    #[test]
    fn test_half_open_after_wait() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure; 5]);
        expire_wait(&cb);

        let permit = cb.try_acquire_permission();
        assert!(permit.is_some());
        assert_eq!(cb.state(), State::HalfOpen);
        let metrics = cb.metrics();
        assert_eq!(metrics.number_of_buffered_calls, 0);
        assert_eq!(metrics.max_number_of_buffered_calls, 2);
        cb.on_success(permit.unwrap());
    }

    #[test]
    fn test_half_open_limits_permits() {
        let cb = breaker(50.0, 5, 2);
        cb.transition_to_open();
        expire_wait(&cb);

        let first = cb.try_acquire_permission().unwrap();
        let second = cb.try_acquire_permission().unwrap();
        assert!(cb.try_acquire_permission().is_none());
        assert_eq!(cb.state(), State::HalfOpen);

        cb.on_success(first);
        cb.on_success(second);
        assert_eq!(cb.state(), State::Closed);
    }

    #[test]
    fn test_half_open_closes_below_threshold() {
        let cb = breaker(50.0, 5, 3);
        cb.transition_to_half_open();
        record(&cb, &[Success, Failure]);
        assert_eq!(cb.state(), State::HalfOpen);
        record(&cb, &[Success]);

        let metrics = cb.metrics();
        assert_eq!(metrics.state, State::Closed);
        assert_eq!(metrics.number_of_buffered_calls, 0);
        assert_eq!(metrics.max_number_of_buffered_calls, 5);
    }

    #[test]
    fn test_half_open_reopens_at_threshold() {
        let cb = breaker(50.0, 5, 2);
        cb.transition_to_half_open();
        record(&cb, &[Failure, Success]);

        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.metrics().failure_rate, Some(50.0));
        // Wait timer restarted on re-entering OPEN.
        assert!(cb.try_acquire_permission().is_none());
    }

    #[test]
    fn test_stale_permit_is_discarded() {
        let cb = breaker(50.0, 2, 2);
        let stale = cb.try_acquire_permission().unwrap();
        cb.transition_to_open();
        cb.transition_to_closed();

        cb.on_failure(stale);
        assert_eq!(cb.metrics().number_of_buffered_calls, 0);
    }

    #[test]
    fn test_metrics_read_is_idempotent() {
        let cb = breaker(50.0, 4, 2);
        record(&cb, &[Success, Failure]);
        assert_eq!(cb.metrics(), cb.metrics());
    }

    #[test]
    fn test_execute() {
        let cb = breaker(50.0, 2, 2);
        assert_eq!(cb.execute(|| Ok::<_, &str>(7)).unwrap(), 7);

        let err = cb.execute(|| Err::<u32, _>("down")).unwrap_err();
        assert_eq!(err.into_failure(), Some("down"));
        assert_eq!(cb.state(), State::Open);

        let mut invoked = false;
        let err = cb
            .execute(|| {
                invoked = true;
                Ok::<_, &str>(1)
            })
            .unwrap_err();
        assert!(err.is_not_permitted());
        assert!(!invoked);
    }

    #[test]
    fn test_panicking_trial_call_still_decides() {
        let cb = breaker(50.0, 5, 1);
        cb.transition_to_open();
        expire_wait(&cb);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            cb.execute(|| -> Result<u32, &'static str> { panic!("service blew up") })
        }));
        assert!(result.is_err());

        // The unwound trial call counts as a failure and reopens the breaker.
        let metrics = cb.metrics();
        assert_eq!(metrics.state, State::Open);
        assert_eq!(metrics.number_of_failed_calls, 1);

        expire_wait(&cb);
        assert_eq!(cb.execute(|| Ok::<_, &str>(3)).unwrap(), 3);
        assert_eq!(cb.state(), State::Closed);
    }

    #[test]
    fn test_transition_to_current_state_is_noop() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure; 5]);
        let (epoch, entered_at) = {
            let inner = cb.lock();
            (inner.epoch, inner.entered_at)
        };

        cb.transition_to_open();

        let inner = cb.lock();
        assert_eq!(inner.state, State::Open);
        assert_eq!(inner.epoch, epoch);
        assert_eq!(inner.entered_at, entered_at);
        assert_eq!(inner.buffer.counts(), (5, 5));
        drop(inner);

        let closed = breaker(50.0, 4, 2);
        record(&closed, &[Success, Failure]);
        let permit = closed.try_acquire_permission().unwrap();
        closed.transition_to_closed();
        closed.on_failure(permit);
        assert_eq!(closed.metrics().number_of_buffered_calls, 3);
    }

    #[test]
    fn test_reset() {
        let cb = breaker(20.0, 5, 2);
        record(&cb, &[Failure; 5]);
        let _ = cb.try_acquire_permission();
        cb.reset();

        let metrics = cb.metrics();
        assert_eq!(metrics.state, State::Closed);
        assert_eq!(metrics.number_of_buffered_calls, 0);
        assert_eq!(metrics.number_of_not_permitted_calls, 0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(State::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(serde_json::to_string(&State::Open).unwrap(), "\"OPEN\"");
    }
}
