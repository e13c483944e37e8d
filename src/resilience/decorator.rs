//! Decorating a service with a circuit breaker and/or a retrier.
//!
//! # Composition
//! ```text
//! Decorated::process(input)
//!     → Retrier (bounded attempts, never retries CallNotPermitted)
//!         → CircuitBreaker permit (reject fast when OPEN)
//!             → Service::process(input.clone())
//!         ← outcome recorded on the breaker, once per attempt
//! ```
//!
//! The decorated value is itself a [`Service`] with the same input and
//! output types, so decorators can be passed wherever the raw service was.

use std::sync::Arc;

use crate::error::CallError;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::retries::Retrier;

/// A synchronous call to an external collaborator.
pub trait Service<I> {
    type Output;
    type Error;

    fn process(&self, input: I) -> Result<Self::Output, Self::Error>;
}

impl<I, S> Service<I> for Arc<S>
where
    S: Service<I> + ?Sized,
{
    type Output = S::Output;
    type Error = S::Error;

    fn process(&self, input: I) -> Result<Self::Output, Self::Error> {
        (**self).process(input)
    }
}

impl<I, S> Service<I> for &S
where
    S: Service<I> + ?Sized,
{
    type Output = S::Output;
    type Error = S::Error;

    fn process(&self, input: I) -> Result<Self::Output, Self::Error> {
        (**self).process(input)
    }
}

/// Adapts a closure into a [`Service`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceFn<F> {
    f: F,
}

pub fn service_fn<F>(f: F) -> ServiceFn<F> {
    ServiceFn { f }
}

impl<I, O, E, F> Service<I> for ServiceFn<F>
where
    F: Fn(I) -> Result<O, E>,
{
    type Output = O;
    type Error = E;

    fn process(&self, input: I) -> Result<O, E> {
        (self.f)(input)
    }
}

/// Builder collecting the policies to wrap around a service.
#[derive(Debug)]
pub struct Decorators<S> {
    service: S,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<Arc<Retrier>>,
}

impl<S> Decorators<S> {
    pub fn of(service: S) -> Self {
        Self {
            service,
            circuit_breaker: None,
            retry: None,
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn with_retry(mut self, retry: Arc<Retrier>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn decorate(self) -> Decorated<S> {
        Decorated {
            service: self.service,
            circuit_breaker: self.circuit_breaker,
            retry: self.retry,
        }
    }
}

/// A service wrapped with resilience policies.
#[derive(Debug)]
pub struct Decorated<S> {
    service: S,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<Arc<Retrier>>,
}

impl<S> Decorated<S> {
    /// Turn the decorated service into a plain closure.
    pub fn into_fn<I>(self) -> impl Fn(I) -> Result<S::Output, CallError<S::Error>>
    where
        I: Clone,
        S: Service<I>,
    {
        move |input| self.process(input)
    }

    fn attempt<I>(&self, input: I) -> Result<S::Output, CallError<S::Error>>
    where
        S: Service<I>,
    {
        match &self.circuit_breaker {
            Some(cb) => cb.execute(|| self.service.process(input)),
            None => self.service.process(input).map_err(CallError::Failure),
        }
    }
}

impl<I, S> Service<I> for Decorated<S>
where
    I: Clone,
    S: Service<I>,
{
    type Output = S::Output;
    type Error = CallError<S::Error>;

    fn process(&self, input: I) -> Result<Self::Output, Self::Error> {
        let attempt = || self.attempt(input.clone());
        match &self.retry {
            Some(retry) => retry.execute_with(attempt, |e: &CallError<S::Error>| !e.is_not_permitted()),
            None => attempt(),
        }
    }
}
