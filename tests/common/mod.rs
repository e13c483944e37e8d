//! Shared utilities for integration and load testing.

use std::sync::atomic::{AtomicU32, Ordering};

use resilience_core::Service;

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stub failure on invocation {0}")]
pub struct StubError(pub u32);

/// A remote-service stand-in that counts invocations.
///
/// Fails every invocation up to and including `fail_first` (all of them when
/// `None`), then echoes its input.
pub struct StubService {
    fail_first: Option<u32>,
    invocations: AtomicU32,
}

impl StubService {
    pub fn always_failing() -> Self {
        Self {
            fail_first: None,
            invocations: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: Some(n),
            invocations: AtomicU32::new(0),
        }
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Service<i32> for StubService {
    type Output = i32;
    type Error = StubError;

    fn process(&self, input: i32) -> Result<i32, StubError> {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_first {
            Some(limit) if n > limit => Ok(input),
            _ => Err(StubError(n)),
        }
    }
}
