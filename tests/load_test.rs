//! Concurrent use of a single breaker from many threads.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use resilience_core::config::CircuitBreakerConfig;
use resilience_core::resilience::State;
use resilience_core::{CircuitBreaker, Decorators, Service};

mod common;
use common::StubService;

#[test]
fn test_concurrent_failures_trip_once() {
    let config = CircuitBreakerConfig::custom()
        .failure_rate_threshold(50.0)
        .ring_buffer_size_in_closed_state(50)
        .wait_duration_in_open_state(Duration::from_secs(60))
        .build()
        .unwrap();
    let cb = Arc::new(CircuitBreaker::new("load", config).unwrap());
    let service = Arc::new(StubService::always_failing());

    let concurrency = 16;
    let calls_per_thread = 100;
    let start = Instant::now();

    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let decorated = Decorators::of(service.clone()).with_circuit_breaker(cb.clone()).decorate();
            thread::spawn(move || {
                let mut rejected = 0u32;
                for i in 0..calls_per_thread {
                    if decorated.process(i).unwrap_err().is_not_permitted() {
                        rejected += 1;
                    }
                }
                rejected
            })
        })
        .collect();

    let rejected: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let total = (concurrency * calls_per_thread) as u32;
    let metrics = cb.metrics();

    println!("\n--- Load Test Results ---");
    println!("Total Calls:    {}", total);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", start.elapsed());
    println!("Invocations:    {}", service.invocations());
    println!("Rejected:       {}", rejected);
    println!("-------------------------\n");

    assert_eq!(metrics.state, State::Open);
    assert_eq!(metrics.number_of_buffered_calls, 50);
    assert_eq!(metrics.number_of_failed_calls, 50);
    assert_eq!(u64::from(rejected), metrics.number_of_not_permitted_calls);
    assert_eq!(service.invocations() + rejected, total);
    // Permits handed out before the trip may still reach the service, bounded by the thread count.
    assert!(service.invocations() < 50 + concurrency as u32);
}

#[test]
fn test_concurrent_half_open_trial_decides_once() {
    let half_open = 4;
    let config = CircuitBreakerConfig::custom()
        .failure_rate_threshold(50.0)
        .ring_buffer_size_in_closed_state(10)
        .ring_buffer_size_in_half_open_state(half_open)
        .wait_duration_in_open_state(Duration::from_secs(60))
        .build()
        .unwrap();
    let cb = Arc::new(CircuitBreaker::new("trial", config).unwrap());
    cb.transition_to_half_open();
    let service = Arc::new(StubService::always_failing());

    let concurrency = 16;
    let calls_per_thread = 20;
    let barrier = Arc::new(Barrier::new(concurrency));

    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let decorated = Decorators::of(service.clone()).with_circuit_breaker(cb.clone()).decorate();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..calls_per_thread)
                    .filter(|&i| decorated.process(i).unwrap_err().is_not_permitted())
                    .count() as u32
            })
        })
        .collect();

    let rejected: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let total = (concurrency * calls_per_thread as usize) as u32;
    let metrics = cb.metrics();

    // Only the trial permits reach the service; the full trial window reopens
    // the breaker exactly once and the restarted wait sheds everything else.
    assert_eq!(service.invocations(), half_open as u32);
    assert_eq!(rejected, total - half_open as u32);
    assert_eq!(metrics.state, State::Open);
    assert_eq!(metrics.max_number_of_buffered_calls, half_open);
    assert_eq!(metrics.number_of_buffered_calls, half_open);
    assert_eq!(metrics.number_of_failed_calls, half_open);
    assert_eq!(metrics.number_of_not_permitted_calls, u64::from(rejected));
}
