//! Tests for circuit breaker functionality

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::sleep;

use super::breaker::CircuitBreaker;
use super::types::{CircuitBreakerConfig, CircuitState};
use crate::error::{ErrorKind, GuardError, Result};

fn config(
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    success_threshold: u32,
) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        reset_timeout,
        half_open_max_calls,
        success_threshold,
    }
}

/// Operation that always fails, counting its invocations.
fn failing_op(counter: &Arc<AtomicU32>) -> impl Fn() -> std::future::Ready<Result<&'static str>> {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(GuardError::connection("refused")))
    }
}

#[tokio::test]
async fn test_circuit_starts_closed() {
    let cb = CircuitBreaker::new("test");
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_circuit_opens_exactly_on_threshold() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(3, Duration::from_secs(60), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    for _ in 0..2 {
        let _ = cb.call(&op).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    let _ = cb.call(&op).await;
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_open_circuit_rejects_without_invoking() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(2, Duration::from_secs(10), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    for _ in 0..2 {
        let result = cb.call(&op).await;
        assert!(matches!(result, Err(GuardError::Connection(_))));
    }
    assert_eq!(cb.state(), CircuitState::Open);

    let result = cb.call(&op).await;
    match result {
        Err(GuardError::CircuitOpen { name, retry_after }) => {
            assert_eq!(name, "test");
            assert!(retry_after <= Duration::from_secs(10));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_probe_allowed_after_reset_timeout_and_failure_reopens() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(2, Duration::from_millis(100), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    for _ in 0..2 {
        let _ = cb.call(&op).await;
    }
    assert_eq!(cb.state(), CircuitState::Open);

    sleep(Duration::from_millis(100)).await;

    // The probe is let through; its failure reopens the circuit at once.
    let result = cb.call(&op).await;
    assert!(matches!(result, Err(GuardError::Connection(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_closes_after_success_threshold() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(2, Duration::from_millis(100), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    for _ in 0..2 {
        let _ = cb.call(&op).await;
    }
    assert_eq!(cb.state(), CircuitState::Open);

    sleep(Duration::from_millis(100)).await;

    let first = cb.call(|| async { Ok("success") }).await;
    assert_eq!(first.unwrap(), "success");
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    let second = cb.call(|| async { Ok("success") }).await;
    assert_eq!(second.unwrap(), "success");
    assert_eq!(cb.state(), CircuitState::Closed);

    let metrics = cb.metrics();
    assert_eq!(metrics.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_budget_rejects_without_attempting() {
    // success_threshold is out of reach so the probe budget runs dry first.
    let cb = CircuitBreaker::with_config(
        "test",
        config(1, Duration::from_millis(100), 2, 5),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    let _ = cb.call(&op).await;
    assert_eq!(cb.state(), CircuitState::Open);

    sleep(Duration::from_millis(100)).await;

    let probes = Arc::new(AtomicU32::new(0));
    for _ in 0..2 {
        let probes = Arc::clone(&probes);
        let result = cb
            .call(move || async move {
                probes.fetch_add(1, Ordering::SeqCst);
                Ok("recovering")
            })
            .await;
        assert!(result.is_ok());
    }
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    // Budget exhausted: the circuit reopens and the call is not attempted.
    let probes_after_budget = Arc::clone(&probes);
    let result = cb
        .call(move || async move {
            probes_after_budget.fetch_add(1, Ordering::SeqCst);
            Ok("recovering")
        })
        .await;
    assert!(matches!(result, Err(GuardError::CircuitOpen { .. })));
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(probes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metrics_tracking() {
    let cb = CircuitBreaker::with_config(
        "metadata-store",
        config(3, Duration::from_secs(60), 3, 2),
    )
    .unwrap();

    let _ = cb.call(|| async { Ok(1) }).await;
    let _ = cb.call(|| async { Ok(2) }).await;
    let _: Result<i32> = cb
        .call(|| async { Err(GuardError::timeout("deadline")) })
        .await;

    let metrics = cb.metrics();
    assert_eq!(metrics.name, "metadata-store");
    assert_eq!(metrics.total_calls, 3);
    assert_eq!(metrics.total_successes, 2);
    assert_eq!(metrics.total_failures, 1);
    assert_eq!(metrics.failure_count, 1);
    assert!((metrics.success_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_metrics_success_rate_without_calls() {
    let cb = CircuitBreaker::new("idle");
    assert_eq!(cb.metrics().success_rate, 0.0);
}

#[tokio::test]
async fn test_rejected_calls_are_counted() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(1, Duration::from_secs(10), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    let _ = cb.call(&op).await;
    let _ = cb.call(&op).await;

    let metrics = cb.metrics();
    assert_eq!(metrics.total_calls, 2);
    assert_eq!(metrics.total_failures, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_state_change_log_records_cycle() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(1, Duration::from_millis(100), 3, 1),
    )
    .unwrap();

    let _: Result<()> = cb
        .call(|| async { Err(GuardError::connection("refused")) })
        .await;
    sleep(Duration::from_millis(100)).await;
    let _ = cb.call(|| async { Ok(()) }).await;

    let states: Vec<CircuitState> = cb
        .state_changes()
        .into_iter()
        .map(|(_, state)| state)
        .collect();
    assert_eq!(
        states,
        vec![
            CircuitState::Open,
            CircuitState::HalfOpen,
            CircuitState::Closed
        ]
    );
}

#[tokio::test]
async fn test_reset_forces_closed_and_keeps_totals() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(2, Duration::from_secs(60), 3, 2),
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let op = failing_op(&calls);

    for _ in 0..2 {
        let _ = cb.call(&op).await;
    }
    assert_eq!(cb.state(), CircuitState::Open);

    cb.reset();

    assert_eq!(cb.state(), CircuitState::Closed);
    let metrics = cb.metrics();
    assert_eq!(metrics.failure_count, 0);
    assert!(metrics.last_failure_time.is_none());
    assert_eq!(metrics.total_calls, 2);
    assert_eq!(metrics.total_failures, 2);

    // Back in service.
    let result = cb.call(|| async { Ok("alive") }).await;
    assert_eq!(result.unwrap(), "alive");
}

#[tokio::test]
async fn test_open_error_is_distinct_from_operation_errors() {
    let cb = CircuitBreaker::with_config(
        "test",
        config(1, Duration::from_secs(10), 3, 2),
    )
    .unwrap();

    let attempted: Result<()> = cb
        .call(|| async { Err(GuardError::timeout("deadline")) })
        .await;
    assert_eq!(attempted.unwrap_err().kind(), ErrorKind::Timeout);

    let rejected: Result<()> = cb
        .call(|| async { Err(GuardError::timeout("deadline")) })
        .await;
    assert_eq!(rejected.unwrap_err().kind(), ErrorKind::CircuitOpen);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let result = CircuitBreaker::with_config(
        "test",
        config(0, Duration::from_secs(60), 3, 2),
    );
    assert!(matches!(result, Err(GuardError::Config(_))));

    let result = CircuitBreaker::with_config(
        "test",
        config(5, Duration::from_secs(60), 0, 2),
    );
    assert!(matches!(result, Err(GuardError::Config(_))));
}

#[test]
fn test_config_deserializes_humantime_durations() {
    let config: CircuitBreakerConfig = serde_json::from_value(serde_json::json!({
        "failure_threshold": 4,
        "reset_timeout": "30s",
        "half_open_max_calls": 2,
        "success_threshold": 3,
    }))
    .unwrap();

    assert_eq!(config.failure_threshold, 4);
    assert_eq!(config.reset_timeout, Duration::from_secs(30));
    assert_eq!(config.half_open_max_calls, 2);
    assert_eq!(config.success_threshold, 3);
}
