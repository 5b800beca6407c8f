//! Breaker Module Tests

use super::*;

/// Breaker pinned to a fixed answer, for wiring tests.
pub struct StaticCircuitBreaker {
    open: bool,
}

impl StaticCircuitBreaker {
    pub fn new(open: bool) -> Self {
        Self { open }
    }
}

impl CircuitBreaker for StaticCircuitBreaker {
    fn name(&self) -> &'static str {
        "static"
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[test]
fn test_over_threshold_boundaries() {
    assert!(!MemoryCircuitBreaker::over_threshold(89, 100, 0.9));
    assert!(!MemoryCircuitBreaker::over_threshold(90, 100, 0.9));
    assert!(MemoryCircuitBreaker::over_threshold(91, 100, 0.9));
}

#[test]
fn test_zero_total_memory_never_opens() {
    assert!(!MemoryCircuitBreaker::over_threshold(100, 0, 0.9));
}

#[test]
fn test_service_with_no_breakers_is_closed() {
    let service = CircuitBreakerService::new();
    assert!(!service.is_open());
    assert_eq!(service.open_breaker(), None);
}

#[test]
fn test_service_reports_first_open_breaker() {
    let mut service = CircuitBreakerService::new();
    service.register(Box::new(StaticCircuitBreaker::new(false)));
    assert!(!service.is_open());

    service.register(Box::new(StaticCircuitBreaker::new(true)));
    assert!(service.is_open());
    assert_eq!(service.open_breaker(), Some("static"));
}
