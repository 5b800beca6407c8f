//! Circuit Breakers
//!
//! Admission control for new ML work. A breaker answers a single question:
//! is this node healthy enough to take another job right now. The runner
//! consults the [`CircuitBreakerService`] before creating any task record, so
//! rejected work never shows up in the executing-task count.

#[cfg(test)]
pub mod tests;

use std::sync::Mutex;

use sysinfo::{System, SystemExt};

/// Admission gate. `is_open() == true` means reject new work.
pub trait CircuitBreaker: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_open(&self) -> bool;
}

/// Default fraction of physical memory that may be in use before the node
/// stops admitting new ML jobs.
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 0.90;

/// Opens when used memory exceeds a fraction of total memory.
pub struct MemoryCircuitBreaker {
    threshold: f64,
    system: Mutex<System>,
}

impl MemoryCircuitBreaker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            system: Mutex::new(System::new()),
        }
    }

    /// Threshold comparison on raw samples, split out so it can be tested
    /// without a live system.
    pub fn over_threshold(used_bytes: u64, total_bytes: u64, threshold: f64) -> bool {
        if total_bytes == 0 {
            return false;
        }
        (used_bytes as f64) / (total_bytes as f64) > threshold
    }
}

impl Default for MemoryCircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_THRESHOLD)
    }
}

impl CircuitBreaker for MemoryCircuitBreaker {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_open(&self) -> bool {
        let mut system = self.system.lock().expect("memory breaker lock poisoned");
        system.refresh_memory();
        // sysinfo reports KB
        let used = system.used_memory() * 1024;
        let total = system.total_memory() * 1024;
        drop(system);

        let open = Self::over_threshold(used, total, self.threshold);
        if open {
            tracing::warn!(
                "Memory circuit breaker open: used={}B total={}B threshold={}",
                used,
                total,
                self.threshold
            );
        }
        open
    }
}

/// Aggregates all registered breakers; the node rejects work when any one of
/// them is open.
#[derive(Default)]
pub struct CircuitBreakerService {
    breakers: Vec<Box<dyn CircuitBreaker>>,
}

impl CircuitBreakerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, breaker: Box<dyn CircuitBreaker>) {
        tracing::info!("Registered circuit breaker: {}", breaker.name());
        self.breakers.push(breaker);
    }

    pub fn is_open(&self) -> bool {
        self.open_breaker().is_some()
    }

    /// Name of the first open breaker, if any.
    pub fn open_breaker(&self) -> Option<&'static str> {
        self.breakers
            .iter()
            .find(|b| b.is_open())
            .map(|b| b.name())
    }
}
