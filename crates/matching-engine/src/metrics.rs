//! Metrics for the matching engine

use std::sync::atomic::{AtomicU64, Ordering};

/// Simple atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple gauge for current values
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics for the matching engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub orders_received: Counter,
    pub orders_matched: Counter,
    pub orders_rejected: Counter,
    pub pre_orders_received: Counter,
    pub trades_executed: Counter,
    pub circuit_breaker_halts: Counter,
    pub open_books: Gauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_received: self.orders_received.get(),
            orders_matched: self.orders_matched.get(),
            orders_rejected: self.orders_rejected.get(),
            pre_orders_received: self.pre_orders_received.get(),
            trades_executed: self.trades_executed.get(),
            circuit_breaker_halts: self.circuit_breaker_halts.get(),
            open_books: self.open_books.get(),
        }
    }
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub orders_received: u64,
    pub orders_matched: u64,
    pub orders_rejected: u64,
    pub pre_orders_received: u64,
    pub trades_executed: u64,
    pub circuit_breaker_halts: u64,
    pub open_books: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = EngineMetrics::new();
        metrics.orders_received.increment();
        metrics.orders_received.increment();
        metrics.open_books.set(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.orders_received, 2);
        assert_eq!(snapshot.open_books, 3);
        assert_eq!(snapshot.trades_executed, 0);
    }
}
