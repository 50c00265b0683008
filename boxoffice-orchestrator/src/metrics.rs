//! Orchestration counters.
//!
//! Registered into the daemon's Prometheus registry and rendered at
//! `/metrics`.

use prometheus::{IntCounter, Registry};

/// Counters the orchestrator maintains.
#[derive(Clone)]
pub struct OrderMetrics {
    /// Non-duplicate CreateOrder entries that produced a persisted order
    pub orders_total: IntCounter,
    /// Charges that terminally failed
    pub payments_failed_total: IntCounter,
    /// Seat reservations the seating service refused
    pub seat_reservations_failed: IntCounter,
}

impl OrderMetrics {
    /// Create the counters and register them with `registry`.
    ///
    /// # Errors
    /// Returns `prometheus::Error` if a counter with the same name is
    /// already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::detached()?;

        registry.register(Box::new(metrics.orders_total.clone()))?;
        registry.register(Box::new(metrics.payments_failed_total.clone()))?;
        registry.register(Box::new(metrics.seat_reservations_failed.clone()))?;

        Ok(metrics)
    }

    /// Create the counters without registering them (tests).
    pub fn detached() -> Result<Self, prometheus::Error> {
        Ok(Self {
            orders_total: IntCounter::new("orders_total", "Orders persisted")?,
            payments_failed_total: IntCounter::new(
                "payments_failed_total",
                "Terminally failed charges",
            )?,
            seat_reservations_failed: IntCounter::new(
                "seat_reservations_failed",
                "Refused seat reservations",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_once() {
        let registry = Registry::new();
        let metrics = OrderMetrics::new(&registry).unwrap();

        metrics.orders_total.inc();
        assert_eq!(metrics.orders_total.get(), 1);

        // Second registration under the same names is refused.
        assert!(OrderMetrics::new(&registry).is_err());
    }
}
