//! Request and response types for the orchestrator.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use boxoffice_domain::{EventId, Order, Ticket, UserId};

use crate::error::OrchestratorError;

/// A request to create an order for a seat selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Purchasing user
    pub user_id: UserId,
    /// Catalog event to buy seats for
    pub event_id: EventId,
    /// Seats to purchase; non-empty, all ids unique
    pub seat_ids: Vec<String>,
    /// Optional deduplication token; replays return the stored order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl CreateOrderRequest {
    /// Validate the seat selection before any external call.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.seat_ids.is_empty() {
            return Err(OrchestratorError::Validation(
                "seat_ids must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.seat_ids.len());
        for seat_id in &self.seat_ids {
            if !seen.insert(seat_id) {
                return Err(OrchestratorError::Validation(format!(
                    "duplicate seat id: {}",
                    seat_id
                )));
            }
        }

        Ok(())
    }
}

/// Snapshot of an order and its tickets, returned by every orchestrator
/// operation and serialized by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// The order
    #[serde(flatten)]
    pub order: Order,
    /// Tickets issued for the order (empty unless Confirmed or later)
    pub tickets: Vec<Ticket>,
}

/// Outcome of an event-cancellation refund batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCancellationSummary {
    /// Orders refunded in this batch
    pub refunded: u64,
    /// Orders whose refund failed (retried on the next webhook delivery)
    pub failed: u64,
    /// Sum of refunded order totals
    pub total_refunded: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seat_ids: &[&str]) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: 1,
            event_id: 25,
            seat_ids: seat_ids.iter().map(|s| s.to_string()).collect(),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_empty_seat_list_rejected() {
        let err = request(&[]).validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn test_duplicate_seat_ids_rejected() {
        let err = request(&["A-1", "A-2", "A-1"]).validate().unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(msg) if msg.contains("A-1")));
    }

    #[test]
    fn test_valid_selection_passes() {
        assert!(request(&["A-1", "A-2"]).validate().is_ok());
    }
}
