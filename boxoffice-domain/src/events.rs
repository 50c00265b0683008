//! Order lifecycle events.
//!
//! Events are immutable records of order state transitions. They are
//! serialized into the outbox payload in the same transaction as the
//! transition and published to consumers by the dispatcher.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;
use crate::entities::{EventId, OrderId, OutboxEvent, OutboxEventType, UserId};

/// Order lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// Payment succeeded, seats allocated, tickets issued
    OrderConfirmed {
        /// Order identifier
        order_id: OrderId,
        /// Purchasing user
        user_id: UserId,
        /// Catalog event
        event_id: EventId,
        /// Catalog event title at confirmation time
        event_title: String,
        /// Total charged
        order_total: Decimal,
        /// Seats issued as tickets
        seat_ids: Vec<String>,
        /// When the order was confirmed
        confirmed_at: DateTime<Utc>,
        /// Correlation id of the originating request
        correlation_id: CorrelationId,
    },

    /// Order cancelled before fulfillment
    OrderCancelled {
        /// Order identifier
        order_id: OrderId,
        /// Purchasing user
        user_id: UserId,
        /// Catalog event
        event_id: EventId,
        /// Why the order was cancelled (e.g. the payment failure message)
        reason: String,
        /// When the order was cancelled
        cancelled_at: DateTime<Utc>,
        /// Correlation id of the originating request
        correlation_id: CorrelationId,
    },

    /// Confirmed order refunded
    OrderRefunded {
        /// Order identifier
        order_id: OrderId,
        /// Purchasing user
        user_id: UserId,
        /// Catalog event
        event_id: EventId,
        /// Amount returned to the user
        amount: Decimal,
        /// Why the refund happened
        reason: String,
        /// When the refund was accepted
        refunded_at: DateTime<Utc>,
        /// Correlation id of the originating request
        correlation_id: CorrelationId,
    },
}

impl OrderEvent {
    /// The outbox event type matching this event.
    pub fn event_type(&self) -> OutboxEventType {
        match self {
            OrderEvent::OrderConfirmed { .. } => OutboxEventType::OrderConfirmed,
            OrderEvent::OrderCancelled { .. } => OutboxEventType::OrderCancelled,
            OrderEvent::OrderRefunded { .. } => OutboxEventType::OrderRefunded,
        }
    }

    /// The order this event belongs to.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderConfirmed { order_id, .. }
            | OrderEvent::OrderCancelled { order_id, .. }
            | OrderEvent::OrderRefunded { order_id, .. } => *order_id,
        }
    }

    /// The correlation id carried by this event.
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            OrderEvent::OrderConfirmed { correlation_id, .. }
            | OrderEvent::OrderCancelled { correlation_id, .. }
            | OrderEvent::OrderRefunded { correlation_id, .. } => correlation_id,
        }
    }

    /// Serialize into an undispatched outbox row.
    ///
    /// The payload is the serialized event body; the event type and
    /// correlation id are also lifted into their own columns.
    pub fn into_outbox(self) -> OutboxEvent {
        let order_id = self.order_id();
        let event_type = self.event_type();
        let correlation = self.correlation_id().clone();
        let payload = serde_json::to_value(&self)
            .unwrap_or_else(|_| serde_json::json!({ "order_id": order_id }));

        OutboxEvent::for_order(order_id, event_type, payload, &correlation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_type_mapping() {
        let event = OrderEvent::OrderCancelled {
            order_id: 9,
            user_id: 1,
            event_id: 25,
            reason: "Card declined".to_string(),
            cancelled_at: Utc::now(),
            correlation_id: CorrelationId::new(),
        };

        assert_eq!(event.event_type(), OutboxEventType::OrderCancelled);
        assert_eq!(event.order_id(), 9);
    }

    #[test]
    fn test_into_outbox_carries_payload() {
        let correlation = CorrelationId::from_header("corr-7");
        let event = OrderEvent::OrderConfirmed {
            order_id: 42,
            user_id: 1,
            event_id: 25,
            event_title: "Opening Night".to_string(),
            order_total: dec!(3150.79),
            seat_ids: vec!["A-1".to_string(), "A-2".to_string()],
            confirmed_at: Utc::now(),
            correlation_id: correlation.clone(),
        };

        let outbox = event.into_outbox();

        assert_eq!(outbox.event_type, OutboxEventType::OrderConfirmed);
        assert_eq!(outbox.aggregate_id, "42");
        assert_eq!(outbox.correlation_id, "corr-7");
        assert_eq!(outbox.payload["type"], "OrderConfirmed");
        assert_eq!(outbox.payload["seat_ids"][1], "A-2");
        assert!(!outbox.dispatched);
    }

    #[test]
    fn test_payload_roundtrip() {
        let event = OrderEvent::OrderRefunded {
            order_id: 3,
            user_id: 2,
            event_id: 77,
            amount: dec!(104.99),
            reason: "event cancelled".to_string(),
            refunded_at: Utc::now(),
            correlation_id: CorrelationId::new(),
        };

        let json = serde_json::to_value(&event).unwrap();
        let parsed: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
