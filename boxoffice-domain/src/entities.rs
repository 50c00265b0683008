//! Domain Entities for Boxoffice
//!
//! Core business entities with lifecycle management.
//! The orchestrator exclusively owns mutations to Order and Ticket and the
//! appending of OutboxEvent rows; the dispatcher owns the `dispatched` flag.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::correlation::CorrelationId;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for an Order (store-assigned, dense)
pub type OrderId = i64;

/// Unique identifier for a Ticket (store-assigned)
pub type TicketId = i64;

/// Identifier for a user
pub type UserId = i64;

/// Identifier for a catalog event
pub type EventId = i64;

// =============================================================================
// Errors
// =============================================================================

/// Domain errors for entity validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Seat selection failed validation
    #[error("Invalid seat selection: {0}")]
    InvalidSeatSelection(String),

    /// Unknown order status string (reading from storage)
    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    /// Unknown payment status string (reading from storage)
    #[error("Unknown payment status: {0}")]
    UnknownPaymentStatus(String),

    /// Unknown outbox event type string (reading from storage)
    #[error("Unknown outbox event type: {0}")]
    UnknownEventType(String),
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an Order.
///
/// Terminal states: `Cancelled`, `Refunded`,
/// `PaymentCompletedButFulfillmentFailed`. `Confirmed` is terminal in the
/// absence of cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Persisted, payment not yet attempted
    Created,
    /// Paid and fulfilled: tickets issued, seats allocated
    Confirmed,
    /// Cancelled before fulfillment (payment failed or user cancel)
    Cancelled,
    /// Previously confirmed, payment returned to the user
    Refunded,
    /// Payment succeeded but fulfillment and the compensating refund both
    /// failed. Operator-owned sink state; no further event is emitted.
    PaymentCompletedButFulfillmentFailed,
}

impl OrderStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::PaymentCompletedButFulfillmentFailed => {
                "PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED"
            },
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            "PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED" => {
                Ok(OrderStatus::PaymentCompletedButFulfillmentFailed)
            },
            other => Err(DomainError::UnknownOrderStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment status of an Order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Charge not yet attempted or outcome unknown
    Pending,
    /// Charge accepted by the payment service
    Success,
    /// Charge refused
    Failed,
    /// Charge returned to the user
    Refunded,
}

impl PaymentStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::UnknownPaymentStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A seat-purchase order.
///
/// Invariants:
/// - `Confirmed` implies `payment_status == Success` and at least one Ticket
/// - `Refunded` implies the order was previously `Confirmed`
/// - At most one order exists per non-null `idempotency_key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned dense identifier
    pub order_id: OrderId,
    /// Purchasing user
    pub user_id: UserId,
    /// Catalog event the seats belong to
    pub event_id: EventId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Total charged, 2 decimal places
    pub order_total: Decimal,
    /// Caller-supplied deduplication token
    pub idempotency_key: Option<String>,
    /// When the order was persisted (UTC)
    pub created_at: DateTime<Utc>,
    /// Last mutation (UTC)
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::PaymentCompletedButFulfillmentFailed
        )
    }

    /// Transition to Confirmed after successful payment and allocation.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Confirmed;
        self.payment_status = PaymentStatus::Success;
        self.updated_at = now;
    }

    /// Transition to Cancelled. Payment status is set only when the charge
    /// itself failed; a cancel after a failed refund keeps the old value.
    pub fn cancel(&mut self, payment_status: Option<PaymentStatus>, now: DateTime<Utc>) {
        self.status = OrderStatus::Cancelled;
        if let Some(ps) = payment_status {
            self.payment_status = ps;
        }
        self.updated_at = now;
    }

    /// Transition to Refunded after a successful refund.
    pub fn refund(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Refunded;
        self.payment_status = PaymentStatus::Refunded;
        self.updated_at = now;
    }

    /// Park in the operator-owned sink state: payment went through but
    /// fulfillment and the compensating refund both failed.
    pub fn mark_fulfillment_failed(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::PaymentCompletedButFulfillmentFailed;
        self.updated_at = now;
    }
}

/// Order fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Purchasing user
    pub user_id: UserId,
    /// Catalog event
    pub event_id: EventId,
    /// Total to charge, 2 decimal places
    pub order_total: Decimal,
    /// Caller-supplied deduplication token
    pub idempotency_key: Option<String>,
}

// =============================================================================
// Ticket
// =============================================================================

/// An issued ticket. Created in bulk when an order enters Confirmed;
/// cascade-deleted with its Order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier
    pub ticket_id: TicketId,
    /// Owning order
    pub order_id: OrderId,
    /// Catalog event
    pub event_id: EventId,
    /// Opaque seat identifier from the seating service
    pub seat_id: String,
    /// Seat price at reservation time
    pub price_paid: Decimal,
}

/// Ticket fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewTicket {
    /// Owning order
    pub order_id: OrderId,
    /// Catalog event
    pub event_id: EventId,
    /// Opaque seat identifier
    pub seat_id: String,
    /// Seat price at reservation time
    pub price_paid: Decimal,
}

// =============================================================================
// Outbox
// =============================================================================

/// Type of an order lifecycle event in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxEventType {
    /// Order confirmed, tickets issued
    OrderConfirmed,
    /// Order cancelled
    OrderCancelled,
    /// Order refunded
    OrderRefunded,
}

impl OutboxEventType {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEventType::OrderConfirmed => "OrderConfirmed",
            OutboxEventType::OrderCancelled => "OrderCancelled",
            OutboxEventType::OrderRefunded => "OrderRefunded",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "OrderConfirmed" => Ok(OutboxEventType::OrderConfirmed),
            "OrderCancelled" => Ok(OutboxEventType::OrderCancelled),
            "OrderRefunded" => Ok(OutboxEventType::OrderRefunded),
            other => Err(DomainError::UnknownEventType(other.to_string())),
        }
    }
}

impl std::fmt::Display for OutboxEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending domain event, written in the same transaction as the order
/// mutation that produced it and drained asynchronously by the dispatcher.
///
/// Consumers must dedupe by `id`: delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Globally unique identifier (deduplication key for consumers)
    pub id: Uuid,
    /// Aggregate type, always "Order" here
    pub aggregate_type: String,
    /// Aggregate identifier (order id as text)
    pub aggregate_id: String,
    /// Lifecycle event type
    pub event_type: OutboxEventType,
    /// Serialized event body
    pub payload: Value,
    /// Correlation id of the request that caused the transition
    pub correlation_id: String,
    /// When the event was appended (UTC)
    pub created_at: DateTime<Utc>,
    /// Flipped by the dispatcher after successful notification
    pub dispatched: bool,
}

impl OutboxEvent {
    /// Build an undispatched outbox row for an order transition.
    pub fn for_order(
        order_id: OrderId,
        event_type: OutboxEventType,
        payload: Value,
        correlation: &CorrelationId,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            aggregate_type: "Order".to_string(),
            aggregate_id: order_id.to_string(),
            event_type,
            payload,
            correlation_id: correlation.to_string(),
            created_at: Utc::now(),
            dispatched: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            order_id: 1,
            user_id: 7,
            event_id: 25,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            order_total: dec!(105.00),
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::PaymentCompletedButFulfillmentFailed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::parse("SHIPPED").is_err());
    }

    #[test]
    fn test_payment_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_confirm_sets_payment_success() {
        let mut order = sample_order();
        order.confirm(Utc::now());

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Success);
        assert!(!order.is_terminal());
    }

    #[test]
    fn test_cancel_keeps_payment_status_when_none() {
        let mut order = sample_order();
        order.payment_status = PaymentStatus::Success;
        order.cancel(None, Utc::now());

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.payment_status, PaymentStatus::Success);
        assert!(order.is_terminal());
    }

    #[test]
    fn test_fulfillment_failed_is_terminal() {
        let mut order = sample_order();
        order.payment_status = PaymentStatus::Success;
        order.mark_fulfillment_failed(Utc::now());

        assert_eq!(
            order.status,
            OrderStatus::PaymentCompletedButFulfillmentFailed
        );
        assert_eq!(order.payment_status, PaymentStatus::Success);
        assert!(order.is_terminal());
    }

    #[test]
    fn test_outbox_event_for_order() {
        let correlation = CorrelationId::new();
        let event = OutboxEvent::for_order(
            42,
            OutboxEventType::OrderConfirmed,
            serde_json::json!({"order_id": 42}),
            &correlation,
        );

        assert_eq!(event.aggregate_type, "Order");
        assert_eq!(event.aggregate_id, "42");
        assert_eq!(event.correlation_id, correlation.to_string());
        assert!(!event.dispatched);
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json =
            serde_json::to_string(&OrderStatus::PaymentCompletedButFulfillmentFailed).unwrap();
        assert_eq!(json, "\"PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED\"");

        let json = serde_json::to_string(&PaymentStatus::Success).unwrap();
        assert_eq!(json, "\"SUCCESS\"");
    }
}
