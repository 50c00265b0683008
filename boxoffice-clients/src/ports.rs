//! Client layer port definitions.
//!
//! Ports define the interfaces for the external services the orchestrator
//! coordinates. Adapters implement these ports for specific transports
//! (HTTP, stub for tests).
//!
//! Every call takes the request correlation id; adapters attach it to the
//! outbound request as the `X-Correlation-ID` header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use boxoffice_domain::{CorrelationId, EventId, OrderId, OutboxEvent, UserId};

use crate::error::ClientError;

// =============================================================================
// Catalog Port
// =============================================================================

/// Sale status of a catalog event.
///
/// Only `OnSale` events accept orders; every other status (including values
/// this service does not know about) refuses purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Tickets can be purchased
    OnSale,
    /// No seats remain
    SoldOut,
    /// Event cancelled by the organizer
    Cancelled,
    /// Any status this service does not recognize
    #[serde(other)]
    Unknown,
}

/// Catalog record for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Catalog identifier
    pub event_id: EventId,
    /// Display title
    pub title: String,
    /// Sale status
    pub status: EventStatus,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Venue identifier
    pub venue_id: i64,
    /// Venue display name
    pub venue_name: String,
    /// Venue city
    pub city: String,
    /// Base seat price for the event
    pub base_price: Decimal,
}

/// Port for the catalog service.
///
/// Implementations:
/// - `StubCatalog` - for tests (seeded events, failure injection)
/// - `HttpCatalogClient` - real catalog service over HTTP
#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// Fetch an event by id. Returns `Ok(None)` when the catalog does not
    /// know the event.
    async fn get_event(
        &self,
        event_id: EventId,
        correlation: &CorrelationId,
    ) -> Result<Option<EventInfo>, ClientError>;
}

// =============================================================================
// Seating Port
// =============================================================================

/// A sellable seat as reported by the seating service.
///
/// `seat_id` is an opaque string end-to-end; this service never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Opaque seat identifier
    pub seat_id: String,
    /// Venue section
    pub section: String,
    /// Row within the section
    pub row: String,
    /// Seat number within the row
    pub seat_number: i32,
    /// Price for this seat
    pub price: Decimal,
    /// Event the seat belongs to
    pub event_id: EventId,
}

/// Request to hold seats for a limited time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveSeatsRequest {
    /// Event the seats belong to
    pub event_id: EventId,
    /// Seats to hold
    pub seat_ids: Vec<String>,
    /// User the hold is for
    pub user_id: UserId,
    /// Hold duration; the seating service owns expiry
    pub ttl_seconds: u64,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveSeatsResponse {
    /// Whether all requested seats are now held
    pub success: bool,
    /// Service-provided explanation
    pub message: String,
    /// Seats actually held (when the service reports them)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_seats: Option<Vec<String>>,
}

/// Request to convert held seats into sold seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocateSeatsRequest {
    /// Event the seats belong to
    pub event_id: EventId,
    /// User the seats were held for
    pub user_id: UserId,
    /// Seats to allocate
    pub seat_ids: Vec<String>,
}

/// Outcome of an allocation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocateSeatsResponse {
    /// Whether the seats are now sold to the user
    pub success: bool,
    /// Service-provided explanation
    pub message: String,
}

/// Request to release held seats. Safe to send for unknown or
/// already-released seat ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSeatsRequest {
    /// Event the seats belong to
    pub event_id: EventId,
    /// User the seats were held for
    pub user_id: UserId,
    /// Seats to release
    pub seat_ids: Vec<String>,
}

/// Port for the seating service.
///
/// Implementations:
/// - `StubSeating` - for tests (seeded seat maps, call recording)
/// - `HttpSeatingClient` - real seating service over HTTP
#[async_trait]
pub trait SeatingPort: Send + Sync {
    /// List sellable seats for an event; empty if none.
    async fn get_seats(
        &self,
        event_id: EventId,
        correlation: &CorrelationId,
    ) -> Result<Vec<Seat>, ClientError>;

    /// Hold seats for `ttl_seconds`. The reservation expires on the seating
    /// side; this service never schedules local expiry.
    async fn reserve_seats(
        &self,
        req: &ReserveSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<ReserveSeatsResponse, ClientError>;

    /// Convert held seats into sold seats. Idempotent for a set already
    /// allocated to the same user.
    async fn allocate_seats(
        &self,
        req: &AllocateSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<AllocateSeatsResponse, ClientError>;

    /// Release held seats. Callers treat failures as best-effort.
    async fn release_seats(
        &self,
        req: &ReleaseSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<(), ClientError>;
}

// =============================================================================
// Payment Port
// =============================================================================

/// Terminal status of a charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    /// Funds captured
    Success,
    /// Charge refused
    Failed,
}

/// Request to charge a user for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Order being paid for
    pub order_id: OrderId,
    /// Paying user
    pub user_id: UserId,
    /// Amount to capture
    pub amount: Decimal,
    /// Deduplication token; the payment service dedupes repeated charges
    /// under the same key
    pub idempotency_key: String,
}

/// Outcome of a charge attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResponse {
    /// Whether funds were captured
    pub success: bool,
    /// Payment-service identifier for the charge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Terminal status
    pub status: ChargeStatus,
    /// Service-provided explanation (surfaced in OrderCancelled events)
    pub message: String,
    /// External settlement reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
}

/// Request to return captured funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Order the charge belonged to
    pub order_id: OrderId,
    /// Amount to return
    pub amount: Decimal,
    /// Why the refund happens
    pub reason: String,
}

/// Outcome of a refund attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundResponse {
    /// Whether the funds were returned
    pub success: bool,
    /// Service-provided explanation
    pub message: String,
}

/// Port for the payment service.
///
/// Implementations:
/// - `StubPayment` - for tests (scripted outcomes, idempotency-key dedupe)
/// - `HttpPaymentClient` - real payment service over HTTP
#[async_trait]
pub trait PaymentPort: Send + Sync {
    /// Charge a user. A response with `status = Failed` is a terminal
    /// refusal; transport errors may mean the charge took effect and are
    /// treated as a post-payment hazard by the caller.
    async fn charge(
        &self,
        req: &ChargeRequest,
        correlation: &CorrelationId,
    ) -> Result<ChargeResponse, ClientError>;

    /// Return captured funds.
    async fn refund(
        &self,
        req: &RefundRequest,
        correlation: &CorrelationId,
    ) -> Result<RefundResponse, ClientError>;
}

// =============================================================================
// Notification Port
// =============================================================================

/// Port for the notification fan-out used by the outbox dispatcher.
///
/// Implementations:
/// - `StubNotification` - for tests (delivery recording, failure injection)
/// - `HttpNotificationClient` - real notification service over HTTP
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// Publish one outbox record. Succeeds only on a 2xx-equivalent
    /// response; any error leaves the record undispatched for retry.
    async fn send_event(
        &self,
        event: &OutboxEvent,
        correlation: &CorrelationId,
    ) -> Result<(), ClientError>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_status_unknown_fallback() {
        let status: EventStatus = serde_json::from_str("\"POSTPONED\"").unwrap();
        assert_eq!(status, EventStatus::Unknown);

        let status: EventStatus = serde_json::from_str("\"ON_SALE\"").unwrap();
        assert_eq!(status, EventStatus::OnSale);
    }

    #[test]
    fn test_seat_serialization() {
        let seat = Seat {
            seat_id: "S-A-1".to_string(),
            section: "A".to_string(),
            row: "1".to_string(),
            seat_number: 1,
            price: dec!(1000.25),
            event_id: 25,
        };

        let json = serde_json::to_string(&seat).unwrap();
        let parsed: Seat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, seat);
    }

    #[test]
    fn test_charge_response_optional_fields() {
        let json = r#"{"success":false,"status":"FAILED","message":"Card declined"}"#;
        let resp: ChargeResponse = serde_json::from_str(json).unwrap();

        assert!(!resp.success);
        assert_eq!(resp.status, ChargeStatus::Failed);
        assert_eq!(resp.payment_id, None);
        assert_eq!(resp.transaction_reference, None);
    }
}
