//! Stub implementations for testing.
//!
//! These adapters simulate the catalog, seating, payment, and notification
//! services without making network calls. They record the calls they receive
//! so tests can observe compensation (released seats, refunds) and support
//! scripted failures (declined payment, failing allocation, dead adapter).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use boxoffice_domain::{CorrelationId, EventId, OutboxEvent, UserId};

use crate::error::ClientError;
use crate::ports::{
    AllocateSeatsRequest, AllocateSeatsResponse, CatalogPort, ChargeRequest, ChargeResponse,
    ChargeStatus, EventInfo, NotificationPort, PaymentPort, RefundRequest, RefundResponse,
    ReleaseSeatsRequest, ReserveSeatsRequest, ReserveSeatsResponse, Seat, SeatingPort,
};

// =============================================================================
// Stub Catalog
// =============================================================================

/// Stub catalog seeded with events.
#[derive(Default)]
pub struct StubCatalog {
    events: RwLock<HashMap<EventId, EventInfo>>,
    fail_next: RwLock<bool>,
}

impl StubCatalog {
    /// Create an empty stub catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an event.
    pub fn insert_event(&self, event: EventInfo) {
        self.events.write().unwrap().insert(event.event_id, event);
    }

    /// Configure the next call to fail at the transport level.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().unwrap() = fail;
    }

    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write().unwrap();
        let fail = *fail_next;
        *fail_next = false;
        fail
    }
}

#[async_trait]
impl CatalogPort for StubCatalog {
    async fn get_event(
        &self,
        event_id: EventId,
        _correlation: &CorrelationId,
    ) -> Result<Option<EventInfo>, ClientError> {
        if self.should_fail() {
            return Err(ClientError::Request(
                "Simulated catalog failure".to_string(),
            ));
        }

        Ok(self.events.read().unwrap().get(&event_id).cloned())
    }
}

// =============================================================================
// Stub Seating
// =============================================================================

/// Stub seating service with a seeded seat map.
///
/// Tracks holds and allocations per (event, seat) and records every release
/// request so tests can verify compensation.
#[derive(Default)]
pub struct StubSeating {
    seats: RwLock<HashMap<EventId, Vec<Seat>>>,
    reserved: RwLock<HashMap<(EventId, String), UserId>>,
    allocated: RwLock<HashSet<(EventId, String)>>,
    released: RwLock<Vec<ReleaseSeatsRequest>>,
    refuse_reserve: RwLock<bool>,
    refuse_allocate: RwLock<bool>,
    fail_allocate: RwLock<bool>,
    fail_release: RwLock<bool>,
    reserve_calls: AtomicU64,
}

impl StubSeating {
    /// Create an empty stub seating service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the seat map for an event.
    pub fn insert_seats(&self, event_id: EventId, seats: Vec<Seat>) {
        self.seats.write().unwrap().insert(event_id, seats);
    }

    /// Make the next reservation be refused (`success = false`).
    pub fn set_refuse_reserve(&self, refuse: bool) {
        *self.refuse_reserve.write().unwrap() = refuse;
    }

    /// Make the next allocation be refused (`success = false`).
    pub fn set_refuse_allocate(&self, refuse: bool) {
        *self.refuse_allocate.write().unwrap() = refuse;
    }

    /// Make the next allocation fail at the transport level.
    pub fn set_fail_allocate(&self, fail: bool) {
        *self.fail_allocate.write().unwrap() = fail;
    }

    /// Make release calls fail at the transport level.
    pub fn set_fail_release(&self, fail: bool) {
        *self.fail_release.write().unwrap() = fail;
    }

    /// Number of reservation attempts received.
    pub fn reserve_calls(&self) -> u64 {
        self.reserve_calls.load(Ordering::SeqCst)
    }

    /// Seat ids released so far, across all release calls.
    pub fn released_seats(&self) -> Vec<String> {
        self.released
            .read()
            .unwrap()
            .iter()
            .flat_map(|req| req.seat_ids.iter().cloned())
            .collect()
    }

    /// Whether a seat is currently allocated (sold).
    pub fn is_allocated(&self, event_id: EventId, seat_id: &str) -> bool {
        self.allocated
            .read()
            .unwrap()
            .contains(&(event_id, seat_id.to_string()))
    }

    fn take_flag(flag: &RwLock<bool>) -> bool {
        let mut value = flag.write().unwrap();
        let taken = *value;
        *value = false;
        taken
    }
}

#[async_trait]
impl SeatingPort for StubSeating {
    async fn get_seats(
        &self,
        event_id: EventId,
        _correlation: &CorrelationId,
    ) -> Result<Vec<Seat>, ClientError> {
        Ok(self
            .seats
            .read()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn reserve_seats(
        &self,
        req: &ReserveSeatsRequest,
        _correlation: &CorrelationId,
    ) -> Result<ReserveSeatsResponse, ClientError> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_flag(&self.refuse_reserve) {
            return Ok(ReserveSeatsResponse {
                success: false,
                message: "Seats unavailable".to_string(),
                reserved_seats: None,
            });
        }

        let mut reserved = self.reserved.write().unwrap();
        for seat_id in &req.seat_ids {
            reserved.insert((req.event_id, seat_id.clone()), req.user_id);
        }

        Ok(ReserveSeatsResponse {
            success: true,
            message: "Reserved".to_string(),
            reserved_seats: Some(req.seat_ids.clone()),
        })
    }

    async fn allocate_seats(
        &self,
        req: &AllocateSeatsRequest,
        _correlation: &CorrelationId,
    ) -> Result<AllocateSeatsResponse, ClientError> {
        if Self::take_flag(&self.fail_allocate) {
            return Err(ClientError::Request(
                "Simulated seating failure".to_string(),
            ));
        }

        if Self::take_flag(&self.refuse_allocate) {
            return Ok(AllocateSeatsResponse {
                success: false,
                message: "Reservation expired".to_string(),
            });
        }

        let mut allocated = self.allocated.write().unwrap();
        let mut reserved = self.reserved.write().unwrap();
        for seat_id in &req.seat_ids {
            reserved.remove(&(req.event_id, seat_id.clone()));
            allocated.insert((req.event_id, seat_id.clone()));
        }

        Ok(AllocateSeatsResponse {
            success: true,
            message: "Allocated".to_string(),
        })
    }

    async fn release_seats(
        &self,
        req: &ReleaseSeatsRequest,
        _correlation: &CorrelationId,
    ) -> Result<(), ClientError> {
        if Self::take_flag(&self.fail_release) {
            return Err(ClientError::Request(
                "Simulated release failure".to_string(),
            ));
        }

        let mut reserved = self.reserved.write().unwrap();
        for seat_id in &req.seat_ids {
            reserved.remove(&(req.event_id, seat_id.clone()));
        }

        self.released.write().unwrap().push(req.clone());
        Ok(())
    }
}

// =============================================================================
// Stub Payment
// =============================================================================

/// Stub payment service.
///
/// Dedupes charges by idempotency key the way the real service contract
/// requires, and supports scripted declines and transport failures.
#[derive(Default)]
pub struct StubPayment {
    charges: RwLock<HashMap<String, ChargeResponse>>,
    refunds: RwLock<Vec<RefundRequest>>,
    decline_next: RwLock<Option<String>>,
    fail_next_charge: RwLock<bool>,
    refuse_refund: RwLock<bool>,
    charge_calls: AtomicU64,
    payment_counter: AtomicU64,
}

impl StubPayment {
    /// Create a stub payment service that approves every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline the next charge with the given message.
    pub fn decline_next(&self, message: impl Into<String>) {
        *self.decline_next.write().unwrap() = Some(message.into());
    }

    /// Make the next charge fail at the transport level (outcome unknown).
    pub fn set_fail_next_charge(&self, fail: bool) {
        *self.fail_next_charge.write().unwrap() = fail;
    }

    /// Make refunds be refused (`success = false`).
    pub fn set_refuse_refund(&self, refuse: bool) {
        *self.refuse_refund.write().unwrap() = refuse;
    }

    /// Number of charge attempts received, including deduplicated replays.
    pub fn charge_calls(&self) -> u64 {
        self.charge_calls.load(Ordering::SeqCst)
    }

    /// Number of distinct charges captured.
    pub fn captured_charges(&self) -> usize {
        self.charges
            .read()
            .unwrap()
            .values()
            .filter(|resp| resp.success)
            .count()
    }

    /// Refund requests received so far.
    pub fn refund_requests(&self) -> Vec<RefundRequest> {
        self.refunds.read().unwrap().clone()
    }

    fn next_payment_id(&self) -> String {
        let n = self.payment_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("PAY-{}", n)
    }
}

#[async_trait]
impl PaymentPort for StubPayment {
    async fn charge(
        &self,
        req: &ChargeRequest,
        _correlation: &CorrelationId,
    ) -> Result<ChargeResponse, ClientError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut fail_next = self.fail_next_charge.write().unwrap();
            if *fail_next {
                *fail_next = false;
                return Err(ClientError::Request(
                    "Simulated payment transport failure".to_string(),
                ));
            }
        }

        // Idempotency: same key returns the stored outcome without a second
        // capture.
        if let Some(existing) = self.charges.read().unwrap().get(&req.idempotency_key) {
            return Ok(existing.clone());
        }

        let decline = self.decline_next.write().unwrap().take();
        let response = match decline {
            Some(message) => ChargeResponse {
                success: false,
                payment_id: None,
                status: ChargeStatus::Failed,
                message,
                transaction_reference: None,
            },
            None => {
                let payment_id = self.next_payment_id();
                ChargeResponse {
                    success: true,
                    payment_id: Some(payment_id.clone()),
                    status: ChargeStatus::Success,
                    message: "Approved".to_string(),
                    transaction_reference: Some(format!("TXN-{}", payment_id)),
                }
            },
        };

        self.charges
            .write()
            .unwrap()
            .insert(req.idempotency_key.clone(), response.clone());

        Ok(response)
    }

    async fn refund(
        &self,
        req: &RefundRequest,
        _correlation: &CorrelationId,
    ) -> Result<RefundResponse, ClientError> {
        self.refunds.write().unwrap().push(req.clone());

        if *self.refuse_refund.read().unwrap() {
            return Ok(RefundResponse {
                success: false,
                message: "Refund rejected".to_string(),
            });
        }

        Ok(RefundResponse {
            success: true,
            message: "Refunded".to_string(),
        })
    }
}

// =============================================================================
// Stub Notification
// =============================================================================

/// Stub notification fan-out recording delivered outbox event ids.
#[derive(Default)]
pub struct StubNotification {
    delivered: RwLock<Vec<Uuid>>,
    failing: RwLock<bool>,
}

impl StubNotification {
    /// Create a stub that accepts every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the adapter into (or out of) a persistent failure mode.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap() = failing;
    }

    /// Ids of events delivered so far, in arrival order.
    pub fn delivered(&self) -> Vec<Uuid> {
        self.delivered.read().unwrap().clone()
    }

    /// Number of events delivered so far.
    pub fn delivered_count(&self) -> usize {
        self.delivered.read().unwrap().len()
    }
}

#[async_trait]
impl NotificationPort for StubNotification {
    async fn send_event(
        &self,
        event: &OutboxEvent,
        _correlation: &CorrelationId,
    ) -> Result<(), ClientError> {
        if *self.failing.read().unwrap() {
            return Err(ClientError::Api {
                status: 503,
                message: "Simulated notification outage".to_string(),
            });
        }

        self.delivered.write().unwrap().push(event.id);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn charge_request(key: &str) -> ChargeRequest {
        ChargeRequest {
            order_id: 1,
            user_id: 1,
            amount: dec!(105.00),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_payment_dedupes_by_idempotency_key() {
        let payment = StubPayment::new();
        let correlation = CorrelationId::new();

        let first = payment
            .charge(&charge_request("k-42"), &correlation)
            .await
            .unwrap();
        let second = payment
            .charge(&charge_request("k-42"), &correlation)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(payment.charge_calls(), 2);
        assert_eq!(payment.captured_charges(), 1);
    }

    #[tokio::test]
    async fn test_payment_decline_next() {
        let payment = StubPayment::new();
        payment.decline_next("Card declined");

        let resp = payment
            .charge(&charge_request("k-1"), &CorrelationId::new())
            .await
            .unwrap();

        assert!(!resp.success);
        assert_eq!(resp.status, ChargeStatus::Failed);
        assert_eq!(resp.message, "Card declined");

        // Next charge under a different key succeeds again.
        let resp = payment
            .charge(&charge_request("k-2"), &CorrelationId::new())
            .await
            .unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_seating_reserve_then_release() {
        let seating = StubSeating::new();
        let correlation = CorrelationId::new();

        let reserve = ReserveSeatsRequest {
            event_id: 25,
            seat_ids: vec!["A-1".to_string(), "A-2".to_string()],
            user_id: 1,
            ttl_seconds: 900,
        };
        let resp = seating.reserve_seats(&reserve, &correlation).await.unwrap();
        assert!(resp.success);

        let release = ReleaseSeatsRequest {
            event_id: 25,
            user_id: 1,
            seat_ids: vec!["A-1".to_string(), "A-2".to_string()],
        };
        seating.release_seats(&release, &correlation).await.unwrap();

        assert_eq!(seating.released_seats(), vec!["A-1", "A-2"]);
        assert!(!seating.is_allocated(25, "A-1"));
    }

    #[tokio::test]
    async fn test_seating_allocate_marks_sold() {
        let seating = StubSeating::new();
        let correlation = CorrelationId::new();

        let allocate = AllocateSeatsRequest {
            event_id: 25,
            user_id: 1,
            seat_ids: vec!["A-1".to_string()],
        };
        let resp = seating
            .allocate_seats(&allocate, &correlation)
            .await
            .unwrap();

        assert!(resp.success);
        assert!(seating.is_allocated(25, "A-1"));
    }

    #[tokio::test]
    async fn test_notification_failure_mode() {
        let notification = StubNotification::new();
        notification.set_failing(true);

        let event = OutboxEvent::for_order(
            1,
            boxoffice_domain::OutboxEventType::OrderConfirmed,
            serde_json::json!({}),
            &CorrelationId::new(),
        );

        assert!(notification
            .send_event(&event, &CorrelationId::new())
            .await
            .is_err());
        assert_eq!(notification.delivered_count(), 0);

        notification.set_failing(false);
        notification
            .send_event(&event, &CorrelationId::new())
            .await
            .unwrap();
        assert_eq!(notification.delivered(), vec![event.id]);
    }
}
