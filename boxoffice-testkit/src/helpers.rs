//! Builders for catalog events, seat maps, and pre-wired stub services.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use boxoffice_clients::{
    EventInfo, EventStatus, Seat, StubCatalog, StubNotification, StubPayment, StubSeating,
};
use boxoffice_domain::EventId;
use boxoffice_store::MemoryStore;

/// A catalog event with the given status, one month out.
pub fn event_with_status(event_id: EventId, status: EventStatus) -> EventInfo {
    EventInfo {
        event_id,
        title: format!("Event {}", event_id),
        status,
        event_date: Utc::now() + Duration::days(30),
        venue_id: 1,
        venue_name: "Grand Hall".to_string(),
        city: "Lisbon".to_string(),
        base_price: dec!(50.00),
    }
}

/// An on-sale catalog event.
pub fn on_sale_event(event_id: EventId) -> EventInfo {
    event_with_status(event_id, EventStatus::OnSale)
}

/// A single seat for an event.
pub fn seat(event_id: EventId, seat_id: &str, price: Decimal) -> Seat {
    Seat {
        seat_id: seat_id.to_string(),
        section: "A".to_string(),
        row: "1".to_string(),
        seat_number: 1,
        price,
        event_id,
    }
}

/// A seat map with ids `S-1..S-n`, one per price.
pub fn seats_with_prices(event_id: EventId, prices: &[Decimal]) -> Vec<Seat> {
    prices
        .iter()
        .enumerate()
        .map(|(i, price)| Seat {
            seat_id: format!("S-{}", i + 1),
            section: "A".to_string(),
            row: "1".to_string(),
            seat_number: (i + 1) as i32,
            price: *price,
            event_id,
        })
        .collect()
}

/// The four stub services plus a fresh memory store, ready for wiring into
/// an orchestrator or daemon under test.
pub struct StubServices {
    /// Stub catalog
    pub catalog: Arc<StubCatalog>,
    /// Stub seating
    pub seating: Arc<StubSeating>,
    /// Stub payment
    pub payment: Arc<StubPayment>,
    /// Stub notification fan-out
    pub notification: Arc<StubNotification>,
    /// Fresh in-memory store
    pub store: Arc<MemoryStore>,
}

impl StubServices {
    /// Empty stubs: no events, no seats.
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(StubCatalog::new()),
            seating: Arc::new(StubSeating::new()),
            payment: Arc::new(StubPayment::new()),
            notification: Arc::new(StubNotification::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Stubs seeded with one on-sale event and a seat per price.
    pub fn with_event(event_id: EventId, prices: &[Decimal]) -> Self {
        let services = Self::new();
        services.catalog.insert_event(on_sale_event(event_id));
        services
            .seating
            .insert_seats(event_id, seats_with_prices(event_id, prices));
        services
    }
}

impl Default for StubServices {
    fn default() -> Self {
        Self::new()
    }
}
