//! Test fixtures for the boxoffice service.
//!
//! Seeded stub services and entity builders shared by the orchestrator and
//! daemon integration tests.

pub mod helpers;

pub use helpers::{event_with_status, on_sale_event, seat, seats_with_prices, StubServices};
