//! Storage layer for the boxoffice service.
//!
//! Defines the `OrderStore` port and two implementations: an in-memory store
//! for tests and development, and a PostgreSQL store behind the `postgres`
//! feature. Composite mutations (order transition + ticket issue + outbox
//! append) commit atomically in both.

#![warn(clippy::all)]

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use repository::{OrderStatistics, OrderStore, Page};
