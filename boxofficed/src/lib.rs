//! Boxoffice Daemon Library
//!
//! Runtime for the order-management service of the ticketing platform.
//!
//! # Architecture
//!
//! ```text
//! HTTP API → Orchestrator → Catalog / Seating / Payment (ports)
//!                 │
//!                 ▼
//!           Store (orders, tickets, outbox)
//!                 ▲
//!                 │
//!         Outbox Dispatcher → Notification (port)
//! ```
//!
//! # Components
//!
//! - **Daemon**: wiring and lifecycle (store, clients, workers, API server)
//! - **API**: axum router, correlation middleware, health and metrics
//! - **Outbox Dispatcher**: background drain of undispatched outbox rows
//! - **Config**: environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use boxofficed::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config).expect("Failed to wire daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod outbox_worker;

// Re-exports for convenience
pub use config::{ApiConfig, Config, Environment, OrdersConfig, OutboxConfig, ServicesConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use outbox_worker::OutboxDispatcher;
