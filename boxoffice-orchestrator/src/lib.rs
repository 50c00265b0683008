//! Order orchestration for the boxoffice service.
//!
//! The orchestrator runs the booking saga: validate the event, hold seats,
//! charge the user, allocate, issue tickets, and append lifecycle events to
//! the outbox. Compensation (release, refund) runs in the error branch of
//! each fallible stage. It exclusively owns Order and Ticket mutations.

#![warn(clippy::all)]

pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod types;

pub use error::{OrchestratorError, OrchestratorResult};
pub use metrics::OrderMetrics;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use types::{CreateOrderRequest, EventCancellationSummary, OrderReceipt};
