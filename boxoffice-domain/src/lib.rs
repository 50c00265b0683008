//! Boxoffice Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the order/ticket/outbox entities, money arithmetic,
//! lifecycle events, and the request correlation id.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod correlation;
pub mod entities;
pub mod events;
pub mod money;

pub use correlation::CorrelationId;
pub use entities::{
    DomainError, EventId, NewOrder, NewTicket, Order, OrderId, OrderStatus, OutboxEvent,
    OutboxEventType, PaymentStatus, Ticket, TicketId, UserId,
};
pub use events::OrderEvent;
pub use money::{round_money, OrderTotals};
