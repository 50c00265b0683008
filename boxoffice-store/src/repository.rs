//! Repository trait definitions (Ports)
//!
//! `OrderStore` is the storage interface for the orchestrator, the HTTP
//! layer, and the outbox dispatcher. Implementations are PostgreSQL or
//! in-memory for testing.
//!
//! The composite mutations (`insert_order`, `confirm_order`,
//! `update_order_with_event`) are each a single commit: an order transition
//! and the outbox event it produced are never visible separately.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use boxoffice_domain::{
    EventId, NewOrder, NewTicket, Order, OrderId, OutboxEvent, Ticket, TicketId, UserId,
};

use crate::error::StoreError;

// =============================================================================
// Pagination
// =============================================================================

/// A clamped pagination window over the order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub page: u32,
    /// Rows per page, 1..=100
    pub page_size: u32,
}

impl Page {
    /// Upper bound on rows per page.
    pub const MAX_PAGE_SIZE: u32 = 100;
    /// Page size used when the caller does not supply one.
    pub const DEFAULT_PAGE_SIZE: u32 = 50;

    /// Build a window from raw query values, clamping `page` to `>= 1` and
    /// `page_size` to `1..=100`.
    pub fn clamped(page: i64, page_size: i64) -> Self {
        Self {
            page: page.clamp(1, u32::MAX as i64) as u32,
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE as i64) as u32,
        }
    }

    /// Rows to skip before this window.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate view over all orders, backing the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatistics {
    /// Orders in any state
    pub total_orders: u64,
    /// Orders currently Confirmed
    pub confirmed: u64,
    /// Orders currently Cancelled
    pub cancelled: u64,
    /// Orders currently Refunded
    pub refunded: u64,
    /// Orders parked in the fulfillment-failed sink state
    pub fulfillment_failed: u64,
    /// Sum of totals over Confirmed orders
    pub total_revenue: Decimal,
    /// Sum of totals over Refunded orders
    pub total_refunded: Decimal,
    /// Tickets issued across all orders
    pub tickets_issued: u64,
}

// =============================================================================
// Order Store
// =============================================================================

/// Storage port for orders, tickets, and the outbox.
#[async_trait]
pub trait OrderStore: Send + Sync {
    // --- Orders ---

    /// Persist a new order in Created/Pending, assigning a dense id.
    ///
    /// # Errors
    /// `StoreError::DuplicateIdempotencyKey` when another order already holds
    /// the key; the unique index is the arbiter under concurrency.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Update an order without appending an event (the
    /// fulfillment-failed sink emits none).
    async fn update_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Find an order by id.
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Find an order by its idempotency key.
    async fn find_order_by_idempotency_key(&self, key: &str)
        -> Result<Option<Order>, StoreError>;

    /// All orders placed by a user.
    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// All orders against a catalog event.
    async fn find_orders_by_event(&self, event_id: EventId) -> Result<Vec<Order>, StoreError>;

    /// Confirmed orders against a catalog event (event-cancellation batch).
    async fn find_confirmed_by_event(&self, event_id: EventId) -> Result<Vec<Order>, StoreError>;

    /// One page of orders, oldest first.
    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError>;

    /// Total number of orders.
    async fn count_orders(&self) -> Result<u64, StoreError>;

    /// Aggregates for the statistics endpoint.
    async fn order_statistics(&self) -> Result<OrderStatistics, StoreError>;

    // --- Tickets ---

    /// Find a ticket by id.
    async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, StoreError>;

    /// Tickets issued for an order.
    async fn find_tickets_by_order(&self, order_id: OrderId) -> Result<Vec<Ticket>, StoreError>;

    /// Tickets issued for a catalog event.
    async fn find_tickets_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, StoreError>;

    // --- Transactional composites ---

    /// Commit a confirmation: order update, bulk ticket insert, and outbox
    /// append in one transaction. Returns the issued tickets.
    async fn confirm_order(
        &self,
        order: &Order,
        tickets: Vec<NewTicket>,
        event: OutboxEvent,
    ) -> Result<Vec<Ticket>, StoreError>;

    /// Commit a cancel/refund transition: order update and outbox append in
    /// one transaction.
    async fn update_order_with_event(
        &self,
        order: &Order,
        event: OutboxEvent,
    ) -> Result<(), StoreError>;

    // --- Outbox ---

    /// Snapshot of undispatched outbox rows, oldest first.
    async fn fetch_undispatched(&self, limit: u32) -> Result<Vec<OutboxEvent>, StoreError>;

    /// Flip an outbox row to dispatched. Owned by the dispatcher.
    async fn mark_dispatched(&self, event_id: Uuid) -> Result<(), StoreError>;

    // --- Health ---

    /// Readiness probe. The PostgreSQL store checks the pool; the memory
    /// store is always ready.
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_low() {
        let page = Page::clamped(0, 50);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 50);

        let page = Page::clamped(-3, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
    }

    #[test]
    fn test_page_clamps_high() {
        let page = Page::clamped(2, 500);
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, Page::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::clamped(1, 50).offset(), 0);
        assert_eq!(Page::clamped(3, 20).offset(), 40);
    }
}
