//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access. Composite mutations take
//! every lock they need before touching state, so a reader never observes an
//! order transition without its outbox row.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use boxoffice_domain::{
    EventId, NewOrder, NewTicket, Order, OrderId, OrderStatus, OutboxEvent, PaymentStatus,
    Ticket, TicketId, UserId,
};

use crate::error::StoreError;
use crate::repository::{OrderStatistics, OrderStore, Page};

/// In-memory store for testing and development
pub struct MemoryStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    tickets: RwLock<HashMap<TicketId, Ticket>>,
    outbox: RwLock<Vec<OutboxEvent>>,
    order_seq: AtomicI64,
    ticket_seq: AtomicI64,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            tickets: RwLock::new(HashMap::new()),
            outbox: RwLock::new(Vec::new()),
            order_seq: AtomicI64::new(0),
            ticket_seq: AtomicI64::new(0),
        }
    }

    /// Get the number of orders
    pub fn order_count(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Get the number of tickets
    pub fn ticket_count(&self) -> usize {
        self.tickets.read().unwrap().len()
    }

    /// Get the number of outbox rows (dispatched or not)
    pub fn outbox_count(&self) -> usize {
        self.outbox.read().unwrap().len()
    }

    /// All outbox rows, append order (useful for test assertions)
    pub fn outbox_rows(&self) -> Vec<OutboxEvent> {
        self.outbox.read().unwrap().clone()
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        self.orders.write().unwrap().clear();
        self.tickets.write().unwrap().clear();
        self.outbox.write().unwrap().clear();
        self.order_seq.store(0, Ordering::SeqCst);
        self.ticket_seq.store(0, Ordering::SeqCst);
    }

    fn issue_tickets(
        tickets_map: &mut HashMap<TicketId, Ticket>,
        seq: &AtomicI64,
        new_tickets: Vec<NewTicket>,
    ) -> Vec<Ticket> {
        new_tickets
            .into_iter()
            .map(|t| {
                let ticket_id = seq.fetch_add(1, Ordering::SeqCst) + 1;
                let ticket = Ticket {
                    ticket_id,
                    order_id: t.order_id,
                    event_id: t.event_id,
                    seat_id: t.seat_id,
                    price_paid: t.price_paid,
                };
                tickets_map.insert(ticket_id, ticket.clone());
                ticket
            })
            .collect()
    }

    fn sorted_by_id(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by_key(|o| o.order_id);
        orders
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        // Check-and-insert under one write lock: the arbiter for concurrent
        // creations with the same idempotency key.
        let mut orders = self.orders.write().unwrap();

        if let Some(key) = &order.idempotency_key {
            if orders.values().any(|o| o.idempotency_key.as_deref() == Some(key)) {
                return Err(StoreError::DuplicateIdempotencyKey(key.clone()));
            }
        }

        let order_id = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let persisted = Order {
            order_id,
            user_id: order.user_id,
            event_id: order.event_id,
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            order_total: order.order_total,
            idempotency_key: order.idempotency_key,
            created_at: now,
            updated_at: now,
        };
        orders.insert(order_id, persisted.clone());

        Ok(persisted)
    }

    async fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().unwrap();
        if !orders.contains_key(&order.order_id) {
            return Err(StoreError::not_found("order", order.order_id));
        }
        orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().unwrap().get(&order_id).cloned())
    }

    async fn find_order_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .values()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        Ok(Self::sorted_by_id(
            orders.values().filter(|o| o.user_id == user_id).cloned().collect(),
        ))
    }

    async fn find_orders_by_event(&self, event_id: EventId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        Ok(Self::sorted_by_id(
            orders.values().filter(|o| o.event_id == event_id).cloned().collect(),
        ))
    }

    async fn find_confirmed_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        Ok(Self::sorted_by_id(
            orders
                .values()
                .filter(|o| o.event_id == event_id && o.status == OrderStatus::Confirmed)
                .cloned()
                .collect(),
        ))
    }

    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().unwrap();
        let sorted = Self::sorted_by_id(orders.values().cloned().collect());

        Ok(sorted
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect())
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        Ok(self.orders.read().unwrap().len() as u64)
    }

    async fn order_statistics(&self) -> Result<OrderStatistics, StoreError> {
        let orders = self.orders.read().unwrap();
        let tickets = self.tickets.read().unwrap();

        let mut stats = OrderStatistics {
            total_orders: orders.len() as u64,
            confirmed: 0,
            cancelled: 0,
            refunded: 0,
            fulfillment_failed: 0,
            total_revenue: Decimal::ZERO,
            total_refunded: Decimal::ZERO,
            tickets_issued: tickets.len() as u64,
        };

        for order in orders.values() {
            match order.status {
                OrderStatus::Confirmed => {
                    stats.confirmed += 1;
                    stats.total_revenue += order.order_total;
                },
                OrderStatus::Cancelled => stats.cancelled += 1,
                OrderStatus::Refunded => {
                    stats.refunded += 1;
                    stats.total_refunded += order.order_total;
                },
                OrderStatus::PaymentCompletedButFulfillmentFailed => {
                    stats.fulfillment_failed += 1;
                },
                OrderStatus::Created => {},
            }
        }

        Ok(stats)
    }

    async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets.read().unwrap().get(&ticket_id).cloned())
    }

    async fn find_tickets_by_order(&self, order_id: OrderId) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().unwrap();
        let mut found: Vec<Ticket> =
            tickets.values().filter(|t| t.order_id == order_id).cloned().collect();
        found.sort_by_key(|t| t.ticket_id);
        Ok(found)
    }

    async fn find_tickets_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().unwrap();
        let mut found: Vec<Ticket> =
            tickets.values().filter(|t| t.event_id == event_id).cloned().collect();
        found.sort_by_key(|t| t.ticket_id);
        Ok(found)
    }

    async fn confirm_order(
        &self,
        order: &Order,
        tickets: Vec<NewTicket>,
        event: OutboxEvent,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut orders = self.orders.write().unwrap();
        let mut tickets_map = self.tickets.write().unwrap();
        let mut outbox = self.outbox.write().unwrap();

        if !orders.contains_key(&order.order_id) {
            return Err(StoreError::not_found("order", order.order_id));
        }

        orders.insert(order.order_id, order.clone());
        let issued = Self::issue_tickets(&mut tickets_map, &self.ticket_seq, tickets);
        outbox.push(event);

        Ok(issued)
    }

    async fn update_order_with_event(
        &self,
        order: &Order,
        event: OutboxEvent,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write().unwrap();
        let mut outbox = self.outbox.write().unwrap();

        if !orders.contains_key(&order.order_id) {
            return Err(StoreError::not_found("order", order.order_id));
        }

        orders.insert(order.order_id, order.clone());
        outbox.push(event);

        Ok(())
    }

    async fn fetch_undispatched(&self, limit: u32) -> Result<Vec<OutboxEvent>, StoreError> {
        Ok(self
            .outbox
            .read()
            .unwrap()
            .iter()
            .filter(|e| !e.dispatched)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, event_id: Uuid) -> Result<(), StoreError> {
        let mut outbox = self.outbox.write().unwrap();
        match outbox.iter_mut().find(|e| e.id == event_id) {
            Some(event) => {
                event.dispatched = true;
                Ok(())
            },
            None => Err(StoreError::not_found("outbox event", event_id)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_domain::{CorrelationId, OutboxEventType};
    use rust_decimal_macros::dec;

    fn new_order(key: Option<&str>) -> NewOrder {
        NewOrder {
            user_id: 1,
            event_id: 25,
            order_total: dec!(105.00),
            idempotency_key: key.map(String::from),
        }
    }

    fn outbox_event(order_id: OrderId) -> OutboxEvent {
        OutboxEvent::for_order(
            order_id,
            OutboxEventType::OrderConfirmed,
            serde_json::json!({"order_id": order_id}),
            &CorrelationId::new(),
        )
    }

    #[tokio::test]
    async fn test_insert_assigns_dense_ids() {
        let store = MemoryStore::new();

        let first = store.insert_order(new_order(None)).await.unwrap();
        let second = store.insert_order(new_order(None)).await.unwrap();

        assert_eq!(first.order_id, 1);
        assert_eq!(second.order_id, 2);
        assert_eq!(first.status, OrderStatus::Created);
        assert_eq!(first.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected() {
        let store = MemoryStore::new();

        store.insert_order(new_order(Some("k-42"))).await.unwrap();
        let err = store.insert_order(new_order(Some("k-42"))).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateIdempotencyKey(k) if k == "k-42"));
        assert_eq!(store.order_count(), 1);

        // A different key is fine.
        store.insert_order(new_order(Some("k-43"))).await.unwrap();
        assert_eq!(store.order_count(), 2);
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key() {
        let store = MemoryStore::new();
        let inserted = store.insert_order(new_order(Some("k-1"))).await.unwrap();

        let found = store.find_order_by_idempotency_key("k-1").await.unwrap();
        assert_eq!(found, Some(inserted));
        assert_eq!(store.find_order_by_idempotency_key("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_confirm_order_is_joint() {
        let store = MemoryStore::new();
        let mut order = store.insert_order(new_order(None)).await.unwrap();
        order.confirm(Utc::now());

        let issued = store
            .confirm_order(
                &order,
                vec![
                    NewTicket {
                        order_id: order.order_id,
                        event_id: 25,
                        seat_id: "A-1".to_string(),
                        price_paid: dec!(50.00),
                    },
                    NewTicket {
                        order_id: order.order_id,
                        event_id: 25,
                        seat_id: "A-2".to_string(),
                        price_paid: dec!(50.00),
                    },
                ],
                outbox_event(order.order_id),
            )
            .await
            .unwrap();

        assert_eq!(issued.len(), 2);
        assert_eq!(issued[0].ticket_id, 1);
        assert_eq!(store.find_order(order.order_id).await.unwrap().unwrap().status, OrderStatus::Confirmed);
        assert_eq!(store.find_tickets_by_order(order.order_id).await.unwrap().len(), 2);
        assert_eq!(store.fetch_undispatched(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_dispatched() {
        let store = MemoryStore::new();
        let mut order = store.insert_order(new_order(None)).await.unwrap();
        order.confirm(Utc::now());
        let event = outbox_event(order.order_id);
        let event_id = event.id;
        store.update_order_with_event(&order, event).await.unwrap();

        store.mark_dispatched(event_id).await.unwrap();

        assert!(store.fetch_undispatched(10).await.unwrap().is_empty());
        assert!(store.outbox_rows()[0].dispatched);
    }

    #[tokio::test]
    async fn test_list_orders_pagination() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store.insert_order(new_order(None)).await.unwrap();
        }

        let page = store.list_orders(Page::clamped(2, 2)).await.unwrap();
        let ids: Vec<OrderId> = page.iter().map(|o| o.order_id).collect();

        assert_eq!(ids, vec![3, 4]);
        assert_eq!(store.count_orders().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_statistics_aggregate_by_status() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut confirmed = store.insert_order(new_order(None)).await.unwrap();
        confirmed.confirm(now);
        store.update_order(&confirmed).await.unwrap();

        let mut refunded = store.insert_order(new_order(None)).await.unwrap();
        refunded.confirm(now);
        refunded.refund(now);
        store.update_order(&refunded).await.unwrap();

        let mut cancelled = store.insert_order(new_order(None)).await.unwrap();
        cancelled.cancel(Some(PaymentStatus::Failed), now);
        store.update_order(&cancelled).await.unwrap();

        let stats = store.order_statistics().await.unwrap();

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.refunded, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_revenue, dec!(105.00));
        assert_eq!(stats.total_refunded, dec!(105.00));
    }
}
