//! PostgreSQL store implementation.
//!
//! Runtime-bound queries over a shared `PgPool`. The composite mutations use
//! one transaction each: an order transition and the outbox row it produced
//! commit together or not at all. The partial unique index on
//! `orders.idempotency_key` is the arbiter for concurrent creations with the
//! same key; a 23505 surfaces as `StoreError::DuplicateIdempotencyKey`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use boxoffice_domain::{
    EventId, NewOrder, NewTicket, Order, OrderId, OrderStatus, OutboxEvent, OutboxEventType,
    PaymentStatus, Ticket, TicketId, UserId,
};

use crate::error::StoreError;
use crate::repository::{OrderStatistics, OrderStore, Page};

const ORDER_COLUMNS: &str = "order_id, user_id, event_id, status, payment_status, order_total, \
                             idempotency_key, created_at, updated_at";

const TICKET_COLUMNS: &str = "ticket_id, order_id, event_id, seat_id, price_paid";

/// PostgreSQL-backed order store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool (shared with migrations and health checks).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;

    Ok(Order {
        order_id: row.try_get::<i64, _>("order_id")?,
        user_id: row.try_get::<i64, _>("user_id")?,
        event_id: row.try_get::<i64, _>("event_id")?,
        status: OrderStatus::parse(&status)?,
        payment_status: PaymentStatus::parse(&payment_status)?,
        order_total: row.try_get::<Decimal, _>("order_total")?,
        idempotency_key: row.try_get::<Option<String>, _>("idempotency_key")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    Ok(Ticket {
        ticket_id: row.try_get::<i64, _>("ticket_id")?,
        order_id: row.try_get::<i64, _>("order_id")?,
        event_id: row.try_get::<i64, _>("event_id")?,
        seat_id: row.try_get::<String, _>("seat_id")?,
        price_paid: row.try_get::<Decimal, _>("price_paid")?,
    })
}

fn outbox_from_row(row: &PgRow) -> Result<OutboxEvent, StoreError> {
    let event_type: String = row.try_get("event_type")?;

    Ok(OutboxEvent {
        id: row.try_get::<Uuid, _>("id")?,
        aggregate_type: row.try_get::<String, _>("aggregate_type")?,
        aggregate_id: row.try_get::<String, _>("aggregate_id")?,
        event_type: OutboxEventType::parse(&event_type)?,
        payload: row.try_get::<serde_json::Value, _>("payload")?,
        correlation_id: row.try_get::<String, _>("correlation_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        dispatched: row.try_get::<bool, _>("dispatched")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some("23505")
    )
}

// =============================================================================
// Transaction helpers
// =============================================================================

async fn update_order_tx(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $1, payment_status = $2, order_total = $3, updated_at = $4
        WHERE order_id = $5
        "#,
    )
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.order_total)
    .bind(order.updated_at)
    .bind(order.order_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("order", order.order_id));
    }

    Ok(())
}

async fn append_outbox_tx(
    tx: &mut Transaction<'_, Postgres>,
    event: &OutboxEvent,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO outbox_events (
            id, aggregate_type, aggregate_id, event_type,
            payload, correlation_id, created_at, dispatched
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(event.id)
    .bind(&event.aggregate_type)
    .bind(&event.aggregate_id)
    .bind(event.event_type.as_str())
    .bind(&event.payload)
    .bind(&event.correlation_id)
    .bind(event.created_at)
    .bind(event.dispatched)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// OrderStore impl
// =============================================================================

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO orders (
                user_id, event_id, status, payment_status,
                order_total, idempotency_key, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.user_id)
        .bind(order.event_id)
        .bind(OrderStatus::Created.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(order.order_total)
        .bind(&order.idempotency_key)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => order_from_row(&row),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateIdempotencyKey(
                order.idempotency_key.unwrap_or_default(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        update_order_tx(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_order_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY order_id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn find_orders_by_event(&self, event_id: EventId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE event_id = $1 ORDER BY order_id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn find_confirmed_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE event_id = $1 AND status = $2 ORDER BY order_id"
        ))
        .bind(event_id)
        .bind(OrderStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn list_orders(&self, page: Page) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.page_size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn order_statistics(&self) -> Result<OrderStatistics, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE status = 'CONFIRMED') AS confirmed,
                COUNT(*) FILTER (WHERE status = 'CANCELLED') AS cancelled,
                COUNT(*) FILTER (WHERE status = 'REFUNDED') AS refunded,
                COUNT(*) FILTER (WHERE status = 'PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED')
                    AS fulfillment_failed,
                COALESCE(SUM(order_total) FILTER (WHERE status = 'CONFIRMED'), 0)
                    AS total_revenue,
                COALESCE(SUM(order_total) FILTER (WHERE status = 'REFUNDED'), 0)
                    AS total_refunded,
                (SELECT COUNT(*) FROM tickets) AS tickets_issued
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStatistics {
            total_orders: row.try_get::<i64, _>("total_orders")? as u64,
            confirmed: row.try_get::<i64, _>("confirmed")? as u64,
            cancelled: row.try_get::<i64, _>("cancelled")? as u64,
            refunded: row.try_get::<i64, _>("refunded")? as u64,
            fulfillment_failed: row.try_get::<i64, _>("fulfillment_failed")? as u64,
            total_revenue: row.try_get::<Decimal, _>("total_revenue")?,
            total_refunded: row.try_get::<Decimal, _>("total_refunded")?,
            tickets_issued: row.try_get::<i64, _>("tickets_issued")? as u64,
        })
    }

    async fn find_ticket(&self, ticket_id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_id = $1"
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn find_tickets_by_order(&self, order_id: OrderId) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY ticket_id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ticket_from_row).collect()
    }

    async fn find_tickets_by_event(&self, event_id: EventId) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE event_id = $1 ORDER BY ticket_id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(ticket_from_row).collect()
    }

    async fn confirm_order(
        &self,
        order: &Order,
        tickets: Vec<NewTicket>,
        event: OutboxEvent,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut tx = self.pool.begin().await?;

        update_order_tx(&mut tx, order).await?;

        let mut issued = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO tickets (order_id, event_id, seat_id, price_paid)
                VALUES ($1, $2, $3, $4)
                RETURNING {TICKET_COLUMNS}
                "#
            ))
            .bind(ticket.order_id)
            .bind(ticket.event_id)
            .bind(&ticket.seat_id)
            .bind(ticket.price_paid)
            .fetch_one(&mut *tx)
            .await?;

            issued.push(ticket_from_row(&row)?);
        }

        append_outbox_tx(&mut tx, &event).await?;
        tx.commit().await?;

        Ok(issued)
    }

    async fn update_order_with_event(
        &self,
        order: &Order,
        event: OutboxEvent,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        update_order_tx(&mut tx, order).await?;
        append_outbox_tx(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_undispatched(&self, limit: u32) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type,
                   payload, correlation_id, created_at, dispatched
            FROM outbox_events
            WHERE NOT dispatched
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(outbox_from_row).collect()
    }

    async fn mark_dispatched(&self, event_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE outbox_events SET dispatched = TRUE WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("outbox event", event_id));
        }

        Ok(())
    }

    async fn ready(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
