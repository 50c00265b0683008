//! The order saga.
//!
//! `create_order` runs a linear sequence of fallible stages:
//!
//! ```text
//! probe -> validate event -> validate seats -> reserve -> total ->
//! insert -> charge -> allocate -> confirm (+tickets, +outbox)
//! ```
//!
//! Compensation runs in the error branch of the stage that failed: a refused
//! charge releases the reservation and cancels the order; a post-payment
//! failure attempts a refund, and a failed refund parks the order in the
//! operator-owned sink state. Every stage logs with the request correlation
//! id.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};
use uuid::Uuid;

use boxoffice_clients::{
    AllocateSeatsRequest, CatalogPort, ChargeRequest, ChargeStatus, EventInfo, EventStatus,
    PaymentPort, RefundRequest, ReleaseSeatsRequest, ReserveSeatsRequest, Seat, SeatingPort,
};
use boxoffice_domain::{
    CorrelationId, EventId, NewOrder, NewTicket, Order, OrderEvent, OrderId, PaymentStatus,
    Ticket,
};
use boxoffice_store::{OrderStore, StoreError};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::metrics::OrderMetrics;
use crate::types::{CreateOrderRequest, EventCancellationSummary, OrderReceipt};

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for the saga.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tax applied to the seat subtotal
    pub tax_rate: Decimal,
    /// Seat hold duration passed to the seating service; expiry is owned
    /// by seating
    pub reservation_ttl_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tax_rate: dec!(0.05),
            reservation_ttl_seconds: 900,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// The saga engine. Owns all Order/Ticket mutations and outbox appends.
pub struct Orchestrator {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogPort>,
    seating: Arc<dyn SeatingPort>,
    payment: Arc<dyn PaymentPort>,
    metrics: OrderMetrics,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators.
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogPort>,
        seating: Arc<dyn SeatingPort>,
        payment: Arc<dyn PaymentPort>,
        metrics: OrderMetrics,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            seating,
            payment,
            metrics,
            config,
        }
    }

    /// The store this orchestrator writes through.
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    // =========================================================================
    // CreateOrder
    // =========================================================================

    /// Create an order for a seat selection.
    ///
    /// Idempotent under `idempotency_key`: a replay returns the stored order
    /// without repeating any external call.
    ///
    /// # Errors
    /// See `OrchestratorError`; compensation has already run by the time an
    /// error is returned.
    pub async fn create_order(
        &self,
        req: CreateOrderRequest,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<OrderReceipt> {
        req.validate()?;

        // 1. Idempotency probe.
        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.store.find_order_by_idempotency_key(key).await? {
                info!(
                    correlation_id = %correlation,
                    order_id = existing.order_id,
                    idempotency_key = %key,
                    "Idempotent replay, returning stored order"
                );
                return self.receipt(existing).await;
            }
        }

        // 2. Event validation.
        let event_info = self
            .catalog
            .get_event(req.event_id, correlation)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("Event not found: {}", req.event_id))
            })?;

        if event_info.status != EventStatus::OnSale {
            return Err(OrchestratorError::NotSellable(format!(
                "Event {} is not on sale (status: {:?})",
                req.event_id, event_info.status
            )));
        }

        // 3. Seat validation. Retain the priced seat records for totaling.
        let available = self.seating.get_seats(req.event_id, correlation).await?;
        let selected = Self::match_seats(&req, &available)?;

        // 4. Seat reservation.
        self.reserve_seats(&req, correlation).await?;

        // 5-6. Totals and order insert.
        let totals = boxoffice_domain::OrderTotals::calculate(
            selected.iter().map(|s| s.price),
            self.config.tax_rate,
        );

        let order = match self
            .store
            .insert_order(NewOrder {
                user_id: req.user_id,
                event_id: req.event_id,
                order_total: totals.total,
                idempotency_key: req.idempotency_key.clone(),
            })
            .await
        {
            Ok(order) => order,
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                // Lost the race against a concurrent creation with the same
                // key: drop our hold and return the winner's order.
                self.release_seats_best_effort(&req, correlation).await;
                let winner = self
                    .store
                    .find_order_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| {
                        OrchestratorError::Conflict(format!(
                            "Concurrent order creation under idempotency key {}",
                            key
                        ))
                    })?;

                info!(
                    correlation_id = %correlation,
                    order_id = winner.order_id,
                    idempotency_key = %key,
                    "Idempotency race lost, returning winner"
                );
                return self.receipt(winner).await;
            },
            Err(err) => return Err(err.into()),
        };

        self.metrics.orders_total.inc();
        info!(
            correlation_id = %correlation,
            order_id = order.order_id,
            user_id = order.user_id,
            event_id = order.event_id,
            total = %order.order_total,
            "Order created, charging payment"
        );

        // 7. Payment.
        let charge = ChargeRequest {
            order_id: order.order_id,
            user_id: order.user_id,
            amount: order.order_total,
            idempotency_key: req
                .idempotency_key
                .clone()
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
        };

        match self.payment.charge(&charge, correlation).await {
            Ok(resp) if resp.success && resp.status == ChargeStatus::Success => {
                // 8. Allocate path.
                self.fulfill(order, &event_info, &selected, &req, correlation)
                    .await
            },
            Ok(resp) => {
                // 9. Release-and-cancel path: terminal refusal.
                let message = resp.message.clone();
                self.release_and_cancel(order, &req, &message, correlation)
                    .await?;
                Err(OrchestratorError::PaymentFailed(message))
            },
            Err(err) => {
                // 9. Release-and-cancel path: transport failure or timeout.
                let message = err.to_string();
                self.release_and_cancel(order, &req, &message, correlation)
                    .await?;
                Err(OrchestratorError::Upstream(message))
            },
        }
    }

    /// Match requested seat ids against the seating service's seat list.
    fn match_seats(
        req: &CreateOrderRequest,
        available: &[Seat],
    ) -> OrchestratorResult<Vec<Seat>> {
        req.seat_ids
            .iter()
            .map(|seat_id| {
                available
                    .iter()
                    .find(|s| &s.seat_id == seat_id)
                    .cloned()
                    .ok_or_else(|| {
                        OrchestratorError::NotFound(format!(
                            "Seat not found for event {}: {}",
                            req.event_id, seat_id
                        ))
                    })
            })
            .collect()
    }

    async fn reserve_seats(
        &self,
        req: &CreateOrderRequest,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<()> {
        let reserve = ReserveSeatsRequest {
            event_id: req.event_id,
            seat_ids: req.seat_ids.clone(),
            user_id: req.user_id,
            ttl_seconds: self.config.reservation_ttl_seconds,
        };

        let outcome = match self.seating.reserve_seats(&reserve, correlation).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.metrics.seat_reservations_failed.inc();
                return Err(err.into());
            },
        };

        if !outcome.success {
            self.metrics.seat_reservations_failed.inc();
            return Err(OrchestratorError::SeatUnavailable(outcome.message));
        }

        Ok(())
    }

    /// Allocate, confirm, and issue tickets after a successful charge.
    /// Any failure here is a post-payment hazard and goes through refund
    /// compensation.
    async fn fulfill(
        &self,
        order: Order,
        event_info: &EventInfo,
        seats: &[Seat],
        req: &CreateOrderRequest,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<OrderReceipt> {
        match self
            .allocate_and_confirm(order.clone(), event_info, seats, req, correlation)
            .await
        {
            Ok(receipt) => {
                info!(
                    correlation_id = %correlation,
                    order_id = receipt.order.order_id,
                    tickets = receipt.tickets.len(),
                    "Order confirmed"
                );
                Ok(receipt)
            },
            Err(cause) => {
                let message = cause.to_string();
                self.compensate_after_payment(order, req, &message, correlation)
                    .await
            },
        }
    }

    async fn allocate_and_confirm(
        &self,
        mut order: Order,
        event_info: &EventInfo,
        seats: &[Seat],
        req: &CreateOrderRequest,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<OrderReceipt> {
        let allocate = AllocateSeatsRequest {
            event_id: req.event_id,
            user_id: req.user_id,
            seat_ids: req.seat_ids.clone(),
        };
        let outcome = self.seating.allocate_seats(&allocate, correlation).await?;
        if !outcome.success {
            return Err(OrchestratorError::FulfillmentFailed(format!(
                "Seat allocation refused: {}",
                outcome.message
            )));
        }

        let now = Utc::now();
        order.confirm(now);

        let tickets: Vec<NewTicket> = seats
            .iter()
            .map(|seat| NewTicket {
                order_id: order.order_id,
                event_id: order.event_id,
                seat_id: seat.seat_id.clone(),
                price_paid: seat.price,
            })
            .collect();

        let event = OrderEvent::OrderConfirmed {
            order_id: order.order_id,
            user_id: order.user_id,
            event_id: order.event_id,
            event_title: event_info.title.clone(),
            order_total: order.order_total,
            seat_ids: req.seat_ids.clone(),
            confirmed_at: now,
            correlation_id: correlation.clone(),
        }
        .into_outbox();

        let issued = self.store.confirm_order(&order, tickets, event).await?;

        Ok(OrderReceipt {
            order,
            tickets: issued,
        })
    }

    /// Refund compensation for a failure after a successful charge.
    ///
    /// Attempted exactly once. A failed refund parks the order in
    /// PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED with an operator alert and
    /// no outbox event, because business state is unresolved.
    async fn compensate_after_payment(
        &self,
        mut order: Order,
        req: &CreateOrderRequest,
        cause: &str,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<OrderReceipt> {
        warn!(
            correlation_id = %correlation,
            order_id = order.order_id,
            cause,
            "Fulfillment failed after successful payment, attempting refund"
        );

        self.release_seats_best_effort(req, correlation).await;

        let refund = RefundRequest {
            order_id: order.order_id,
            amount: order.order_total,
            reason: format!("Fulfillment failed: {}", cause),
        };

        let refunded = match self.payment.refund(&refund, correlation).await {
            Ok(resp) if resp.success => true,
            Ok(resp) => {
                warn!(
                    correlation_id = %correlation,
                    order_id = order.order_id,
                    message = %resp.message,
                    "Compensating refund refused"
                );
                false
            },
            Err(err) => {
                warn!(
                    correlation_id = %correlation,
                    order_id = order.order_id,
                    error = %err,
                    "Compensating refund errored"
                );
                false
            },
        };

        let now = Utc::now();
        if refunded {
            order.refund(now);
            let event = OrderEvent::OrderRefunded {
                order_id: order.order_id,
                user_id: order.user_id,
                event_id: order.event_id,
                amount: order.order_total,
                reason: refund.reason.clone(),
                refunded_at: now,
                correlation_id: correlation.clone(),
            }
            .into_outbox();
            self.store.update_order_with_event(&order, event).await?;

            Err(OrchestratorError::FulfillmentFailed(format!(
                "{} (payment refunded)",
                cause
            )))
        } else {
            order.mark_fulfillment_failed(now);
            self.store.update_order(&order).await?;

            error!(
                correlation_id = %correlation,
                order_id = order.order_id,
                amount = %order.order_total,
                cause,
                "OPERATOR ALERT: payment captured but fulfillment and refund both failed"
            );

            Err(OrchestratorError::FulfillmentFailed(format!(
                "{} (refund also failed, operator intervention required)",
                cause
            )))
        }
    }

    /// Release the reservation, cancel the order, and append OrderCancelled
    /// after a charge refusal or payment transport failure.
    async fn release_and_cancel(
        &self,
        mut order: Order,
        req: &CreateOrderRequest,
        failure_message: &str,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<()> {
        self.release_seats_best_effort(req, correlation).await;

        let now = Utc::now();
        order.cancel(Some(PaymentStatus::Failed), now);
        self.metrics.payments_failed_total.inc();

        let event = OrderEvent::OrderCancelled {
            order_id: order.order_id,
            user_id: order.user_id,
            event_id: order.event_id,
            reason: failure_message.to_string(),
            cancelled_at: now,
            correlation_id: correlation.clone(),
        }
        .into_outbox();
        self.store.update_order_with_event(&order, event).await?;

        info!(
            correlation_id = %correlation,
            order_id = order.order_id,
            reason = failure_message,
            "Order cancelled after payment failure"
        );

        Ok(())
    }

    /// Best-effort seat release: never fails the parent operation.
    async fn release_seats_best_effort(
        &self,
        req: &CreateOrderRequest,
        correlation: &CorrelationId,
    ) {
        let release = ReleaseSeatsRequest {
            event_id: req.event_id,
            user_id: req.user_id,
            seat_ids: req.seat_ids.clone(),
        };

        if let Err(err) = self.seating.release_seats(&release, correlation).await {
            warn!(
                correlation_id = %correlation,
                event_id = req.event_id,
                error = %err,
                "Seat release failed (continuing)"
            );
        }
    }

    // =========================================================================
    // CancelOrder
    // =========================================================================

    /// Cancel an order, refunding it when it was already paid.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<OrderReceipt> {
        let mut order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("Order not found: {}", order_id)))?;

        match order.status {
            boxoffice_domain::OrderStatus::Cancelled => {
                return Err(OrchestratorError::Conflict(format!(
                    "Order already cancelled: {}",
                    order_id
                )));
            },
            boxoffice_domain::OrderStatus::Refunded => {
                return Err(OrchestratorError::Conflict(format!(
                    "Order already refunded: {}",
                    order_id
                )));
            },
            _ => {},
        }

        // Free the seats before touching payment; failures never block the
        // cancel.
        let tickets = self.store.find_tickets_by_order(order_id).await?;
        if !tickets.is_empty() {
            let release = ReleaseSeatsRequest {
                event_id: order.event_id,
                user_id: order.user_id,
                seat_ids: tickets.iter().map(|t| t.seat_id.clone()).collect(),
            };
            if let Err(err) = self.seating.release_seats(&release, correlation).await {
                warn!(
                    correlation_id = %correlation,
                    order_id,
                    error = %err,
                    "Seat release failed during cancel (continuing)"
                );
            }
        }

        let now = Utc::now();
        if order.payment_status == PaymentStatus::Success {
            let refund = RefundRequest {
                order_id,
                amount: order.order_total,
                reason: "Order cancelled".to_string(),
            };

            match self.payment.refund(&refund, correlation).await {
                Ok(resp) if resp.success => {
                    order.refund(now);
                    let event = OrderEvent::OrderRefunded {
                        order_id,
                        user_id: order.user_id,
                        event_id: order.event_id,
                        amount: order.order_total,
                        reason: refund.reason,
                        refunded_at: now,
                        correlation_id: correlation.clone(),
                    }
                    .into_outbox();
                    self.store.update_order_with_event(&order, event).await?;

                    info!(
                        correlation_id = %correlation,
                        order_id,
                        amount = %order.order_total,
                        "Order cancelled and refunded"
                    );
                },
                outcome => {
                    let detail = match outcome {
                        Ok(resp) => resp.message,
                        Err(err) => err.to_string(),
                    };

                    order.cancel(None, now);
                    let event = OrderEvent::OrderCancelled {
                        order_id,
                        user_id: order.user_id,
                        event_id: order.event_id,
                        reason: format!("Cancelled; refund failed: {}", detail),
                        cancelled_at: now,
                        correlation_id: correlation.clone(),
                    }
                    .into_outbox();
                    self.store.update_order_with_event(&order, event).await?;

                    error!(
                        correlation_id = %correlation,
                        order_id,
                        amount = %order.order_total,
                        detail = %detail,
                        "OPERATOR ALERT: order cancelled but refund failed"
                    );
                },
            }
        } else {
            order.cancel(None, now);
            let event = OrderEvent::OrderCancelled {
                order_id,
                user_id: order.user_id,
                event_id: order.event_id,
                reason: "Cancelled by user".to_string(),
                cancelled_at: now,
                correlation_id: correlation.clone(),
            }
            .into_outbox();
            self.store.update_order_with_event(&order, event).await?;

            info!(correlation_id = %correlation, order_id, "Order cancelled");
        }

        self.receipt(order).await
    }

    // =========================================================================
    // HandleEventCancelled
    // =========================================================================

    /// Refund every confirmed order for a cancelled event.
    ///
    /// Individual refund failures do not abort the batch; they stay
    /// Confirmed and are retried on the next webhook delivery.
    pub async fn handle_event_cancelled(
        &self,
        event_id: EventId,
        reason: &str,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<EventCancellationSummary> {
        let orders = self.store.find_confirmed_by_event(event_id).await?;

        let mut summary = EventCancellationSummary {
            refunded: 0,
            failed: 0,
            total_refunded: Decimal::ZERO,
        };

        for order in orders {
            let order_id = order.order_id;
            let amount = order.order_total;
            match self.refund_for_event(order, reason, correlation).await {
                Ok(()) => {
                    summary.refunded += 1;
                    summary.total_refunded += amount;
                },
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        correlation_id = %correlation,
                        event_id,
                        order_id,
                        error = %err,
                        "Refund failed during event cancellation (order left confirmed)"
                    );
                },
            }
        }

        info!(
            correlation_id = %correlation,
            event_id,
            success = summary.refunded,
            failure = summary.failed,
            total_refunded = %summary.total_refunded,
            "Event cancellation batch complete"
        );

        Ok(summary)
    }

    async fn refund_for_event(
        &self,
        mut order: Order,
        reason: &str,
        correlation: &CorrelationId,
    ) -> OrchestratorResult<()> {
        let refund = RefundRequest {
            order_id: order.order_id,
            amount: order.order_total,
            reason: reason.to_string(),
        };

        let resp = self.payment.refund(&refund, correlation).await?;
        if !resp.success {
            return Err(OrchestratorError::PaymentFailed(resp.message));
        }

        let now = Utc::now();
        order.refund(now);
        let event = OrderEvent::OrderRefunded {
            order_id: order.order_id,
            user_id: order.user_id,
            event_id: order.event_id,
            amount: order.order_total,
            reason: reason.to_string(),
            refunded_at: now,
            correlation_id: correlation.clone(),
        }
        .into_outbox();
        self.store.update_order_with_event(&order, event).await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot an order with its tickets.
    pub async fn receipt(&self, order: Order) -> OrchestratorResult<OrderReceipt> {
        let tickets = self.store.find_tickets_by_order(order.order_id).await?;
        Ok(OrderReceipt { order, tickets })
    }

    /// Load an order snapshot by id.
    pub async fn get_order(&self, order_id: OrderId) -> OrchestratorResult<OrderReceipt> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("Order not found: {}", order_id)))?;
        self.receipt(order).await
    }

    /// Load all order snapshots for a user.
    pub async fn get_orders_by_user(
        &self,
        user_id: i64,
    ) -> OrchestratorResult<Vec<OrderReceipt>> {
        let orders = self.store.find_orders_by_user(user_id).await?;
        let mut receipts = Vec::with_capacity(orders.len());
        for order in orders {
            receipts.push(self.receipt(order).await?);
        }
        Ok(receipts)
    }

    /// Load all order snapshots for a catalog event.
    pub async fn get_orders_by_event(
        &self,
        event_id: EventId,
    ) -> OrchestratorResult<Vec<OrderReceipt>> {
        let orders = self.store.find_orders_by_event(event_id).await?;
        let mut receipts = Vec::with_capacity(orders.len());
        for order in orders {
            receipts.push(self.receipt(order).await?);
        }
        Ok(receipts)
    }

    /// Load a ticket by id.
    pub async fn get_ticket(&self, ticket_id: i64) -> OrchestratorResult<Ticket> {
        self.store
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("Ticket not found: {}", ticket_id)))
    }
}
