//! Outbox dispatcher: drains undispatched outbox rows to the notification
//! service.
//!
//! Runs on service start and then on a fixed interval. Each tick snapshots
//! the undispatched rows and dispatches them concurrently, one task per row.
//! A row is marked dispatched only after the notification service accepted
//! it; failures leave the row in place for the next tick, so delivery is
//! at-least-once and consumers dedupe by event id.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use boxoffice_clients::NotificationPort;
use boxoffice_domain::{CorrelationId, OutboxEvent};
use boxoffice_store::OrderStore;

use crate::error::DaemonResult;

/// Outbox dispatcher worker.
pub struct OutboxDispatcher {
    store: Arc<dyn OrderStore>,
    notification: Arc<dyn NotificationPort>,
    dispatch_interval: Duration,
    batch_limit: u32,
}

impl OutboxDispatcher {
    /// Create a new dispatcher.
    pub fn new(
        store: Arc<dyn OrderStore>,
        notification: Arc<dyn NotificationPort>,
        dispatch_interval: Duration,
        batch_limit: u32,
    ) -> Self {
        Self {
            store,
            notification,
            dispatch_interval,
            batch_limit,
        }
    }

    /// Run the dispatcher loop.
    ///
    /// Ticks immediately on start, then every `dispatch_interval`. A tick
    /// that outlives the interval makes the following tick skip rather than
    /// pile up. Returns when shutdown is signaled via the cancellation token.
    pub async fn run(self, shutdown: CancellationToken) -> DaemonResult<()> {
        info!(
            interval_secs = self.dispatch_interval.as_secs_f64(),
            batch_limit = self.batch_limit,
            "Outbox dispatcher started"
        );

        let mut ticker = interval(self.dispatch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Outbox dispatcher shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    match self.dispatch_pending().await {
                        Ok(count) if count > 0 => {
                            debug!(count, "Dispatched outbox events");
                        }
                        Err(e) => {
                            warn!(error = %e, "Outbox tick failed (will retry)");
                        }
                        _ => {}
                    }
                }
            }
        }

        info!("Outbox dispatcher stopped");
        Ok(())
    }

    /// One tick: snapshot undispatched rows and dispatch them concurrently.
    ///
    /// Returns the number of rows successfully dispatched and marked.
    pub async fn dispatch_pending(&self) -> DaemonResult<usize> {
        let pending = self.store.fetch_undispatched(self.batch_limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!(count = pending.len(), "Dispatching outbox events");

        let mut tasks = JoinSet::new();
        for event in pending {
            let store = Arc::clone(&self.store);
            let notification = Arc::clone(&self.notification);
            tasks.spawn(async move { dispatch_one(store, notification, event).await });
        }

        let mut dispatched = 0;
        while let Some(result) = tasks.join_next().await {
            if matches!(result, Ok(true)) {
                dispatched += 1;
            }
        }

        Ok(dispatched)
    }
}

/// Deliver one row and flip its dispatched flag.
///
/// A failure after delivery but before the flag write leaves the row for
/// redelivery; consumers dedupe by event id.
async fn dispatch_one(
    store: Arc<dyn OrderStore>,
    notification: Arc<dyn NotificationPort>,
    event: OutboxEvent,
) -> bool {
    let correlation = CorrelationId::from_header(&event.correlation_id);

    if let Err(err) = notification.send_event(&event, &correlation).await {
        warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            error = %err,
            "Outbox dispatch failed (will retry)"
        );
        return false;
    }

    match store.mark_dispatched(event.id).await {
        Ok(()) => {
            debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Outbox event dispatched"
            );
            true
        },
        Err(err) => {
            warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %err,
                "Dispatched but failed to mark (duplicate delivery possible)"
            );
            false
        },
    }
}
