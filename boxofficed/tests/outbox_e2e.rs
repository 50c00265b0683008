//! Outbox dispatcher tests over the in-memory store and stub notification.
//!
//! Verifies at-least-once delivery: a stable adapter eventually gets every
//! appended event, a failing adapter gets none marked, and recovery
//! redelivers what was left behind.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use boxofficed::OutboxDispatcher;
use boxoffice_domain::CorrelationId;
use boxoffice_orchestrator::{
    CreateOrderRequest, Orchestrator, OrchestratorConfig, OrderMetrics,
};
use boxoffice_store::OrderStore;
use boxoffice_testkit::StubServices;

fn orchestrator(services: &StubServices) -> Orchestrator {
    Orchestrator::new(
        services.store.clone(),
        services.catalog.clone(),
        services.seating.clone(),
        services.payment.clone(),
        OrderMetrics::detached().expect("metrics"),
        OrchestratorConfig::default(),
    )
}

fn dispatcher(services: &StubServices) -> OutboxDispatcher {
    OutboxDispatcher::new(
        services.store.clone(),
        services.notification.clone(),
        Duration::from_millis(20),
        100,
    )
}

async fn confirm_order(services: &StubServices, seat: &str) {
    orchestrator(services)
        .create_order(
            CreateOrderRequest {
                user_id: 1,
                event_id: 25,
                seat_ids: vec![seat.to_string()],
                idempotency_key: None,
            },
            &CorrelationId::new(),
        )
        .await
        .expect("order should confirm");
}

#[tokio::test]
async fn stable_adapter_dispatches_every_event() {
    let services = StubServices::with_event(25, &[dec!(50.00), dec!(60.00)]);
    confirm_order(&services, "S-1").await;
    confirm_order(&services, "S-2").await;
    assert_eq!(services.store.outbox_count(), 2);

    let dispatched = dispatcher(&services).dispatch_pending().await.unwrap();

    assert_eq!(dispatched, 2);
    assert_eq!(services.notification.delivered_count(), 2);
    assert!(services.store.fetch_undispatched(10).await.unwrap().is_empty());
    assert!(services.store.outbox_rows().iter().all(|e| e.dispatched));
}

#[tokio::test]
async fn failing_adapter_marks_nothing() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    confirm_order(&services, "S-1").await;
    services.notification.set_failing(true);

    let dispatched = dispatcher(&services).dispatch_pending().await.unwrap();

    assert_eq!(dispatched, 0);
    assert_eq!(services.notification.delivered_count(), 0);
    // The row stays undispatched for the next tick.
    assert_eq!(services.store.fetch_undispatched(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn recovery_redelivers_leftover_events() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    confirm_order(&services, "S-1").await;

    let dispatcher = dispatcher(&services);

    services.notification.set_failing(true);
    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), 0);

    services.notification.set_failing(false);
    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), 1);
    assert_eq!(services.notification.delivered_count(), 1);
}

#[tokio::test]
async fn empty_outbox_is_a_quiet_tick() {
    let services = StubServices::new();

    let dispatched = dispatcher(&services).dispatch_pending().await.unwrap();

    assert_eq!(dispatched, 0);
    assert_eq!(services.notification.delivered_count(), 0);
}

#[tokio::test]
async fn run_loop_drains_and_stops_on_cancel() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    confirm_order(&services, "S-1").await;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(dispatcher(&services).run(shutdown.child_token()));

    // Give the first immediate tick time to drain the row.
    tokio::time::timeout(Duration::from_secs(5), async {
        while services.notification.delivered_count() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dispatcher should deliver within the timeout");

    shutdown.cancel();
    handle.await.expect("worker task").expect("worker result");

    assert!(services.store.outbox_rows().iter().all(|e| e.dispatched));
}
