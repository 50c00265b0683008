//! HTTP API tests over stub services and the in-memory store.
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use prometheus::Registry;
use rust_decimal_macros::dec;
use tower::ServiceExt;

use boxofficed::api::{create_router, ApiState};
use boxoffice_orchestrator::{Orchestrator, OrchestratorConfig, OrderMetrics};
use boxoffice_testkit::StubServices;

const CORRELATION_HEADER: &str = "X-Correlation-ID";

fn test_router(services: &StubServices) -> Router {
    let registry = Registry::new();
    let metrics = OrderMetrics::new(&registry).expect("metrics");
    let orchestrator = Arc::new(Orchestrator::new(
        services.store.clone(),
        services.catalog.clone(),
        services.seating.clone(),
        services.payment.clone(),
        metrics,
        OrchestratorConfig::default(),
    ));

    create_router(Arc::new(ApiState {
        orchestrator,
        store: services.store.clone(),
        registry,
    }))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn create_order_body(seat_ids: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "user_id": 1,
        "event_id": 25,
        "seat_ids": seat_ids,
    })
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn create_order_returns_201_with_receipt() {
    let services =
        StubServices::with_event(25, &[dec!(1000.25), dec!(1000.25), dec!(1000.25)]);
    let router = test_router(&services);

    let response = router
        .oneshot(post_json(
            "/api/v1/orders",
            create_order_body(&["S-1", "S-2", "S-3"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key(CORRELATION_HEADER));

    let body = body_json(response).await;
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["payment_status"], "SUCCESS");
    assert_eq!(body["order_total"], "3150.79");
    assert_eq!(body["tickets"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn create_order_echoes_supplied_correlation_id() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    let router = test_router(&services);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .header(CORRELATION_HEADER, "corr-test-1")
        .body(Body::from(create_order_body(&["S-1"]).to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get(CORRELATION_HEADER).unwrap(),
        "corr-test-1"
    );
}

#[tokio::test]
async fn empty_seat_list_is_400_with_correlation_id() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    let router = test_router(&services);

    let response = router
        .oneshot(post_json("/api/v1/orders", create_order_body(&[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("seat_ids"));
    assert!(!body["correlation_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn declined_payment_is_400_with_message() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    services.payment.decline_next("Card declined");
    let router = test_router(&services);

    let response = router
        .oneshot(post_json("/api/v1/orders", create_order_body(&["S-1"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Card declined"));
}

#[tokio::test]
async fn unknown_order_is_404() {
    let services = StubServices::new();
    let router = test_router(&services);

    let response = router.oneshot(get("/api/v1/orders/999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_order_returns_refunded_receipt() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    let router = test_router(&services);

    let created = router
        .clone()
        .oneshot(post_json("/api/v1/orders", create_order_body(&["S-1"])))
        .await
        .unwrap();
    let created_body = body_json(created).await;
    let order_id = created_body["order_id"].as_i64().unwrap();

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/orders/{}/cancel", order_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "REFUNDED");
    assert_eq!(body["payment_status"], "REFUNDED");
}

#[tokio::test]
async fn cancel_twice_is_400() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    let router = test_router(&services);

    let created = router
        .clone()
        .oneshot(post_json("/api/v1/orders", create_order_body(&["S-1"])))
        .await
        .unwrap();
    let order_id = body_json(created).await["order_id"].as_i64().unwrap();
    let cancel_uri = format!("/api/v1/orders/{}/cancel", order_id);

    let first = router
        .clone()
        .oneshot(post_json(&cancel_uri, serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_json(&cancel_uri, serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_orders_clamps_pagination() {
    let services = StubServices::with_event(25, &[dec!(10.00), dec!(20.00), dec!(30.00)]);
    let router = test_router(&services);

    for seat in ["S-1", "S-2", "S-3"] {
        let response = router
            .clone()
            .oneshot(post_json("/api/v1/orders", create_order_body(&[seat])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .oneshot(get("/api/v1/orders?page=0&pageSize=500"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["pageSize"], 100);
    assert_eq!(body["pagination"]["totalItems"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn statistics_reports_aggregates() {
    let services = StubServices::with_event(25, &[dec!(100.00)]);
    let router = test_router(&services);

    router
        .clone()
        .oneshot(post_json("/api/v1/orders", create_order_body(&["S-1"])))
        .await
        .unwrap();

    let response = router
        .oneshot(get("/api/v1/orders/statistics"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_orders"], 1);
    assert_eq!(body["confirmed"], 1);
    assert_eq!(body["total_revenue"], "105.00");
}

// =============================================================================
// Tickets
// =============================================================================

#[tokio::test]
async fn tickets_are_queryable_by_order_and_id() {
    let services = StubServices::with_event(25, &[dec!(40.00), dec!(60.00)]);
    let router = test_router(&services);

    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/orders",
            create_order_body(&["S-1", "S-2"]),
        ))
        .await
        .unwrap();
    let order_id = body_json(created).await["order_id"].as_i64().unwrap();

    let response = router
        .clone()
        .oneshot(get(&format!("/v1/tickets/order/{}", order_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tickets = body_json(response).await;
    assert_eq!(tickets.as_array().unwrap().len(), 2);

    let ticket_id = tickets[0]["ticket_id"].as_i64().unwrap();
    let response = router
        .clone()
        .oneshot(get(&format!("/v1/tickets/{}", ticket_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/v1/tickets/9999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Webhook
// =============================================================================

#[tokio::test]
async fn event_cancelled_webhook_refunds_confirmed_orders() {
    let services = StubServices::with_event(77, &[dec!(100.00), dec!(100.00)]);
    let router = test_router(&services);

    for seat in ["S-1", "S-2"] {
        router
            .clone()
            .oneshot(post_json(
                "/api/v1/orders",
                serde_json::json!({"user_id": 1, "event_id": 77, "seat_ids": [seat]}),
            ))
            .await
            .unwrap();
    }

    let response = router
        .oneshot(post_json(
            "/api/webhooks/event-cancelled",
            serde_json::json!({
                "event_id": 77,
                "event_title": "Event 77",
                "cancelled_at": "2026-08-01T12:00:00Z",
                "reason": "Venue flooded"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["refunded"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["total_refunded"], "210.00");
}

// =============================================================================
// Health and metrics
// =============================================================================

#[tokio::test]
async fn health_endpoints_respond() {
    let services = StubServices::new();
    let router = test_router(&services);

    let live = router.clone().oneshot(get("/health/live")).await.unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let ready = router.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_expose_order_counters() {
    let services = StubServices::with_event(25, &[dec!(50.00)]);
    let router = test_router(&services);

    router
        .clone()
        .oneshot(post_json("/api/v1/orders", create_order_body(&["S-1"])))
        .await
        .unwrap();

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("orders_total 1"));
    assert!(text.contains("payments_failed_total 0"));
    assert!(text.contains("seat_reservations_failed 0"));
}
