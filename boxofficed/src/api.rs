//! HTTP API for the boxoffice daemon.
//!
//! Provides REST endpoints for:
//! - Order creation, lookup, listing, cancellation, statistics
//! - Ticket lookup
//! - Event-cancelled webhook
//! - Health probes and Prometheus metrics
//!
//! Every request runs under a correlation id: adopted from the
//! `X-Correlation-ID` header or generated, threaded through the
//! orchestrator, and echoed on the response.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use boxoffice_clients::http::CORRELATION_HEADER;
use boxoffice_domain::{CorrelationId, EventId, OrderId, Ticket, TicketId, UserId};
use boxoffice_orchestrator::{
    CreateOrderRequest, EventCancellationSummary, Orchestrator, OrchestratorError, OrderReceipt,
};
use boxoffice_store::{OrderStatistics, OrderStore, Page};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    /// The saga engine
    pub orchestrator: Arc<Orchestrator>,
    /// Store handle for plain reads and readiness
    pub store: Arc<dyn OrderStore>,
    /// Metrics registry rendered at /metrics
    pub registry: Registry,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Error response body: stable message plus the request correlation id.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// What went wrong
    pub message: String,
    /// Correlation id of the failing request
    pub correlation_id: String,
}

/// Query parameters for the order list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// 1-based page number
    pub page: Option<i64>,
    /// Rows per page, clamped to 1..=100
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

/// Pagination metadata for the order list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Order list response.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<OrderReceipt>,
    pub pagination: Pagination,
}

/// Event-cancelled webhook body.
#[derive(Debug, Deserialize)]
pub struct EventCancelledWebhook {
    /// Cancelled catalog event
    pub event_id: EventId,
    /// Event title (informational)
    #[serde(default)]
    pub event_title: Option<String>,
    /// When the organizer cancelled (informational)
    #[serde(default)]
    pub cancelled_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Why the event was cancelled; carried into the refund events
    #[serde(default)]
    pub reason: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Correlation middleware
// =============================================================================

/// Adopt or generate the request correlation id, expose it to handlers via
/// extensions, and echo it on the response.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(CorrelationId::from_header)
        .unwrap_or_default();

    request.extensions_mut().insert(correlation.clone());
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(correlation.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }

    response
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/orders", post(create_order_handler).get(list_orders_handler))
        .route("/api/v1/orders/statistics", get(statistics_handler))
        .route("/api/v1/orders/:id", get(get_order_handler))
        .route("/api/v1/orders/:id/cancel", post(cancel_order_handler))
        .route("/api/v1/orders/user/:user_id", get(orders_by_user_handler))
        .route("/api/v1/orders/event/:event_id", get(orders_by_event_handler))
        .route("/v1/tickets/:id", get(get_ticket_handler))
        .route("/v1/tickets/order/:order_id", get(tickets_by_order_handler))
        .route("/v1/tickets/event/:event_id", get(tickets_by_event_handler))
        .route("/api/webhooks/event-cancelled", post(event_cancelled_handler))
        .route("/health/live", get(health_live_handler))
        .route("/health/ready", get(health_ready_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

fn to_error_response(err: OrchestratorError, correlation: &CorrelationId) -> ApiError {
    let status = match &err {
        OrchestratorError::Validation(_)
        | OrchestratorError::NotSellable(_)
        | OrchestratorError::SeatUnavailable(_)
        | OrchestratorError::PaymentFailed(_)
        | OrchestratorError::Conflict(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Upstream(_)
        | OrchestratorError::FulfillmentFailed(_)
        | OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(
            correlation_id = %correlation,
            error = %err,
            "Request failed with internal error"
        );
    }

    (
        status,
        Json(ErrorResponse {
            message: err.to_string(),
            correlation_id: correlation.to_string(),
        }),
    )
}

// =============================================================================
// Order handlers
// =============================================================================

/// Create an order for a seat selection.
async fn create_order_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderReceipt>)> {
    let receipt = state
        .orchestrator
        .create_order(req, &correlation)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Get a single order with its tickets.
async fn get_order_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<OrderReceipt>> {
    let receipt = state
        .orchestrator
        .get_order(id)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok(Json(receipt))
}

/// List orders for a user.
async fn orders_by_user_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Vec<OrderReceipt>>> {
    let receipts = state
        .orchestrator
        .get_orders_by_user(user_id)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok(Json(receipts))
}

/// List orders for a catalog event.
async fn orders_by_event_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(event_id): Path<EventId>,
) -> ApiResult<Json<Vec<OrderReceipt>>> {
    let receipts = state
        .orchestrator
        .get_orders_by_event(event_id)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok(Json(receipts))
}

/// List all orders, paginated. `page` clamps to `>= 1`, `pageSize` to
/// `1..=100` (default 50).
async fn list_orders_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let page = Page::clamped(
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(Page::DEFAULT_PAGE_SIZE as i64),
    );

    let orders = state
        .store
        .list_orders(page)
        .await
        .map_err(|e| to_error_response(e.into(), &correlation))?;
    let total_items = state
        .store
        .count_orders()
        .await
        .map_err(|e| to_error_response(e.into(), &correlation))?;

    let mut data = Vec::with_capacity(orders.len());
    for order in orders {
        let receipt = state
            .orchestrator
            .receipt(order)
            .await
            .map_err(|e| to_error_response(e, &correlation))?;
        data.push(receipt);
    }

    let total_pages = total_items.div_ceil(u64::from(page.page_size));

    Ok(Json(ListResponse {
        data,
        pagination: Pagination {
            page: page.page,
            page_size: page.page_size,
            total_items,
            total_pages,
        },
    }))
}

/// Cancel an order, refunding it when it was already paid.
async fn cancel_order_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<OrderId>,
) -> ApiResult<Json<OrderReceipt>> {
    let receipt = state
        .orchestrator
        .cancel_order(id, &correlation)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok(Json(receipt))
}

/// Aggregate order statistics.
async fn statistics_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
) -> ApiResult<Json<OrderStatistics>> {
    let stats = state
        .store
        .order_statistics()
        .await
        .map_err(|e| to_error_response(e.into(), &correlation))?;

    Ok(Json(stats))
}

// =============================================================================
// Ticket handlers
// =============================================================================

/// Get a single ticket.
async fn get_ticket_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<TicketId>,
) -> ApiResult<Json<Ticket>> {
    let ticket = state
        .orchestrator
        .get_ticket(id)
        .await
        .map_err(|e| to_error_response(e, &correlation))?;

    Ok(Json(ticket))
}

/// Tickets issued for an order.
async fn tickets_by_order_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let tickets = state
        .store
        .find_tickets_by_order(order_id)
        .await
        .map_err(|e| to_error_response(e.into(), &correlation))?;

    Ok(Json(tickets))
}

/// Tickets issued for a catalog event.
async fn tickets_by_event_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Path(event_id): Path<EventId>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let tickets = state
        .store
        .find_tickets_by_event(event_id)
        .await
        .map_err(|e| to_error_response(e.into(), &correlation))?;

    Ok(Json(tickets))
}

// =============================================================================
// Webhook handler
// =============================================================================

/// Refund every confirmed order for a cancelled event.
async fn event_cancelled_handler(
    State(state): State<Arc<ApiState>>,
    Extension(correlation): Extension<CorrelationId>,
    Json(webhook): Json<EventCancelledWebhook>,
) -> ApiResult<Json<EventCancellationSummary>> {
    let reason = webhook
        .reason
        .unwrap_or_else(|| "Event cancelled".to_string());

    let summary = state
        .orchestrator
        .handle_event_cancelled(webhook.event_id, &reason, &correlation)
        .await
        .map_err(|err| {
            error!(
                correlation_id = %correlation,
                event_id = webhook.event_id,
                error = %err,
                "Event cancellation batch failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: err.to_string(),
                    correlation_id: correlation.to_string(),
                }),
            )
        })?;

    Ok(Json(summary))
}

// =============================================================================
// Health and metrics
// =============================================================================

/// Liveness probe: always 200 while the process serves requests.
async fn health_live_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: 503 until the store answers.
async fn health_ready_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, StatusCode> {
    state
        .store
        .ready()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Prometheus text exposition of the daemon registry.
async fn metrics_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}
