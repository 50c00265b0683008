//! HTTP adapters for the catalog, seating, payment, and notification ports.
//!
//! Each adapter wraps a `reqwest::Client` with a per-request timeout and a
//! configured base URL, and attaches the correlation id to every request as
//! the `X-Correlation-ID` header.
//!
//! Error mapping:
//! - transport failure -> `ClientError::Request`
//! - timeout -> `ClientError::Timeout`
//! - non-success status -> `ClientError::Api { status, message }`
//! - undecodable body -> `ClientError::Parse`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use boxoffice_domain::{CorrelationId, EventId, OutboxEvent};

use crate::error::ClientError;
use crate::ports::{
    AllocateSeatsRequest, AllocateSeatsResponse, CatalogPort, ChargeRequest, ChargeResponse,
    EventInfo, NotificationPort, PaymentPort, RefundRequest, RefundResponse, ReleaseSeatsRequest,
    ReserveSeatsRequest, ReserveSeatsResponse, Seat, SeatingPort,
};

// =============================================================================
// Constants
// =============================================================================

/// Header carrying the request correlation id to upstreams.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Shared plumbing
// =============================================================================

fn build_client(timeout: Duration) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::Config(e.to_string()))
}

fn with_correlation(builder: RequestBuilder, correlation: &CorrelationId) -> RequestBuilder {
    builder.header(CORRELATION_HEADER, correlation.as_str())
}

/// Decode a success response, or map the status and body into an API error.
async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Parse(e.to_string()))
}

/// Require a success status, discarding the body.
async fn expect_success(response: Response) -> Result<(), ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    Ok(())
}

async fn api_error(status: StatusCode, response: Response) -> ClientError {
    let message = response
        .text()
        .await
        .ok()
        .filter(|body| !body.is_empty())
        .unwrap_or_else(|| status.to_string());

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

async fn post_json<B: Serialize, T: DeserializeOwned>(
    client: &Client,
    url: String,
    body: &B,
    correlation: &CorrelationId,
) -> Result<T, ClientError> {
    let response = with_correlation(client.post(&url), correlation)
        .json(body)
        .send()
        .await?;

    expect_json(response).await
}

// =============================================================================
// Catalog
// =============================================================================

/// HTTP adapter for the catalog service.
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Create a catalog client against `base_url` with the given timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl CatalogPort for HttpCatalogClient {
    async fn get_event(
        &self,
        event_id: EventId,
        correlation: &CorrelationId,
    ) -> Result<Option<EventInfo>, ClientError> {
        let url = format!("{}/api/v1/events/{}", self.base_url, event_id);
        let response = with_correlation(self.client.get(&url), correlation)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        expect_json(response).await.map(Some)
    }
}

// =============================================================================
// Seating
// =============================================================================

/// HTTP adapter for the seating service.
pub struct HttpSeatingClient {
    client: Client,
    base_url: String,
}

impl HttpSeatingClient {
    /// Create a seating client against `base_url` with the given timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SeatingPort for HttpSeatingClient {
    async fn get_seats(
        &self,
        event_id: EventId,
        correlation: &CorrelationId,
    ) -> Result<Vec<Seat>, ClientError> {
        let url = format!("{}/api/v1/events/{}/seats", self.base_url, event_id);
        let response = with_correlation(self.client.get(&url), correlation)
            .send()
            .await?;

        expect_json(response).await
    }

    async fn reserve_seats(
        &self,
        req: &ReserveSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<ReserveSeatsResponse, ClientError> {
        let url = format!("{}/api/v1/seats/reserve", self.base_url);
        post_json(&self.client, url, req, correlation).await
    }

    async fn allocate_seats(
        &self,
        req: &AllocateSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<AllocateSeatsResponse, ClientError> {
        let url = format!("{}/api/v1/seats/allocate", self.base_url);
        post_json(&self.client, url, req, correlation).await
    }

    async fn release_seats(
        &self,
        req: &ReleaseSeatsRequest,
        correlation: &CorrelationId,
    ) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/seats/release", self.base_url);
        let response = with_correlation(self.client.post(&url), correlation)
            .json(req)
            .send()
            .await?;

        expect_success(response).await
    }
}

// =============================================================================
// Payment
// =============================================================================

/// HTTP adapter for the payment service.
pub struct HttpPaymentClient {
    client: Client,
    base_url: String,
}

impl HttpPaymentClient {
    /// Create a payment client against `base_url` with the given timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PaymentPort for HttpPaymentClient {
    async fn charge(
        &self,
        req: &ChargeRequest,
        correlation: &CorrelationId,
    ) -> Result<ChargeResponse, ClientError> {
        let url = format!("{}/api/v1/payments/charge", self.base_url);
        post_json(&self.client, url, req, correlation).await
    }

    async fn refund(
        &self,
        req: &RefundRequest,
        correlation: &CorrelationId,
    ) -> Result<RefundResponse, ClientError> {
        let url = format!("{}/api/v1/payments/refund", self.base_url);
        post_json(&self.client, url, req, correlation).await
    }
}

// =============================================================================
// Notification
// =============================================================================

/// HTTP adapter for the notification fan-out.
pub struct HttpNotificationClient {
    client: Client,
    base_url: String,
}

impl HttpNotificationClient {
    /// Create a notification client against `base_url` with the given timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl NotificationPort for HttpNotificationClient {
    async fn send_event(
        &self,
        event: &OutboxEvent,
        correlation: &CorrelationId,
    ) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/notifications/events", self.base_url);
        let response = with_correlation(self.client.post(&url), correlation)
            .json(event)
            .send()
            .await?;

        expect_success(response).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_build_with_timeout() {
        assert!(HttpCatalogClient::new("http://catalog:8080", DEFAULT_TIMEOUT).is_ok());
        assert!(HttpSeatingClient::new("http://seating:8080", DEFAULT_TIMEOUT).is_ok());
        assert!(HttpPaymentClient::new("http://payment:8080", DEFAULT_TIMEOUT).is_ok());
        assert!(HttpNotificationClient::new("http://notify:8080", DEFAULT_TIMEOUT).is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_maps_to_request() {
        // Nothing listens on this port; the send fails at connect time.
        let client =
            HttpCatalogClient::new("http://127.0.0.1:1", Duration::from_millis(250)).unwrap();
        let err = client
            .get_event(25, &CorrelationId::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Request(_) | ClientError::Timeout
        ));
    }
}
