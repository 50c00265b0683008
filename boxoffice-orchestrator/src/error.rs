//! Orchestration error types.
//!
//! One variant per failure kind the saga can surface. The HTTP layer maps
//! these onto status codes: validation and business refusals to 400,
//! `NotFound` to 404, everything else to 500.

use thiserror::Error;

use boxoffice_clients::ClientError;
use boxoffice_store::StoreError;

/// Errors that can occur while orchestrating an order.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed request (empty or duplicate seat list)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Order, event, or seat absent
    #[error("{0}")]
    NotFound(String),

    /// Event status disallows purchase
    #[error("Event not sellable: {0}")]
    NotSellable(String),

    /// Seating service refused the reservation
    #[error("Seats unavailable: {0}")]
    SeatUnavailable(String),

    /// Terminal refusal from the payment service
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// Timeout or transport failure from an external service
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// Order is already in a state that forbids the operation
    #[error("{0}")]
    Conflict(String),

    /// Post-payment anomaly; the order parks in
    /// PAYMENT_COMPLETED_BUT_FULFILLMENT_FAILED when the compensating refund
    /// also fails
    #[error("Fulfillment failed: {0}")]
    FulfillmentFailed(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ClientError> for OrchestratorError {
    fn from(err: ClientError) -> Self {
        OrchestratorError::Upstream(err.to_string())
    }
}

/// Result type for orchestration operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
