//! Client layer error types.

use thiserror::Error;

/// Errors that can occur talking to an upstream service.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport-level failure (connection refused, DNS, TLS)
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Upstream returned a non-success status
    #[error("Upstream API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Failed to decode the response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client misconfiguration (bad base URL, builder failure)
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }
}
