//! Request correlation id.
//!
//! A single logical id per request, adopted from the inbound
//! `X-Correlation-ID` header or generated on first access. Threaded by value
//! through the orchestrator, every outbound client call, and every outbox row.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-request correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Adopt an id supplied by the caller. Blank values fall back to a
    /// generated id.
    pub fn from_header(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::new()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The id as a string slice (header and log value).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn test_from_header_adopts_value() {
        let id = CorrelationId::from_header("req-1234");
        assert_eq!(id.as_str(), "req-1234");
    }

    #[test]
    fn test_from_header_blank_generates() {
        let id = CorrelationId::from_header("   ");
        assert!(!id.as_str().is_empty());
    }
}
