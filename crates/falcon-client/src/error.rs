//! Detection client error types.

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

/// Failure talking to the detection service.
///
/// The live loop treats every variant as soft: it logs, keeps the previous
/// overlay and waits for the next tick.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Detection service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Service-side 503 (model not loaded yet).
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, TransportError::Status { status: 503, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Network(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable() {
        let err = TransportError::Status {
            status: 503,
            body: "Model not loaded".into(),
        };
        assert!(err.is_service_unavailable());
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "Detection service returned 503: Model not loaded");
    }
}
