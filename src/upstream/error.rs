//! Transport-level failures: no HTTP response was produced by the origin.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused by origin: {0}")]
    ConnectionRefused(String),

    #[error("network failure reaching origin: {0}")]
    Network(String),

    #[error("origin did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream call was cancelled")]
    Cancelled,

    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    #[error("request body was already sent and cannot be replayed")]
    BodyConsumed,
}

impl TransportError {
    /// Connection refusals, network failures and guard timeouts may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionRefused(_)
                | TransportError::Network(_)
                | TransportError::Timeout(_)
        )
    }

    /// Short label for metrics and the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::ConnectionRefused(_) => "connection_refused",
            TransportError::Network(_) => "network",
            TransportError::Timeout(_) => "timeout",
            TransportError::Cancelled => "cancelled",
            TransportError::InvalidRequest(_) => "invalid_request",
            TransportError::BodyConsumed => "body_consumed",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            TransportError::InvalidRequest(message)
        } else if err.is_connect() {
            if caused_by_refusal(&err) {
                TransportError::ConnectionRefused(message)
            } else {
                TransportError::Network(message)
            }
        } else {
            // reqwest's own timeouts are connect timeouts here; the attempt
            // deadline is enforced by the guard and reported as Timeout.
            TransportError::Network(message)
        }
    }
}

fn caused_by_refusal(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
