//! Response handling and transformation.
//!
//! # Responsibilities
//! - Decide between streaming and buffered passthrough
//! - Relay origin status, filtered headers and body
//! - Render gateway-owned failures as the JSON error envelope
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - Origin responses are relayed byte-for-byte, error statuses included
//! - Only failures the gateway itself produced use the envelope
//! - A buffered read is bounded by the attempt deadline; a stalled body is a
//!   gateway timeout, not a hang

use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::body::MaterializeError;
use crate::observability::metrics;
use crate::resilience::{Exhaustion, ProxyOutcome};
use crate::security::headers;
use crate::upstream::{TransportError, UpstreamResponse};

/// How the origin's body is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Streamed,
    Buffered,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Streamed => "streamed",
            ResponseKind::Buffered => "buffered",
        }
    }
}

/// Media responses are streamed; everything else is buffered.
///
/// The path check is a heuristic: any endpoint whose path contains `video`
/// is streamed even if it returns JSON. The content type is checked first.
pub fn classify_response(path: &str, content_type: Option<&str>) -> ResponseKind {
    let media = content_type
        .map(|ct| {
            let ct = ct.trim().to_ascii_lowercase();
            ct.starts_with("video/") || ct.starts_with("application/octet-stream")
        })
        .unwrap_or(false);

    if media || path.contains("video") {
        ResponseKind::Streamed
    } else {
        ResponseKind::Buffered
    }
}

/// Relay an origin response to the caller.
///
/// `read_timeout` bounds reading a buffered body; streamed bodies are unbounded.
pub async fn dispatch(
    response: UpstreamResponse,
    kind: ResponseKind,
    read_timeout: Duration,
) -> Result<Response, GatewayError> {
    let UpstreamResponse {
        status,
        headers: origin_headers,
        body,
    } = response;

    let body = match kind {
        // Dropping the response (caller gone) drops the origin stream with it.
        ResponseKind::Streamed => body,
        ResponseKind::Buffered => {
            // Expiry drops the origin body, closing its connection.
            let read = tokio::time::timeout(read_timeout, axum::body::to_bytes(body, usize::MAX));
            match read.await {
                Ok(Ok(bytes)) => Body::from(bytes),
                Ok(Err(e)) => return Err(GatewayError::UpstreamBody(e.to_string())),
                Err(_) => return Err(GatewayError::BodyTimeout(read_timeout)),
            }
        }
    };
    metrics::record_response_kind(kind.as_str());

    let mut relayed = Response::new(body);
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers::inbound(&origin_headers);
    Ok(relayed)
}

/// JSON body for gateway-owned failures.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Failures produced by the gateway itself, never by the origin.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no mount serves path `{0}`")]
    NoMount(String),

    #[error("method {0} is not supported")]
    MethodNotAllowed(String),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error("origin unavailable after {attempts} attempt(s): {last}")]
    Unavailable {
        last: TransportError,
        attempts: u32,
        reason: Exhaustion,
        backend_url: String,
    },

    #[error("upstream call failed: {error}")]
    Transport {
        error: TransportError,
        backend_url: String,
    },

    #[error("failed to read origin response body: {0}")]
    UpstreamBody(String),

    #[error("origin response body stalled for {0:?}")]
    BodyTimeout(Duration),
}

impl GatewayError {
    /// Split an outcome into the origin's response or the gateway's own failure.
    pub fn check_outcome(outcome: ProxyOutcome, backend_url: &str) -> Result<UpstreamResponse, Self> {
        match outcome {
            ProxyOutcome::Success(response) | ProxyOutcome::UpstreamError(response) => Ok(response),
            ProxyOutcome::TransportFailure(error) => Err(GatewayError::Transport {
                error,
                backend_url: backend_url.to_string(),
            }),
            ProxyOutcome::ExhaustedRetries {
                last,
                attempts,
                reason,
            } => Err(GatewayError::Unavailable {
                last,
                attempts,
                reason,
                backend_url: backend_url.to_string(),
            }),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoMount(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Materialize(MaterializeError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Materialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Transport {
                error: TransportError::InvalidRequest(_) | TransportError::BodyConsumed,
                ..
            } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Transport { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BodyTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            GatewayError::NoMount(path) => ErrorEnvelope {
                error: "Not found".into(),
                message: format!("No backend route is mounted for {path}"),
                backend_url: None,
                details: None,
            },
            GatewayError::MethodNotAllowed(method) => ErrorEnvelope {
                error: "Method not allowed".into(),
                message: format!("{method} requests are not proxied"),
                backend_url: None,
                details: None,
            },
            GatewayError::Materialize(err) => ErrorEnvelope {
                error: "Invalid request body".into(),
                message: err.to_string(),
                backend_url: None,
                details: None,
            },
            GatewayError::Unavailable {
                last,
                attempts,
                reason: Exhaustion::SingleUseBody,
                backend_url,
            } => ErrorEnvelope {
                error: "Upload failed".into(),
                message: "The backend could not be reached and file uploads cannot be retried. \
                          Please try the upload again."
                    .into(),
                backend_url: Some(backend_url.clone()),
                details: Some(serde_json::json!({
                    "cause": last.kind(),
                    "reason": last.to_string(),
                    "attempts": attempts,
                })),
            },
            GatewayError::Unavailable {
                last,
                attempts,
                reason: Exhaustion::AttemptsUsed,
                backend_url,
            } => ErrorEnvelope {
                error: "Backend unavailable".into(),
                message: format!("Could not reach the backend after {attempts} attempts"),
                backend_url: Some(backend_url.clone()),
                details: Some(serde_json::json!({
                    "cause": last.kind(),
                    "reason": last.to_string(),
                    "attempts": attempts,
                })),
            },
            GatewayError::Transport { error, backend_url } => ErrorEnvelope {
                error: "Proxy error".into(),
                message: error.to_string(),
                backend_url: Some(backend_url.clone()),
                details: Some(serde_json::json!({ "cause": error.kind() })),
            },
            GatewayError::UpstreamBody(reason) => ErrorEnvelope {
                error: "Bad gateway".into(),
                message: reason.clone(),
                backend_url: None,
                details: None,
            },
            GatewayError::BodyTimeout(limit) => ErrorEnvelope {
                error: "Backend timeout".into(),
                message: format!("The backend stopped sending its response for {limit:?}"),
                backend_url: None,
                details: Some(serde_json::json!({ "cause": "timeout" })),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}
