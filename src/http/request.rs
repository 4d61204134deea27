//! Request capture and request IDs.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) as early as possible
//! - Capture the immutable view of an inbound request the pipeline works on
//! - Restrict proxying to the supported methods

use axum::http::{HeaderMap, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Methods the gateway forwards.
pub const FORWARDED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

pub fn is_forwarded_method(method: &Method) -> bool {
    FORWARDED_METHODS.contains(method)
}

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Inbound request metadata, captured before the body is read.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub request_id: String,
    pub method: Method,
    /// Full request path, as received.
    pub path: String,
    /// Path after the mount prefix (empty or starting with `/`), percent-encoding preserved.
    pub suffix: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl IncomingRequest {
    pub fn capture<B>(request: &Request<B>, suffix: &str) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            request_id,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            suffix: suffix.to_string(),
            query: request.uri().query().map(str::to_string),
            headers: request.headers().clone(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        crate::http::body::content_type(&self.headers)
    }
}
