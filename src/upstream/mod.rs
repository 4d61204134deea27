//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Retry controller (one attempt)
//!     → timeout guard (deadline + cancellation token)
//!     → Forward::forward (client.rs issues the call)
//!     → UpstreamResponse (status, headers, opaque body stream)
//!       or TransportError (no response was produced)
//! ```
//!
//! # Design Decisions
//! - The forwarder never looks at the response body
//! - Any well-formed response, whatever its status, is a success at this layer
//! - Cancellation is observed through the token so the connection is dropped

pub mod client;
pub mod error;

use std::future::Future;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

pub use client::UpstreamClient;
pub use error::TransportError;

/// Everything about an outbound call that stays the same across attempts.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    /// Already filtered for the origin.
    pub headers: HeaderMap,
}

/// The payload handed to exactly one attempt.
#[derive(Debug)]
pub enum AttemptBody {
    Empty,
    Bytes(Bytes),
    Multipart(reqwest::multipart::Form),
}

/// A response the origin actually produced.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Issues a single call against the origin.
///
/// Implementations must return promptly with [`TransportError::Cancelled`] once
/// `cancel` fires, dropping any in-flight connection.
pub trait Forward: Send + Sync {
    fn forward(
        &self,
        request: &UpstreamRequest,
        body: AttemptBody,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>> + Send;
}
