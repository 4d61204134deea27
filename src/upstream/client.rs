//! `reqwest`-backed forwarder for the internal origin.

use std::time::Duration;

use axum::body::Body;
use futures_util::TryStreamExt;
use tokio_util::sync::CancellationToken;

use crate::upstream::{AttemptBody, Forward, TransportError, UpstreamRequest, UpstreamResponse};

/// HTTP client pointed at the origin.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client that never follows redirects: 3xx are origin responses.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

impl Forward for UpstreamClient {
    async fn forward(
        &self,
        request: &UpstreamRequest,
        body: AttemptBody,
        cancel: CancellationToken,
    ) -> Result<UpstreamResponse, TransportError> {
        let builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        let builder = match body {
            AttemptBody::Empty => builder,
            AttemptBody::Bytes(bytes) => builder.body(bytes),
            // Sets a fresh Content-Type carrying the new boundary.
            AttemptBody::Multipart(form) => builder.multipart(form),
        };

        // Dropping the send future on cancellation closes the connection.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = builder.send() => result?,
        };

        let status = response.status();
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        Ok(UpstreamResponse {
            status,
            headers,
            body: Body::from_stream(stream),
        })
    }
}
