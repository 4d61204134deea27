//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all proxy handler
//! - Wire up middleware (CORS, request ID, body limit, timeout, tracing)
//! - Run one request through classify → materialize → retry loop → dispatch
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::Instrument;
use url::Url;

use crate::config::{CorsConfig, GatewayConfig};
use crate::http::body::{self, BodyClass};
use crate::http::request::{is_forwarded_method, IncomingRequest, MakeRequestUuid, FORWARDED_METHODS};
use crate::http::response::{classify_response, dispatch, GatewayError};
use crate::observability::metrics;
use crate::resilience::{execute, RetryPolicy};
use crate::routing::{MountTable, RouteError};
use crate::security::headers;
use crate::upstream::{TransportError, UpstreamClient, UpstreamRequest};

/// Extra time the outer timeout allows on top of the retry policy's budget.
const TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Errors raised while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid origin URL: {0}")]
    Origin(#[from] url::ParseError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mounts: Arc<MountTable>,
    pub upstream: UpstreamClient,
    pub policy: RetryPolicy,
    pub origin: Arc<Url>,
    pub body_limit: usize,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new gateway with the given (validated) configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let origin = Url::parse(&config.origin.base_url)?;
        let upstream = UpstreamClient::new(config.timeouts.connect())?;

        let mounts = MountTable::from_config(&config.effective_mounts());
        for mount in mounts.mounts() {
            tracing::debug!(mount = %mount.name, prefix = mount.prefix(), "Mount registered");
        }

        let state = AppState {
            mounts: Arc::new(mounts),
            upstream,
            policy: RetryPolicy::from_config(&config),
            origin: Arc::new(origin),
            body_limit: config.limits.max_body_bytes,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The outer timeout is a backstop above the retry loop's own deadlines.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let overall = state.policy.worst_case() + TIMEOUT_SLACK;
        let body_limit = state.body_limit;

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(cors_layer(&config.cors))
                    .layer(TimeoutLayer::new(overall)),
            )
    }

    /// The fully layered router, for serving or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.origin.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// The gateway's own CORS policy. Origin-supplied CORS headers are stripped.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(FORWARDED_METHODS.to_vec())
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if !is_forwarded_method(&method) {
        metrics::record_request(method.as_str(), 405, "none", start_time);
        return GatewayError::MethodNotAllowed(method.to_string()).into_response();
    }

    // 1. Resolve mount
    let Some(resolved) = state.mounts.resolve(&path) else {
        tracing::warn!(path = %path, "No mount matched");
        metrics::record_request(method.as_str(), 404, "none", start_time);
        return GatewayError::NoMount(path.clone()).into_response();
    };
    let mount = resolved.mount.name.clone();
    let incoming = IncomingRequest::capture(&request, resolved.suffix);
    let target = resolved
        .mount
        .upstream_url(&state.origin, resolved.suffix, incoming.query.as_deref());

    let span = tracing::info_span!(
        "proxy",
        request_id = %incoming.request_id,
        method = %method,
        path = %path,
        mount = %mount,
    );

    let response = forward(&state, incoming, request, target)
        .instrument(span)
        .await;

    metrics::record_request(method.as_str(), response.status().as_u16(), &mount, start_time);
    response
}

/// Classify → materialize → retry loop → dispatch.
async fn forward(
    state: &AppState,
    incoming: IncomingRequest,
    request: Request<Body>,
    target: Result<Url, RouteError>,
) -> Response {
    let backend_url = state.origin.as_str().trim_end_matches('/');

    let url = match target {
        Ok(url) => url,
        Err(RouteError::OutsideMount(resolved)) => {
            tracing::warn!(resolved = %resolved, "Path escapes its mount");
            return GatewayError::NoMount(incoming.path.clone()).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build origin URL");
            return GatewayError::Transport {
                error: TransportError::InvalidRequest(e.to_string()),
                backend_url: backend_url.to_string(),
            }
            .into_response();
        }
    };

    // 2. Classify and read the body exactly once
    let class = body::classify(&incoming.method, incoming.content_type());
    let mut body = match body::materialize(request, class, state.body_limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to materialize request body");
            return GatewayError::from(e).into_response();
        }
    };

    tracing::debug!(
        upstream = %url,
        single_use = class == BodyClass::SingleUse,
        body_len = ?body.len_hint(),
        "Proxying request"
    );

    let upstream_request = UpstreamRequest {
        method: incoming.method.clone(),
        url,
        headers: headers::outbound(&incoming.headers, body.is_multipart()),
    };

    // 3. Retry loop; dropping this handler (caller gone) cancels the attempt.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let outcome = execute(
        &state.upstream,
        &state.policy,
        &upstream_request,
        &mut body,
        &cancel,
    )
    .await;
    tracing::debug!(outcome = outcome.label(), "Retry loop finished");

    // 4. Relay the origin's answer or render the gateway's failure
    let upstream_response = match GatewayError::check_outcome(outcome, backend_url) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Gateway could not obtain a response");
            return e.into_response();
        }
    };

    let kind = classify_response(&incoming.path, upstream_response.content_type());
    tracing::debug!(status = %upstream_response.status, kind = kind.as_str(), "Relaying origin response");
    match dispatch(upstream_response, kind, state.policy.attempt_timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to relay origin response");
            e.into_response()
        }
    }
}
