//! Retry logic.
//!
//! # Responsibilities
//! - Drive up to `max_attempts` upstream attempts, one in flight at a time
//! - Retry only when no response was produced (transport failure)
//! - Refuse to replay a single-use (multipart) body
//!
//! # Design Decisions
//! - Any response the origin produced is terminal, including 4xx/5xx: the
//!   operation may already have executed on the backend
//! - Linear backoff (`attempt × step`) between attempts
//! - Every attempt runs under its own child cancellation token

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::http::body::BodyDescriptor;
use crate::observability::metrics;
use crate::resilience::backoff::linear_backoff;
use crate::resilience::timeouts::with_deadline;
use crate::upstream::{Forward, TransportError, UpstreamRequest, UpstreamResponse};

/// Attempt budget, backoff and per-attempt deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.retries.max_attempts.max(1),
            backoff_step: config.retries.backoff_step(),
            attempt_timeout: config.timeouts.attempt(),
        }
    }

    /// Delay after failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        linear_backoff(attempt, self.backoff_step)
    }

    /// Longest time the retry loop can take: every attempt timing out plus
    /// every backoff in between.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempt_timeout.saturating_mul(self.max_attempts);
        (1..self.max_attempts).fold(attempts, |total, attempt| {
            total.saturating_add(self.backoff(attempt))
        })
    }
}

/// Why the controller stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Every allowed attempt failed.
    AttemptsUsed,
    /// The body was single-use and its one attempt failed.
    SingleUseBody,
}

/// Result of the retry loop.
#[derive(Debug)]
pub enum ProxyOutcome {
    /// The origin answered with a non-error status.
    Success(UpstreamResponse),
    /// The origin answered with 4xx/5xx. Relayed as-is.
    UpstreamError(UpstreamResponse),
    /// A failure that retrying cannot fix.
    TransportFailure(TransportError),
    /// Retryable failures until no further attempt was allowed.
    ExhaustedRetries {
        last: TransportError,
        attempts: u32,
        reason: Exhaustion,
    },
}

impl ProxyOutcome {
    fn from_response(response: UpstreamResponse) -> Self {
        if response.status.is_client_error() || response.status.is_server_error() {
            ProxyOutcome::UpstreamError(response)
        } else {
            ProxyOutcome::Success(response)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProxyOutcome::Success(_) => "success",
            ProxyOutcome::UpstreamError(_) => "upstream_error",
            ProxyOutcome::TransportFailure(_) => "transport_failure",
            ProxyOutcome::ExhaustedRetries { .. } => "exhausted",
        }
    }
}

/// Forward `request` until the origin answers or the policy gives up.
///
/// `cancel` is the request-scoped token; each attempt gets a child of it so the
/// deadline can abort one attempt without touching the others.
pub async fn execute<F: Forward>(
    forwarder: &F,
    policy: &RetryPolicy,
    request: &UpstreamRequest,
    body: &mut BodyDescriptor,
    cancel: &CancellationToken,
) -> ProxyOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let payload = match body.for_attempt() {
            Ok(payload) => payload,
            Err(err) => return ProxyOutcome::TransportFailure(err),
        };

        let token = cancel.child_token();
        let result = with_deadline(
            policy.attempt_timeout,
            token.clone(),
            forwarder.forward(request, payload, token),
        )
        .await;

        let err = match result {
            Ok(response) => {
                tracing::debug!(attempt, status = %response.status, "Origin responded");
                metrics::record_attempt("response");
                return ProxyOutcome::from_response(response);
            }
            Err(err) => err,
        };
        metrics::record_attempt(err.kind());

        if !err.is_retryable() || cancel.is_cancelled() {
            tracing::warn!(attempt, error = %err, "Upstream failure is not retryable");
            return ProxyOutcome::TransportFailure(err);
        }

        if body.is_single_use() {
            tracing::warn!(attempt, error = %err, "Single-use body cannot be resent");
            return ProxyOutcome::ExhaustedRetries {
                last: err,
                attempts: attempt,
                reason: Exhaustion::SingleUseBody,
            };
        }

        if attempt >= max_attempts {
            tracing::error!(attempts = attempt, error = %err, "Upstream retries exhausted");
            return ProxyOutcome::ExhaustedRetries {
                last: err,
                attempts: attempt,
                reason: Exhaustion::AttemptsUsed,
            };
        }

        let delay = policy.backoff(attempt);
        tracing::info!(attempt, delay = ?delay, error = %err, "Retrying after transport failure");
        metrics::record_retry();
        tokio::select! {
            _ = cancel.cancelled() => return ProxyOutcome::TransportFailure(TransportError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::MultipartBody;
    use crate::upstream::AttemptBody;
    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, Method, StatusCode};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// What the fake origin does on one attempt.
    enum Step {
        Respond(u16),
        Fail(TransportError),
        Hang,
    }

    struct ScriptedOrigin {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<(Instant, &'static str)>>,
    }

    impl ScriptedOrigin {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    impl Forward for ScriptedOrigin {
        async fn forward(
            &self,
            _request: &UpstreamRequest,
            body: AttemptBody,
            cancel: CancellationToken,
        ) -> Result<UpstreamResponse, TransportError> {
            let kind = match body {
                AttemptBody::Empty => "empty",
                AttemptBody::Bytes(_) => "bytes",
                AttemptBody::Multipart(_) => "multipart",
            };
            self.calls.lock().unwrap().push((Instant::now(), kind));
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Respond(200));
            match step {
                Step::Respond(status) => Ok(UpstreamResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers: HeaderMap::new(),
                    body: Body::from("ok"),
                }),
                Step::Fail(err) => Err(err),
                Step::Hang => {
                    cancel.cancelled().await;
                    Err(TransportError::Cancelled)
                }
            }
        }
    }

    fn request() -> UpstreamRequest {
        UpstreamRequest {
            method: Method::POST,
            url: "http://localhost:8000/api/courses".parse().unwrap(),
            headers: HeaderMap::new(),
        }
    }

    fn refused() -> TransportError {
        TransportError::ConnectionRefused("refused".into())
    }

    fn text_body() -> BodyDescriptor {
        BodyDescriptor::Text(Bytes::from_static(br#"{"title":"Rust"}"#))
    }

    fn multipart_body() -> BodyDescriptor {
        let form = reqwest::multipart::Form::new().text("title", "Lecture");
        BodyDescriptor::Multipart(MultipartBody::new(form, 1))
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_third_attempt_with_linear_backoff() {
        let origin = ScriptedOrigin::new(vec![
            Step::Fail(refused()),
            Step::Fail(TransportError::Network("reset".into())),
            Step::Respond(201),
        ]);
        let mut body = text_body();

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            ProxyOutcome::Success(response) => assert_eq!(response.status, 201),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let times = origin.call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_secs(1));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
        assert!(origin.calls.lock().unwrap().iter().all(|(_, kind)| *kind == "bytes"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let origin = ScriptedOrigin::new(vec![
            Step::Fail(refused()),
            Step::Fail(refused()),
            Step::Fail(refused()),
            Step::Respond(200),
        ]);
        let mut body = BodyDescriptor::Empty;

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            ProxyOutcome::ExhaustedRetries { last, attempts, reason } => {
                assert_eq!(last, refused());
                assert_eq!(attempts, 3);
                assert_eq!(reason, Exhaustion::AttemptsUsed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(origin.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_use_body_gets_one_attempt() {
        let origin = ScriptedOrigin::new(vec![Step::Fail(refused()), Step::Respond(200)]);
        let mut body = multipart_body();

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            ProxyOutcome::ExhaustedRetries { attempts, reason, .. } => {
                assert_eq!(attempts, 1);
                assert_eq!(reason, Exhaustion::SingleUseBody);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(origin.calls(), 1);
        assert_eq!(body.for_attempt().unwrap_err(), TransportError::BodyConsumed);
    }

    #[tokio::test(start_paused = true)]
    async fn origin_errors_are_never_retried() {
        for status in [404, 500, 503] {
            let origin = ScriptedOrigin::new(vec![Step::Respond(status), Step::Respond(200)]);
            let mut body = text_body();

            let outcome = execute(
                &origin,
                &RetryPolicy::default(),
                &request(),
                &mut body,
                &CancellationToken::new(),
            )
            .await;

            match outcome {
                ProxyOutcome::UpstreamError(response) => assert_eq!(response.status, status),
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert_eq!(origin.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_retried() {
        let origin = ScriptedOrigin::new(vec![Step::Hang, Step::Respond(200)]);
        let mut body = BodyDescriptor::Empty;
        let started = Instant::now();

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, ProxyOutcome::Success(_)));
        assert_eq!(origin.calls(), 2);
        // 30s deadline, then a 1s backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_single_use_body_is_terminal() {
        let origin = ScriptedOrigin::new(vec![Step::Hang, Step::Respond(200)]);
        let mut body = multipart_body();

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            ProxyOutcome::ExhaustedRetries { last, reason, .. } => {
                assert_eq!(last, TransportError::Timeout(Duration::from_secs(30)));
                assert_eq!(reason, Exhaustion::SingleUseBody);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_stops_immediately() {
        let origin = ScriptedOrigin::new(vec![
            Step::Fail(TransportError::InvalidRequest("bad uri".into())),
            Step::Respond(200),
        ]);
        let mut body = BodyDescriptor::Empty;

        let outcome = execute(
            &origin,
            &RetryPolicy::default(),
            &request(),
            &mut body,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            outcome,
            ProxyOutcome::TransportFailure(TransportError::InvalidRequest(_))
        ));
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_stops_the_loop() {
        let origin = ScriptedOrigin::new(vec![Step::Hang, Step::Respond(200)]);
        let mut body = BodyDescriptor::Empty;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let outcome = execute(&origin, &RetryPolicy::default(), &request(), &mut body, &cancel).await;

        assert!(matches!(
            outcome,
            ProxyOutcome::TransportFailure(TransportError::Cancelled)
        ));
        assert_eq!(origin.calls(), 1);
    }

    #[test]
    fn worst_case_budget() {
        // 3 × 30s + 1s + 2s
        assert_eq!(RetryPolicy::default().worst_case(), Duration::from_secs(93));
    }
}
