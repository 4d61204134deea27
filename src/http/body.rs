//! Request body classification and materialization.
//!
//! The inbound body is a one-shot stream. It is read exactly once, before the
//! first upstream attempt, into a [`BodyDescriptor`]. Text-like bodies become
//! reusable bytes; multipart uploads are re-encoded as a form that can be
//! handed to a single attempt only.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use reqwest::multipart::{Form, Part};

use crate::upstream::{AttemptBody, TransportError};

/// How a request body may be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyClass {
    /// GET/HEAD: nothing to send.
    None,
    /// Text or bytes that can be re-sent verbatim.
    Reusable,
    /// Multipart form data: transmitted at most once.
    SingleUse,
}

/// Decide how the body may be replayed from the method and `Content-Type`.
pub fn classify(method: &Method, content_type: Option<&str>) -> BodyClass {
    if method == Method::GET || method == Method::HEAD {
        return BodyClass::None;
    }
    match content_type {
        Some(ct) if is_multipart(ct) => BodyClass::SingleUse,
        _ => BodyClass::Reusable,
    }
}

pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("multipart/form-data")
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Failure to read the inbound body. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("failed to parse multipart body: {0}")]
    Multipart(String),
}

/// A multipart form that can be taken by one attempt.
#[derive(Debug)]
pub struct MultipartBody {
    form: Option<Form>,
    parts: usize,
}

impl MultipartBody {
    pub fn new(form: Form, parts: usize) -> Self {
        Self {
            form: Some(form),
            parts,
        }
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    fn take(&mut self) -> Result<Form, TransportError> {
        self.form.take().ok_or(TransportError::BodyConsumed)
    }
}

/// The materialized inbound body.
#[derive(Debug)]
pub enum BodyDescriptor {
    Empty,
    Text(Bytes),
    Multipart(MultipartBody),
}

impl BodyDescriptor {
    pub fn is_single_use(&self) -> bool {
        matches!(self, BodyDescriptor::Multipart(_))
    }

    pub fn is_multipart(&self) -> bool {
        self.is_single_use()
    }

    /// Produce the payload for the next attempt.
    ///
    /// Asking twice for a single-use body is an error, not an empty body.
    pub fn for_attempt(&mut self) -> Result<AttemptBody, TransportError> {
        match self {
            BodyDescriptor::Empty => Ok(AttemptBody::Empty),
            BodyDescriptor::Text(bytes) => Ok(AttemptBody::Bytes(bytes.clone())),
            BodyDescriptor::Multipart(multipart) => multipart.take().map(AttemptBody::Multipart),
        }
    }

    pub fn len_hint(&self) -> Option<usize> {
        match self {
            BodyDescriptor::Empty => Some(0),
            BodyDescriptor::Text(bytes) => Some(bytes.len()),
            BodyDescriptor::Multipart(_) => None,
        }
    }
}

/// Read the inbound body exactly once according to its class.
pub async fn materialize(
    request: Request<Body>,
    class: BodyClass,
    limit: usize,
) -> Result<BodyDescriptor, MaterializeError> {
    if let Some(len) = declared_length(request.headers()) {
        if len > limit {
            return Err(MaterializeError::TooLarge { limit });
        }
    }

    match class {
        BodyClass::None => Ok(BodyDescriptor::Empty),
        BodyClass::Reusable => {
            let bytes = axum::body::to_bytes(request.into_body(), limit)
                .await
                .map_err(|e| {
                    if e.to_string().contains("length limit") {
                        MaterializeError::TooLarge { limit }
                    } else {
                        MaterializeError::Read(e.to_string())
                    }
                })?;
            if bytes.is_empty() {
                Ok(BodyDescriptor::Empty)
            } else {
                Ok(BodyDescriptor::Text(bytes))
            }
        }
        BodyClass::SingleUse => read_multipart(request, limit).await,
    }
}

async fn read_multipart(request: Request<Body>, limit: usize) -> Result<BodyDescriptor, MaterializeError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| MaterializeError::Multipart(e.body_text()))?;

    let mut form = Form::new();
    let mut parts = 0;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            MaterializeError::TooLarge { limit }
        } else {
            MaterializeError::Multipart(e.body_text())
        }
    })? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let mime = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| MaterializeError::Multipart(e.body_text()))?;

        let mut part = Part::bytes(data.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(mime) = mime {
            part = part
                .mime_str(&mime)
                .map_err(|e| MaterializeError::Multipart(e.to_string()))?;
        }
        form = form.part(name, part);
        parts += 1;
    }

    tracing::debug!(parts, "Multipart body re-encoded");
    Ok(BodyDescriptor::Multipart(MultipartBody::new(form, parts)))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
