//! Header filtering in both directions.
//!
//! # Responsibilities
//! - Build the header set sent to the origin
//! - Build the header set relayed back to the caller
//!
//! # Design Decisions
//! - Rules are declared tables, not ad-hoc checks inside the transport code
//! - Multipart requests lose their framing headers so the client re-encodes the
//!   boundary and length
//! - `Access-Control-*` response headers are owned by the gateway's CORS layer only

use axum::http::header::{self, HeaderMap, HeaderName};

/// When an outbound rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Always,
    MultipartOnly,
}

/// Headers never sent to the origin.
pub const OUTBOUND_DENY: &[(HeaderName, Applies)] = &[
    (header::HOST, Applies::Always),
    (header::CONNECTION, Applies::Always),
    (header::TRANSFER_ENCODING, Applies::Always),
    (header::TE, Applies::Always),
    (header::UPGRADE, Applies::Always),
    (header::PROXY_AUTHORIZATION, Applies::Always),
    (header::CONTENT_TYPE, Applies::MultipartOnly),
    (header::CONTENT_LENGTH, Applies::MultipartOnly),
];

/// Headers never copied from the origin's response.
pub const INBOUND_DENY: &[HeaderName] = &[
    header::ACCESS_CONTROL_ALLOW_ORIGIN,
    header::ACCESS_CONTROL_ALLOW_METHODS,
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
    header::ACCESS_CONTROL_EXPOSE_HEADERS,
    header::ACCESS_CONTROL_MAX_AGE,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

/// `Keep-Alive` and `Proxy-Connection` have no constant in `http`.
const HOP_BY_HOP_EXTRA: &[&str] = &["keep-alive", "proxy-connection"];

pub fn is_outbound_denied(name: &HeaderName, multipart: bool) -> bool {
    HOP_BY_HOP_EXTRA.contains(&name.as_str())
        || OUTBOUND_DENY.iter().any(|(denied, applies)| {
            denied == name && (*applies == Applies::Always || multipart)
        })
}

pub fn is_inbound_denied(name: &HeaderName) -> bool {
    HOP_BY_HOP_EXTRA.contains(&name.as_str()) || INBOUND_DENY.contains(name)
}

/// Headers to send to the origin.
pub fn outbound(headers: &HeaderMap, multipart: bool) -> HeaderMap {
    filter(headers, |name| !is_outbound_denied(name, multipart))
}

/// Headers to relay to the caller.
pub fn inbound(headers: &HeaderMap) -> HeaderMap {
    filter(headers, |name| !is_inbound_denied(name))
}

fn filter<F>(headers: &HeaderMap, keep: F) -> HeaderMap
where
    F: Fn(&HeaderName) -> bool,
{
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if keep(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}
