//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → request.rs (request ID, method check, captured metadata)
//!     → body.rs (classify and materialize the body once)
//!     → [resilience: retry loop against the origin]
//!     → response.rs (stream or buffer, filter headers, error envelope)
//!     → Send to client
//! ```

pub mod body;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{GatewayServer, ServerError};
