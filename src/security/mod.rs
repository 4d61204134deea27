//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip identity and hop-by-hop headers for the origin)
//!     → Forward to origin
//! Origin response:
//!     → headers.rs (strip CORS and hop-by-hop headers)
//!     → CORS layer adds the gateway's own Access-Control-* headers
//! ```

pub mod headers;
