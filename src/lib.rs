//! Origin gateway library.
//!
//! Forwards `/api/*` and `/ai-api/*` to a single internal origin, retrying
//! transport failures and relaying the origin's answer unchanged.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
