//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (mount lookup, longest prefix first)
//!     → matcher.rs (segment-aware prefix match, raw suffix)
//!     → Return: mount + suffix, or no match
//! ```
//!
//! # Design Decisions
//! - Mounts compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same mount

pub mod matcher;
pub mod router;

pub use router::{Mount, MountTable, Resolved, RouteError};
