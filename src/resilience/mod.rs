//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → retries.rs (attempt loop, retry decision, single-use body rule)
//!     → timeouts.rs (per-attempt deadline, cancels the call through its token)
//!     → backoff.rs (linear delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Only transport failures are retried; origin responses never are
//! - Multipart bodies get exactly one attempt

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{execute, Exhaustion, ProxyOutcome, RetryPolicy};
