//! Linear backoff between attempts.

use std::time::Duration;

/// Delay after a failed `attempt` (1-based): `attempt × step`.
///
/// With a one-second step, attempt 1 waits 1s and attempt 2 waits 2s.
pub fn linear_backoff(attempt: u32, step: Duration) -> Duration {
    step.saturating_mul(attempt)
}
