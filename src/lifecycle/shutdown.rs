//! Shutdown coordination for the gateway.
//!
//! A single root [`CancellationToken`]: the server's graceful-shutdown future
//! and any background task wait on child tokens of it.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when shutdown is triggered.
    ///
    /// Cancelling the returned token does not shut anything else down.
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Begin shutdown. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.root.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.root.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }
}
