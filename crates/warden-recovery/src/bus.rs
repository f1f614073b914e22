//! Global unhandled-error channel
//!
//! Errors that never pass through a guard's render boundary (unhandled
//! promise rejections, window error events) are published here; every
//! listening guard receives them.

use tokio::sync::broadcast;
use warden_classifier::ErrorReport;

/// Default buffered errors per listener
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Broadcast channel of unhandled errors
#[derive(Debug, Clone)]
pub struct ErrorBus {
    tx: broadcast::Sender<ErrorReport>,
}

impl ErrorBus {
    /// Create bus buffering `capacity` errors per listener
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an error; returns how many listeners received it
    pub fn publish(&self, error: ErrorReport) -> usize {
        tracing::debug!(%error, "unhandled error published");
        self.tx.send(error).unwrap_or(0)
    }

    /// New receiver
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ErrorReport> {
        self.tx.subscribe()
    }

    /// Current listener count
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
