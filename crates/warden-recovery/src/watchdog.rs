//! Stuck-state watchdog
//!
//! A wall-clock deadline, armed by a guard once an error has been seen.
//! Fires at most once; cancelling or dropping the watchdog disarms it.

use crate::error::RecoveryError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// One-shot deadline timer
#[derive(Debug)]
pub struct Watchdog {
    deadline: Duration,
    task: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    /// Create an unarmed watchdog
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            task: None,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deadline
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Arm; `on_stuck` runs once when the deadline passes
    ///
    /// Starting an armed or already fired watchdog does nothing.
    ///
    /// # Errors
    /// - `RecoveryError::NoRuntime` outside a tokio runtime
    pub fn start<F>(&mut self, on_stuck: F) -> Result<(), RecoveryError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.task.is_some() || self.has_fired() {
            return Ok(());
        }
        let handle = Handle::try_current().map_err(|_| RecoveryError::NoRuntime)?;
        let deadline = self.deadline;
        let fired = self.fired.clone();
        self.task = Some(handle.spawn(async move {
            tokio::time::sleep(deadline).await;
            if !fired.swap(true, Ordering::SeqCst) {
                tracing::warn!(?deadline, "watchdog deadline passed; route still not ready");
                on_stuck();
            }
        }));
        Ok(())
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether armed and not yet fired
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished()) && !self.has_fired()
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
