//! Recovery configuration

use std::time::Duration;

/// Default storage-key prefixes purged during recovery
pub const DEFAULT_PURGE_PREFIXES: &[&str] = &[
    "cache:",
    "sw-cache",
    "extension",
    "chrome-extension",
    "moz-extension",
];

/// Tunables for every guard
///
/// The ceiling (`max_attempts`) cannot be disabled; a value of `0` means
/// the first interference error escalates immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Automatic attempts per incident before escalation
    pub max_attempts: u32,
    /// Fixed delay before each automatic action
    pub retry_delay: Duration,
    /// Attempts that re-render in place; later ones navigate to `safe_path`
    pub rerender_attempts: u32,
    /// Known-safe route for late attempts
    pub safe_path: String,
    /// Target of the "navigate home" remedy
    pub home_path: String,
    /// Foreign storage-key prefixes that may be purged
    pub purge_prefixes: Vec<String>,
    /// Most keys purged per attempt
    pub purge_batch: usize,
    /// Add the route to bypass scope when an interference incident escalates
    pub auto_bypass_on_escalation: bool,
    /// Stuck-state deadline once an error has been seen
    pub watchdog_deadline: Duration,
    /// Show the diagnostics panel in the escalated fallback
    pub show_diagnostics: bool,
}

impl RecoveryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt ceiling
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// With delay between attempts
    #[inline]
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// With number of in-place re-render attempts
    #[inline]
    #[must_use]
    pub fn with_rerender_attempts(mut self, attempts: u32) -> Self {
        self.rerender_attempts = attempts;
        self
    }

    /// With safe navigation target
    #[inline]
    #[must_use]
    pub fn with_safe_path(mut self, path: impl Into<String>) -> Self {
        self.safe_path = path.into();
        self
    }

    /// With watchdog deadline
    #[inline]
    #[must_use]
    pub fn with_watchdog_deadline(mut self, deadline: Duration) -> Self {
        self.watchdog_deadline = deadline;
        self
    }

    /// With or without automatic bypass escalation
    #[inline]
    #[must_use]
    pub fn with_auto_bypass(mut self, enabled: bool) -> Self {
        self.auto_bypass_on_escalation = enabled;
        self
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1_000),
            rerender_attempts: 2,
            safe_path: "/".to_string(),
            home_path: "/".to_string(),
            purge_prefixes: DEFAULT_PURGE_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            purge_batch: 10,
            auto_bypass_on_escalation: true,
            watchdog_deadline: Duration::from_secs(10),
            show_diagnostics: true,
        }
    }
}
