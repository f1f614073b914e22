//! What a guard renders

use warden_store::DiagnosticsReport;

/// Manual control offered by a fallback view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remedy {
    /// Re-render children
    Retry,
    /// Reload the page
    Reload,
    /// Clear Warden diagnostics and purgeable caches, then reload
    ClearAndReload,
    /// Navigate to the home route
    NavigateHome,
}

/// Why a fallback is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Genuine application error; manual retry only
    Generic,
    /// Interference persisted past the attempt ceiling
    Escalated,
}

impl FallbackKind {
    /// Remedies offered for this fallback
    #[must_use]
    pub fn remedies(&self) -> Vec<Remedy> {
        match self {
            Self::Generic => vec![Remedy::Retry],
            Self::Escalated => vec![Remedy::Reload, Remedy::ClearAndReload, Remedy::NavigateHome],
        }
    }
}

/// Rendered output of a guard
#[derive(Debug, Clone, PartialEq)]
pub enum GuardView {
    /// Children render normally
    Children,
    /// Transient indicator while an automatic attempt is pending
    Recovering {
        /// Attempt in progress, 1-based
        attempt: u32,
        /// Ceiling
        max_attempts: u32,
    },
    /// Watchdog fired: degraded but interactive
    StillTrying {
        /// Attempts made so far in this incident
        attempt: u32,
    },
    /// Static fallback
    Fallback {
        /// Reason
        kind: FallbackKind,
        /// Message of the error that led here
        message: Option<String>,
        /// Manual controls
        remedies: Vec<Remedy>,
        /// Diagnostics panel contents
        diagnostics: Option<Box<DiagnosticsReport>>,
    },
}

impl GuardView {
    /// Whether the fallback offers `remedy`
    #[must_use]
    pub fn offers(&self, remedy: Remedy) -> bool {
        matches!(self, Self::Fallback { remedies, .. } if remedies.contains(&remedy))
    }
}
