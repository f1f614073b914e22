//! Persisted record types

use crate::keys::PersistedRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Where a blocked resource was caught
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptionPoint {
    /// `setAttribute("src", ..)` on a script element
    AttributeSet,
    /// Direct `src` property assignment on a script element
    PropertySet,
    /// Page-level fetch override
    Fetch,
    /// Background network proxy
    BackgroundProxy,
    /// Script inserted outside the wrapped creation path
    MutationWatch,
}

impl InterceptionPoint {
    /// Every capture point, in installation order
    pub const ALL: [Self; 5] = [
        Self::AttributeSet,
        Self::PropertySet,
        Self::Fetch,
        Self::BackgroundProxy,
        Self::MutationWatch,
    ];

    /// Stable name used in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttributeSet => "attribute_set",
            Self::PropertySet => "property_set",
            Self::Fetch => "fetch",
            Self::BackgroundProxy => "background_proxy",
            Self::MutationWatch => "mutation_watch",
        }
    }
}

impl std::fmt::Display for InterceptionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL that matched a block pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedEvent {
    /// Requested URL
    pub url: String,
    /// Pattern that matched
    pub pattern: String,
    /// When the request was caught
    pub timestamp: DateTime<Utc>,
    /// Capture point that caught it
    pub interception_point: InterceptionPoint,
}

impl BlockedEvent {
    /// Create event stamped with the current time
    #[must_use]
    pub fn now(
        url: impl Into<String>,
        pattern: impl Into<String>,
        interception_point: InterceptionPoint,
    ) -> Self {
        Self {
            url: url.into(),
            pattern: pattern.into(),
            timestamp: Utc::now(),
            interception_point,
        }
    }
}

/// The blocked-event log is stored as one list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BlockedLog(pub(crate) Vec<BlockedEvent>);

impl PersistedRecord for BlockedLog {
    const VERSION: u32 = 1;
}

/// How a caught error was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Attributed to third-party interference
    Interference,
    /// Genuine application error
    Generic,
}

impl Classification {
    /// Counter kind used for this classification
    #[must_use]
    pub fn counter_kind(&self) -> &'static str {
        match self {
            Self::Interference => "interference",
            Self::Generic => "generic",
        }
    }
}

/// Outcome of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Incident still open
    Pending,
    /// Guard reached ready state again
    Recovered,
    /// Attempt ceiling reached
    Escalated,
}

/// Persisted progress of one guard's incident
///
/// Survives full page reloads so a freshly mounted guard resumes the attempt
/// count instead of restarting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    /// Guard identity (stable across reloads)
    pub guard_id: String,
    /// Incident identifier, for correlating diagnostics
    pub incident_id: Uuid,
    /// Automatic attempts made so far in this incident
    pub attempt_number: u32,
    /// When the incident started
    pub started_at: DateTime<Utc>,
    /// Classification of the error that opened the incident
    pub classification: Classification,
    /// Path the guard was on when the incident opened; empty if unknown
    #[serde(default)]
    pub route: String,
    /// Current outcome
    pub outcome: RecoveryOutcome,
}

impl RecoveryAttempt {
    /// Open a new incident for a guard
    #[must_use]
    pub fn open(guard_id: impl Into<String>, classification: Classification) -> Self {
        Self {
            guard_id: guard_id.into(),
            incident_id: Uuid::new_v4(),
            attempt_number: 0,
            started_at: Utc::now(),
            classification,
            route: String::new(),
            outcome: RecoveryOutcome::Pending,
        }
    }

    /// With the route the failing render happened on
    #[inline]
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Whether the incident is still open
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.outcome == RecoveryOutcome::Pending
    }
}

impl PersistedRecord for RecoveryAttempt {
    const VERSION: u32 = 1;
}

/// Persisted user choice to disable blocking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassFlag {
    /// Whether bypass is on
    pub enabled: bool,
    /// Path prefixes in scope; empty means every path
    #[serde(default)]
    pub scope_path_prefixes: BTreeSet<String>,
}

impl BypassFlag {
    /// Bypass every path
    #[must_use]
    pub fn everywhere() -> Self {
        Self {
            enabled: true,
            scope_path_prefixes: BTreeSet::new(),
        }
    }

    /// Whether `path` is covered by this flag
    ///
    /// Scope entries match whole path segments: `/gallery` covers
    /// `/gallery/42` but not `/gallery-admin`.
    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        self.enabled
            && (self.scope_path_prefixes.is_empty()
                || self
                    .scope_path_prefixes
                    .iter()
                    .any(|prefix| segment_prefix(prefix, path)))
    }
}

fn segment_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl PersistedRecord for BypassFlag {
    const VERSION: u32 = 1;
}
