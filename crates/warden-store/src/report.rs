//! Diagnostics export

use crate::records::{BlockedEvent, BypassFlag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single structured value for copy/paste support requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Blocked events, oldest first
    pub blocked_events: Vec<BlockedEvent>,
    /// Error counters by kind
    pub error_counters: BTreeMap<String, u64>,
    /// Persisted bypass flag
    pub bypass: BypassFlag,
    /// Whether bypass applies to the current page view
    pub bypass_active: bool,
    /// Whether the persistent medium is usable
    pub storage_available: bool,
}

impl DiagnosticsReport {
    /// Pretty JSON rendering
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Short human-readable rendering
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Warden Diagnostics\n");
        out.push_str("==================\n");
        out.push_str(&format!("Generated: {}\n", self.generated_at.to_rfc3339()));
        out.push_str(&format!(
            "Storage: {}\n",
            if self.storage_available { "available" } else { "unavailable (in-memory)" }
        ));
        out.push_str(&format!(
            "Bypass: persisted={} active={}",
            self.bypass.enabled, self.bypass_active
        ));
        if !self.bypass.scope_path_prefixes.is_empty() {
            let scope: Vec<&str> = self.bypass.scope_path_prefixes.iter().map(String::as_str).collect();
            out.push_str(&format!(" scope=[{}]", scope.join(", ")));
        }
        out.push('\n');

        out.push_str("Error counters:\n");
        if self.error_counters.is_empty() {
            out.push_str("  (none)\n");
        }
        for (kind, count) in &self.error_counters {
            out.push_str(&format!("  {kind}: {count}\n"));
        }

        out.push_str(&format!("Blocked scripts ({}):\n", self.blocked_events.len()));
        for event in &self.blocked_events {
            out.push_str(&format!(
                "  [{}] {} (pattern '{}') at {}\n",
                event.interception_point,
                event.url,
                event.pattern,
                event.timestamp.to_rfc3339()
            ));
        }
        out
    }
}
