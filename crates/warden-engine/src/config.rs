//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [storage]
//! prefix = "warden:"
//! max_blocked_events = 100
//!
//! [interception]
//! block_patterns = ["useuserextension", "chrome-extension://"]
//! bypass_query_param = "warden-bypass"
//!
//! [recovery]
//! max_attempts = 3
//! retry_delay_ms = 1000
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use warden_classifier::{PatternSet, DEFAULT_BLOCK_PATTERNS};
use warden_intercept::context::DEFAULT_VERDICT_CACHE_CAPACITY;
use warden_recovery::config::DEFAULT_PURGE_PREFIXES;
use warden_recovery::RecoveryConfig;
use warden_store::{DEFAULT_BYPASS_QUERY_PARAM, DEFAULT_MAX_BLOCKED_EVENTS, DEFAULT_PREFIX};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Diagnostic store settings
    pub storage: StorageSection,
    /// Interception settings
    pub interception: InterceptionSection,
    /// Recovery settings
    pub recovery: RecoverySection,
    /// Logging settings
    pub logging: LoggingSection,
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Key prefix owned by Warden in the shared medium
    pub prefix: String,
    /// Cap on the blocked-event log
    pub max_blocked_events: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            max_blocked_events: DEFAULT_MAX_BLOCKED_EVENTS,
        }
    }
}

/// `[interception]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptionSection {
    /// Case-insensitive substring patterns, first match reported
    pub block_patterns: Vec<String>,
    /// Query parameter forcing bypass for one page view
    pub bypass_query_param: String,
    /// Memoized URL verdicts
    pub verdict_cache_capacity: u64,
}

impl Default for InterceptionSection {
    fn default() -> Self {
        Self {
            block_patterns: DEFAULT_BLOCK_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            bypass_query_param: DEFAULT_BYPASS_QUERY_PARAM.to_string(),
            verdict_cache_capacity: DEFAULT_VERDICT_CACHE_CAPACITY,
        }
    }
}

/// `[recovery]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySection {
    /// Automatic attempts per incident
    pub max_attempts: u32,
    /// Fixed delay before each attempt, in milliseconds
    pub retry_delay_ms: u64,
    /// Attempts that re-render in place
    pub rerender_attempts: u32,
    /// Known-safe route for later attempts
    pub safe_path: String,
    /// Home route for the manual remedy
    pub home_path: String,
    /// Foreign storage-key prefixes purgeable during recovery
    pub purge_prefixes: Vec<String>,
    /// Keys purged per attempt
    pub purge_batch: usize,
    /// Scope bypass to the route when interference escalates
    pub auto_bypass_on_escalation: bool,
    /// Stuck-state deadline, in milliseconds
    pub watchdog_deadline_ms: u64,
    /// Diagnostics panel in the escalated fallback
    pub show_diagnostics: bool,
}

impl Default for RecoverySection {
    fn default() -> Self {
        let defaults = RecoveryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            retry_delay_ms: duration_ms(defaults.retry_delay),
            rerender_attempts: defaults.rerender_attempts,
            safe_path: defaults.safe_path,
            home_path: defaults.home_path,
            purge_prefixes: DEFAULT_PURGE_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            purge_batch: defaults.purge_batch,
            auto_bypass_on_escalation: defaults.auto_bypass_on_escalation,
            watchdog_deadline_ms: duration_ms(defaults.watchdog_deadline),
            show_diagnostics: defaults.show_diagnostics,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl WardenConfig {
    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns an error if the TOML is invalid or fails validation
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns the serializer error
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check semantic constraints
    ///
    /// # Errors
    /// - `ConfigError::Validation` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        // an empty prefix would let clear_diagnostics touch application keys
        if self.storage.prefix.trim().is_empty() {
            return Err(ConfigError::validation("storage.prefix must not be empty"));
        }
        if self.storage.max_blocked_events == 0 {
            return Err(ConfigError::validation(
                "storage.max_blocked_events must be at least 1",
            ));
        }
        if self.interception.bypass_query_param.trim().is_empty() {
            return Err(ConfigError::validation(
                "interception.bypass_query_param must not be empty",
            ));
        }
        for (field, path) in [
            ("recovery.safe_path", &self.recovery.safe_path),
            ("recovery.home_path", &self.recovery.home_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::validation(format!(
                    "{field} must start with '/', got '{path}'"
                )));
            }
        }
        if self.recovery.watchdog_deadline_ms == 0 {
            return Err(ConfigError::validation(
                "recovery.watchdog_deadline_ms must be positive",
            ));
        }
        if self
            .recovery
            .purge_prefixes
            .iter()
            .any(|p| p.trim().is_empty())
        {
            return Err(ConfigError::validation(
                "recovery.purge_prefixes must not contain empty prefixes",
            ));
        }
        if self.interception.block_patterns.iter().all(|p| p.trim().is_empty()) {
            tracing::warn!("no block patterns configured; interception will allow everything");
        }
        Ok(())
    }

    /// Block patterns as a [`PatternSet`]
    #[must_use]
    pub fn pattern_set(&self) -> PatternSet {
        PatternSet::new(&self.interception.block_patterns)
    }

    /// Recovery tunables
    #[must_use]
    pub fn recovery_config(&self) -> RecoveryConfig {
        let r = &self.recovery;
        RecoveryConfig {
            max_attempts: r.max_attempts,
            retry_delay: Duration::from_millis(r.retry_delay_ms),
            rerender_attempts: r.rerender_attempts,
            safe_path: r.safe_path.clone(),
            home_path: r.home_path.clone(),
            purge_prefixes: r.purge_prefixes.clone(),
            purge_batch: r.purge_batch,
            auto_bypass_on_escalation: r.auto_bypass_on_escalation,
            watchdog_deadline: Duration::from_millis(r.watchdog_deadline_ms),
            show_diagnostics: r.show_diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_defaults() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.recovery_config(), RecoveryConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = WardenConfig::from_toml_str(
            r#"
            [recovery]
            max_attempts = 5
            retry_delay_ms = 250

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.recovery.max_attempts, 5);
        assert_eq!(config.recovery_config().retry_delay, Duration::from_millis(250));
        assert_eq!(config.recovery.rerender_attempts, 2);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.storage.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn validation_rejects_dangerous_values() {
        let err = WardenConfig::from_toml_str("[storage]\nprefix = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = WardenConfig::from_toml_str("[recovery]\nsafe_path = \"safe\"").unwrap_err();
        assert!(err.to_string().contains("recovery.safe_path"));

        let err = WardenConfig::from_toml_str("[recovery]\npurge_prefixes = [\"\"]").unwrap_err();
        assert!(err.to_string().contains("purge_prefixes"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = WardenConfig::from_toml_str("[recovery\nmax_attempts = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_round_trip_and_file_load() {
        let mut config = WardenConfig::default();
        config.interception.block_patterns = vec!["tracker".into()];
        let text = config.to_toml_string().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, text).unwrap();
        assert_eq!(WardenConfig::load(&path).unwrap(), config);
        assert!(config.pattern_set().is_blocked("/js/Tracker.js"));

        let missing = WardenConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
