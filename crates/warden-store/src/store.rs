//! Failure-tolerant diagnostic store
//!
//! Wraps a [`StorageBackend`] so that no storage failure ever reaches a
//! caller. The first failed call flips the store into degraded mode and every
//! later call is served from an in-process map for the rest of the session.
//!
//! Concurrent writers (several guards, several capture points) are not
//! coordinated: counters and logs are last-write-wins.

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::keys::{PersistedRecord, StoreKey, Versioned, DEFAULT_PREFIX};
use crate::records::{BlockedEvent, BlockedLog, BypassFlag, RecoveryAttempt};
use crate::report::DiagnosticsReport;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default cap of the blocked-event log
pub const DEFAULT_MAX_BLOCKED_EVENTS: usize = 100;

/// Best-effort persistent store for Warden diagnostics and recovery state
#[derive(Debug)]
pub struct DiagnosticStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    max_blocked_events: usize,
    degraded: AtomicBool,
    fallback: Mutex<BTreeMap<String, String>>,
}

impl DiagnosticStore {
    /// Create store over a backend with the default prefix
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            prefix: DEFAULT_PREFIX.to_string(),
            max_blocked_events: DEFAULT_MAX_BLOCKED_EVENTS,
            degraded: AtomicBool::new(false),
            fallback: Mutex::new(BTreeMap::new()),
        }
    }

    /// With a custom key prefix
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// With a custom blocked-event cap (minimum 1)
    #[inline]
    #[must_use]
    pub fn with_max_blocked_events(mut self, max: usize) -> Self {
        self.max_blocked_events = max.max(1);
        self
    }

    /// Key prefix owned by this store
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether the backend has failed and the fallback map is in use
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Whether the persistent medium is currently usable
    #[inline]
    #[must_use]
    pub fn storage_available(&self) -> bool {
        !self.is_degraded()
    }

    fn key(&self, key: StoreKey<'_>) -> String {
        key.render(&self.prefix)
    }

    fn degrade(&self, operation: &str, error: &StorageError) {
        if self
            .degraded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::warn!(
                operation,
                error = %error,
                "storage failed; using in-memory fallback for the rest of the session"
            );
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        if !self.is_degraded() {
            match self.backend.get(key) {
                Ok(value) => return value,
                Err(e) => self.degrade("get", &e),
            }
        }
        self.fallback.lock().get(key).cloned()
    }

    fn write_raw(&self, key: &str, value: &str) {
        if !self.is_degraded() {
            match self.backend.set(key, value) {
                Ok(()) => return,
                Err(e) => self.degrade("set", &e),
            }
        }
        self.fallback.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_raw(&self, key: &str) {
        if !self.is_degraded() {
            match self.backend.remove(key) {
                Ok(()) => return,
                Err(e) => self.degrade("remove", &e),
            }
        }
        self.fallback.lock().remove(key);
    }

    fn list_keys(&self) -> Vec<String> {
        if !self.is_degraded() {
            match self.backend.keys() {
                Ok(keys) => return keys,
                Err(e) => self.degrade("keys", &e),
            }
        }
        self.fallback.lock().keys().cloned().collect()
    }

    fn read_record<T: PersistedRecord>(&self, key: StoreKey<'_>) -> Option<T> {
        self.read_raw(&self.key(key))
            .and_then(|text| Versioned::<T>::decode(&text))
    }

    fn write_record<T: PersistedRecord>(&self, key: StoreKey<'_>, record: &T) {
        match Versioned::encode(record) {
            Ok(text) => self.write_raw(&self.key(key), &text),
            Err(e) => tracing::warn!(error = %e, "failed to encode record; write skipped"),
        }
    }

    /// Append a blocked event, dropping the oldest beyond the cap
    pub fn record_blocked(&self, event: BlockedEvent) {
        tracing::debug!(
            url = %event.url,
            pattern = %event.pattern,
            point = %event.interception_point,
            "recording blocked script"
        );
        let mut log: BlockedLog = self.read_record(StoreKey::BlockedEvents).unwrap_or_default();
        log.0.push(event);
        if log.0.len() > self.max_blocked_events {
            let excess = log.0.len() - self.max_blocked_events;
            log.0.drain(..excess);
        }
        self.write_record(StoreKey::BlockedEvents, &log);
    }

    /// Blocked events, oldest first
    #[must_use]
    pub fn blocked_events(&self) -> Vec<BlockedEvent> {
        self.read_record::<BlockedLog>(StoreKey::BlockedEvents)
            .map(|log| log.0)
            .unwrap_or_default()
    }

    /// Increment an error counter and return its new value
    pub fn increment_error_counter(&self, kind: &str) -> u64 {
        let key = self.key(StoreKey::Counter(kind));
        let next = self
            .read_raw(&key)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            .saturating_add(1);
        self.write_raw(&key, &next.to_string());
        next
    }

    /// Current value of an error counter
    #[must_use]
    pub fn error_counter(&self, kind: &str) -> u64 {
        self.read_raw(&self.key(StoreKey::Counter(kind)))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Every error counter by kind
    #[must_use]
    pub fn error_counters(&self) -> BTreeMap<String, u64> {
        let counter_prefix = self.key(StoreKey::Counter(""));
        self.list_keys()
            .into_iter()
            .filter_map(|key| {
                let kind = key.strip_prefix(&counter_prefix)?.to_string();
                let value = self.read_raw(&key)?.parse().ok()?;
                Some((kind, value))
            })
            .collect()
    }

    /// Read a named flag; absent, unreadable or malformed flags are `None`
    #[must_use]
    pub fn get_flag(&self, name: &str) -> Option<serde_json::Value> {
        self.read_raw(&self.key(StoreKey::Flag(name)))
            .and_then(|text| serde_json::from_str(&text).ok())
    }

    /// Write a named flag
    pub fn set_flag(&self, name: &str, value: &serde_json::Value) {
        self.write_raw(&self.key(StoreKey::Flag(name)), &value.to_string());
    }

    /// Delete a named flag
    pub fn remove_flag(&self, name: &str) {
        self.remove_raw(&self.key(StoreKey::Flag(name)));
    }

    /// Persisted recovery attempt for a guard
    #[must_use]
    pub fn load_attempt(&self, guard_id: &str) -> Option<RecoveryAttempt> {
        self.read_record(StoreKey::Attempt(guard_id))
    }

    /// Persist a guard's recovery attempt
    pub fn save_attempt(&self, attempt: &RecoveryAttempt) {
        self.write_record(StoreKey::Attempt(&attempt.guard_id), attempt);
    }

    /// Forget a guard's recovery attempt
    pub fn clear_attempt(&self, guard_id: &str) {
        self.remove_raw(&self.key(StoreKey::Attempt(guard_id)));
    }

    /// Persisted bypass flag (default: disabled)
    #[must_use]
    pub fn bypass_flag(&self) -> BypassFlag {
        self.read_record(StoreKey::Bypass).unwrap_or_default()
    }

    /// Persist the bypass flag
    pub fn save_bypass_flag(&self, flag: &BypassFlag) {
        self.write_record(StoreKey::Bypass, flag);
    }

    /// Remove every Warden key except the bypass flag
    ///
    /// The bypass flag is an explicit user choice and outlives diagnostics.
    /// Keys outside the Warden prefix are never touched. Returns the number of
    /// keys removed.
    pub fn clear_diagnostics(&self) -> usize {
        let bypass_key = self.key(StoreKey::Bypass);
        let owned: Vec<String> = self
            .list_keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix) && *k != bypass_key)
            .collect();
        for key in &owned {
            self.remove_raw(key);
        }
        tracing::info!(removed = owned.len(), "cleared diagnostics");
        owned.len()
    }

    /// Remove at most `limit` foreign keys starting with one of `prefixes`
    ///
    /// Used for the bounded cache purge of a recovery attempt. Keys in the
    /// Warden namespace are skipped. Returns the number of keys removed.
    pub fn purge_matching(&self, prefixes: &[String], limit: usize) -> usize {
        if prefixes.is_empty() || limit == 0 {
            return 0;
        }
        let victims: Vec<String> = self
            .list_keys()
            .into_iter()
            .filter(|k| !k.starts_with(&self.prefix))
            .filter(|k| prefixes.iter().any(|p| k.starts_with(p.as_str())))
            .take(limit)
            .collect();
        for key in &victims {
            self.remove_raw(key);
        }
        tracing::debug!(removed = victims.len(), limit, "purged cache keys");
        victims.len()
    }

    /// Plain-data diagnostics snapshot
    #[must_use]
    pub fn report(&self, bypass_active: bool) -> DiagnosticsReport {
        DiagnosticsReport {
            generated_at: chrono::Utc::now(),
            blocked_events: self.blocked_events(),
            error_counters: self.error_counters(),
            bypass: self.bypass_flag(),
            bypass_active,
            storage_available: self.storage_available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;
    use crate::records::{Classification, InterceptionPoint};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug)]
    struct BrokenStorage;

    impl StorageBackend for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::QuotaExceeded)
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
        fn keys(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".into()))
        }
    }

    fn memory_store() -> (Arc<MemoryStorage>, DiagnosticStore) {
        let backend = Arc::new(MemoryStorage::new());
        let store = DiagnosticStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn blocked_log_is_ordered_and_capped() {
        let (_, store) = memory_store();
        let store = store.with_max_blocked_events(3);
        for i in 0..5 {
            store.record_blocked(BlockedEvent::now(
                format!("/s{i}.js"),
                "s",
                InterceptionPoint::Fetch,
            ));
        }
        let urls: Vec<String> = store.blocked_events().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["/s2.js", "/s3.js", "/s4.js"]);
    }

    #[test]
    fn counters_increment_and_list() {
        let (_, store) = memory_store();
        assert_eq!(store.increment_error_counter("generic"), 1);
        assert_eq!(store.increment_error_counter("generic"), 2);
        assert_eq!(store.increment_error_counter("interference"), 1);
        assert_eq!(store.error_counter("generic"), 2);
        assert_eq!(store.error_counter("missing"), 0);

        let counters = store.error_counters();
        assert_eq!(counters.get("generic"), Some(&2));
        assert_eq!(counters.get("interference"), Some(&1));
    }

    #[test]
    fn flags_roundtrip_json() {
        let (_, store) = memory_store();
        assert_eq!(store.get_flag("mode"), None);
        store.set_flag("mode", &json!({"safe": true}));
        assert_eq!(store.get_flag("mode"), Some(json!({"safe": true})));
        store.remove_flag("mode");
        assert_eq!(store.get_flag("mode"), None);
    }

    #[test]
    fn clear_diagnostics_keeps_foreign_keys_and_bypass() {
        let backend = Arc::new(MemoryStorage::with_entries([
            ("app:session", "abc"),
            ("theme", "dark"),
        ]));
        let store = DiagnosticStore::new(backend.clone());
        store.increment_error_counter("generic");
        store.set_flag("x", &json!(1));
        store.save_attempt(&RecoveryAttempt::open("root", Classification::Interference));
        store.save_bypass_flag(&BypassFlag::everywhere());

        assert_eq!(store.clear_diagnostics(), 3);
        assert_eq!(backend.get("app:session").unwrap().as_deref(), Some("abc"));
        assert_eq!(backend.get("theme").unwrap().as_deref(), Some("dark"));
        assert!(store.bypass_flag().enabled);
        assert!(store.load_attempt("root").is_none());
    }

    #[test]
    fn purge_is_bounded_and_skips_own_namespace() {
        let backend = Arc::new(MemoryStorage::with_entries([
            ("ext-cache:1", "a"),
            ("ext-cache:2", "b"),
            ("ext-cache:3", "c"),
            ("user:profile", "keep"),
        ]));
        let store = DiagnosticStore::new(backend.clone());
        store.set_flag("ext-cache", &json!(true));

        let prefixes = vec!["ext-cache".to_string(), "warden:".to_string()];
        assert_eq!(store.purge_matching(&prefixes, 2), 2);
        assert_eq!(backend.len(), 3);
        assert_eq!(store.purge_matching(&prefixes, 2), 1);
        assert_eq!(store.purge_matching(&prefixes, 2), 0);
        assert_eq!(store.get_flag("ext-cache"), Some(json!(true)));
        assert_eq!(backend.get("user:profile").unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn broken_backend_never_propagates() {
        let store = DiagnosticStore::new(Arc::new(BrokenStorage));
        assert!(store.storage_available());

        assert_eq!(store.get_flag("anything"), None);
        assert!(store.is_degraded());

        store.record_blocked(BlockedEvent::now("/x.js", "x", InterceptionPoint::Fetch));
        assert_eq!(store.blocked_events().len(), 1);
        assert_eq!(store.increment_error_counter("generic"), 1);
        store.set_flag("f", &json!("v"));
        assert_eq!(store.get_flag("f"), Some(json!("v")));
        assert_eq!(store.clear_diagnostics(), 3);
        assert!(!store.report(false).storage_available);
    }

    #[test]
    fn attempts_are_namespaced_by_guard() {
        let (_, store) = memory_store();
        let mut a = RecoveryAttempt::open("outer", Classification::Interference);
        a.attempt_number = 2;
        store.save_attempt(&a);
        store.save_attempt(&RecoveryAttempt::open("inner", Classification::Interference));

        assert_eq!(store.load_attempt("outer").map(|r| r.attempt_number), Some(2));
        assert_eq!(store.load_attempt("inner").map(|r| r.attempt_number), Some(0));
        store.clear_attempt("outer");
        assert!(store.load_attempt("outer").is_none());
        assert!(store.load_attempt("inner").is_some());
    }
}
