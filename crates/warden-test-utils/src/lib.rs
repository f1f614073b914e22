//! Testing utilities for the Warden workspace
//!
//! Shared fakes and fixtures: failing storage, a counting network, a host
//! that records recovery actions, and canned errors.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use warden_classifier::ErrorReport;
use warden_intercept::{Fetch, FetchError, FetchInput, Response};
use warden_recovery::RecoveryHost;
use warden_store::{
    BypassController, DiagnosticStore, Location, MemoryStorage, StorageBackend, StorageError,
};

/// Backend that throws on every call, like storage disabled by the browser
#[derive(Debug, Default)]
pub struct FailingStorage;

impl StorageBackend for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("SecurityError: storage disabled".into()))
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded)
    }
    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("SecurityError: storage disabled".into()))
    }
    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("SecurityError: storage disabled".into()))
    }
}

/// Network that answers every request and remembers what it saw
#[derive(Debug, Default)]
pub struct FakeNetwork {
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of requests that reached the network
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs that reached the network, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait::async_trait]
impl Fetch for FakeNetwork {
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(input.url().to_string());
        Ok(Response::ok(input.url(), "application/javascript", "export default 1;"))
    }
}

/// Action a guard asked of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Rerender(String),
    Navigate(String),
    Reload,
}

/// Host that records every action
#[derive(Debug, Default)]
pub struct RecordingHost {
    actions: Mutex<Vec<HostAction>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn actions(&self) -> Vec<HostAction> {
        self.actions.lock().clone()
    }

    pub fn rerenders(&self) -> usize {
        self.actions
            .lock()
            .iter()
            .filter(|a| matches!(a, HostAction::Rerender(_)))
            .count()
    }

    pub fn clear(&self) {
        self.actions.lock().clear();
    }
}

impl RecoveryHost for RecordingHost {
    fn rerender(&self, guard_id: &str) {
        self.actions.lock().push(HostAction::Rerender(guard_id.to_string()));
    }
    fn navigate(&self, path: &str) {
        self.actions.lock().push(HostAction::Navigate(path.to_string()));
    }
    fn reload(&self) {
        self.actions.lock().push(HostAction::Reload);
    }
}

/// Store over fresh in-memory storage
pub fn memory_store() -> Arc<DiagnosticStore> {
    Arc::new(DiagnosticStore::new(Arc::new(MemoryStorage::new())))
}

/// Store over the given backend
pub fn store_over(backend: Arc<dyn StorageBackend>) -> Arc<DiagnosticStore> {
    Arc::new(DiagnosticStore::new(backend))
}

/// Bypass controller for a page load at `url`
pub fn bypass_at(store: &Arc<DiagnosticStore>, url: &str) -> Arc<BypassController> {
    Arc::new(BypassController::load(store.clone(), Location::parse(url)))
}

/// Error thrown when the extension bundle failed to load
pub fn interference_error() -> ErrorReport {
    ErrorReport::new("TypeError", "useUserExtension is not a function")
        .with_stack("at App (https://app.example.com/assets/index.js:1:200)")
}

/// Opaque error an extension surfaces through the page
pub fn redacted_error() -> ErrorReport {
    ErrorReport::new("Error", "[redacted]")
        .with_stack("at chrome-extension://abcdef/inject.js:3:14")
}

/// Genuine application bug
pub fn generic_error() -> ErrorReport {
    ErrorReport::new("TypeError", "cannot read property 'x' of undefined")
}
