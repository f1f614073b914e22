//! Page-load wiring
//!
//! An [`Engine`] is built once per page load. It opens the diagnostic store,
//! snapshots the bypass flag for the load, installs the interception layer
//! and owns every mounted recovery guard.

use crate::config::WardenConfig;
use crate::error::EngineError;
use crate::keys::{KeyChord, BYPASS_TOGGLE};
use dashmap::DashMap;
use std::sync::Arc;
use warden_classifier::{ErrorReport, PatternSet};
use warden_intercept::{
    CapabilityRegistry, Document, ElementFactory, ElementHandle, Fetch, FetchError, FetchInput,
    InstallReport, InterceptionContext, InterceptionLayer, NativeElementFactory, Response,
};
use warden_recovery::bus::DEFAULT_BUS_CAPACITY;
use warden_recovery::{ErrorBus, RecoveryGuard, RecoveryHost};
use warden_store::{
    BypassChange, BypassController, DiagnosticStore, DiagnosticsReport, Location,
    StorageBackend,
};

/// Network used when nothing real is wired in
#[derive(Debug, Default)]
pub struct OfflineNetwork;

#[async_trait::async_trait]
impl Fetch for OfflineNetwork {
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError> {
        Err(FetchError::Network(format!("offline: {}", input.url())))
    }
}

/// Host that only logs what recovery asked for
#[derive(Debug, Default)]
pub struct LoggingHost;

impl RecoveryHost for LoggingHost {
    fn rerender(&self, guard_id: &str) {
        tracing::info!(guard = guard_id, "re-render requested");
    }

    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigation requested");
    }

    fn reload(&self) {
        tracing::info!("reload requested");
    }
}

/// One page load's worth of interference mitigation
#[derive(Debug)]
pub struct Engine {
    config: WardenConfig,
    store: Arc<DiagnosticStore>,
    bypass: Arc<BypassController>,
    layer: InterceptionLayer,
    document: Arc<Document>,
    host: Arc<dyn RecoveryHost>,
    errors: ErrorBus,
    guards: DashMap<String, RecoveryGuard>,
}

impl Engine {
    /// Wire a page load at `url`
    ///
    /// Nothing is installed yet; call [`Engine::install`] before any page
    /// code runs.
    ///
    /// # Errors
    /// - `EngineError::Config` if the configuration fails validation
    pub fn init(
        config: WardenConfig,
        backend: Arc<dyn StorageBackend>,
        url: &str,
        network: Arc<dyn Fetch>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let store = Arc::new(
            DiagnosticStore::new(backend)
                .with_prefix(config.storage.prefix.clone())
                .with_max_blocked_events(config.storage.max_blocked_events),
        );
        let bypass = Arc::new(
            BypassController::load(store.clone(), Location::parse(url))
                .with_query_param(config.interception.bypass_query_param.clone()),
        );
        let context = Arc::new(
            InterceptionContext::new(config.pattern_set(), store.clone(), bypass.clone())
                .with_cache_capacity(config.interception.verdict_cache_capacity),
        );
        let registry = Arc::new(CapabilityRegistry::new(
            network,
            Arc::new(NativeElementFactory),
        ));
        let document = Document::new();
        let layer = InterceptionLayer::new(context, registry).with_document(document.clone());

        tracing::info!(
            url,
            patterns = config.interception.block_patterns.len(),
            bypass_active = bypass.is_active(),
            storage_available = store.storage_available(),
            "engine initialized"
        );

        Ok(Self {
            config,
            store,
            bypass,
            layer,
            document,
            host: Arc::new(LoggingHost),
            errors: ErrorBus::new(DEFAULT_BUS_CAPACITY),
            guards: DashMap::new(),
        })
    }

    /// With the application's routing and rendering collaborator
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn RecoveryHost>) -> Self {
        self.host = host;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Diagnostic store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<DiagnosticStore> {
        &self.store
    }

    /// Bypass controller for this load
    #[inline]
    #[must_use]
    pub fn bypass(&self) -> &Arc<BypassController> {
        &self.bypass
    }

    /// Interception layer
    #[inline]
    #[must_use]
    pub fn layer(&self) -> &InterceptionLayer {
        &self.layer
    }

    /// Install every capture point
    pub fn install(&self) -> InstallReport {
        self.layer.install()
    }

    /// Fetch through the page-level capability
    ///
    /// # Errors
    /// Returns the underlying transport error
    pub async fn fetch(&self, input: impl Into<FetchInput>) -> Result<Response, FetchError> {
        let fetch = self.layer.registry().fetch();
        fetch.fetch(input.into()).await
    }

    /// Create an element through the page-level factory
    #[must_use]
    pub fn create_element(&self, tag: &str) -> Arc<dyn ElementHandle> {
        self.layer.registry().elements().create_element(tag)
    }

    /// Page document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// In-page navigation; bypass is re-evaluated for the new path
    pub fn navigate(&self, url: &str) {
        self.bypass.navigate(Location::parse(url));
        if let Err(e) = self.layer.sync_proxy() {
            tracing::warn!(error = %e, "background proxy not updated after navigation");
        }
    }

    /// Replace the block patterns at every capture point
    pub fn configure_patterns(&self, patterns: PatternSet) {
        tracing::info!(patterns = patterns.len(), "block patterns reconfigured");
        self.layer.context().configure(patterns);
        if let Err(e) = self.layer.sync_proxy() {
            tracing::warn!(error = %e, "background proxy not updated with new patterns");
        }
    }

    /// Keyboard input; the reserved chord toggles persisted bypass
    ///
    /// Returns the change when the chord was consumed. The change applies on
    /// the next load, so a reload is requested from the host.
    pub fn handle_key(&self, chord: KeyChord) -> Option<BypassChange> {
        if chord != BYPASS_TOGGLE {
            return None;
        }
        let change = self.bypass.toggle();
        tracing::info!(chord = %chord, enabled = change.persisted.enabled, "bypass toggled");
        if change.reload_required {
            self.host.reload();
        }
        Some(change)
    }

    /// Persist bypass for `scope` path prefixes, or everywhere when `None`
    pub fn enable_bypass(&self, scope: Option<Vec<String>>) -> BypassChange {
        self.bypass.enable(scope)
    }

    /// Persist bypass off
    pub fn disable_bypass(&self) -> BypassChange {
        self.bypass.disable()
    }

    /// Mount (or return the already mounted) guard `id`
    ///
    /// # Errors
    /// - `EngineError::Recovery` outside an async runtime
    pub fn mount_guard(&self, id: &str) -> Result<RecoveryGuard, EngineError> {
        if let Some(existing) = self.guards.get(id) {
            return Ok(existing.clone());
        }
        let guard = RecoveryGuard::mount(
            id,
            self.config.recovery_config(),
            self.store.clone(),
            self.bypass.clone(),
            self.host.clone(),
        )?;
        guard.listen(&self.errors);
        let guard = self.guards.entry(id.to_string()).or_insert(guard).clone();
        tracing::debug!(guard = id, "guard mounted");
        Ok(guard)
    }

    /// Unmount guard `id`; its persisted incident is kept
    ///
    /// # Errors
    /// - `EngineError::UnknownGuard` when nothing is mounted under `id`
    pub fn unmount_guard(&self, id: &str) -> Result<(), EngineError> {
        let (_, guard) = self
            .guards
            .remove(id)
            .ok_or_else(|| EngineError::UnknownGuard(id.to_string()))?;
        guard.unmount();
        Ok(())
    }

    /// Mounted guard `id`
    #[must_use]
    pub fn guard(&self, id: &str) -> Option<RecoveryGuard> {
        self.guards.get(id).map(|g| g.clone())
    }

    /// Ids of mounted guards, sorted
    #[must_use]
    pub fn guard_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.guards.iter().map(|g| g.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Publish an error raised outside any render path
    ///
    /// Returns the number of guards it reached.
    pub fn report_error(&self, error: ErrorReport) -> usize {
        self.errors.publish(error)
    }

    /// Diagnostics snapshot for the current page view
    #[must_use]
    pub fn report(&self) -> DiagnosticsReport {
        self.store.report(self.bypass.is_active())
    }

    /// Wipe Warden's diagnostic keys; the bypass flag survives
    pub fn clear_diagnostics(&self) -> usize {
        self.store.clear_diagnostics()
    }

    /// Unmount every guard and remove the interception layer
    pub fn reset(&self) {
        let ids = self.guard_ids();
        for id in ids {
            if let Some((_, guard)) = self.guards.remove(&id) {
                guard.unmount();
            }
        }
        self.layer.reset();
        tracing::info!("engine reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_store::MemoryStorage;

    fn engine(url: &str) -> Engine {
        Engine::init(
            WardenConfig::default(),
            Arc::new(MemoryStorage::new()),
            url,
            Arc::new(OfflineNetwork),
        )
        .unwrap()
    }

    #[test]
    fn init_rejects_invalid_config() {
        let mut config = WardenConfig::default();
        config.storage.prefix = String::new();
        let err = Engine::init(
            config,
            Arc::new(MemoryStorage::new()),
            "/",
            Arc::new(OfflineNetwork),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn other_chords_are_ignored() {
        let engine = engine("/gallery");
        assert!(engine.handle_key(KeyChord::key('b')).is_none());
        assert!(!engine.store().bypass_flag().enabled);
    }

    #[test]
    fn mounting_needs_a_runtime() {
        let engine = engine("/gallery");
        let err = engine.mount_guard("root").unwrap_err();
        assert!(matches!(err, EngineError::Recovery(_)));
    }

    #[test]
    fn unknown_guard() {
        let engine = engine("/gallery");
        assert!(matches!(
            engine.unmount_guard("nope"),
            Err(EngineError::UnknownGuard(id)) if id == "nope"
        ));
    }
}
