//! Shared interception context
//!
//! Every capture point funnels a candidate URL through
//! [`InterceptionContext::evaluate`]: bypass check, classification, record,
//! substitution. Bypass is consulted per request so a query override or
//! navigation takes effect without reinstalling anything.

use crate::protocol::ProxyCommand;
use crate::stub::StubModule;
use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use warden_classifier::{PatternSet, UrlVerdict};
use warden_store::{BlockedEvent, BypassController, DiagnosticStore, InterceptionPoint};

/// Default number of memoized URL verdicts
pub const DEFAULT_VERDICT_CACHE_CAPACITY: u64 = 1_024;

/// Installable capture point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapturePoint {
    /// Script element attribute and property interception
    Elements,
    /// Page-level fetch override
    Fetch,
    /// Background request proxy
    BackgroundProxy,
    /// Document mutation watcher
    MutationWatch,
}

impl CapturePoint {
    /// All capture points in install order
    pub const ALL: [Self; 4] = [
        Self::Elements,
        Self::Fetch,
        Self::BackgroundProxy,
        Self::MutationWatch,
    ];

    /// Stable name used in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elements => "elements",
            Self::Fetch => "fetch",
            Self::BackgroundProxy => "background_proxy",
            Self::MutationWatch => "mutation_watch",
        }
    }
}

impl std::fmt::Display for CapturePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision to replace a blocked URL with the stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Original URL
    pub url: String,
    /// Pattern that matched
    pub pattern: String,
    /// URL to load instead
    pub stub_url: String,
}

/// State shared by every capture point
#[derive(Debug)]
pub struct InterceptionContext {
    patterns: RwLock<Arc<PatternSet>>,
    verdicts: Cache<String, UrlVerdict>,
    store: Arc<DiagnosticStore>,
    bypass: Arc<BypassController>,
    stub: StubModule,
    installed: Mutex<BTreeSet<CapturePoint>>,
}

impl InterceptionContext {
    /// Create context with the given patterns
    #[must_use]
    pub fn new(
        patterns: PatternSet,
        store: Arc<DiagnosticStore>,
        bypass: Arc<BypassController>,
    ) -> Self {
        Self {
            patterns: RwLock::new(Arc::new(patterns)),
            verdicts: Cache::new(DEFAULT_VERDICT_CACHE_CAPACITY),
            store,
            bypass,
            stub: StubModule::default(),
            installed: Mutex::new(BTreeSet::new()),
        }
    }

    /// With a custom stub module
    #[must_use]
    pub fn with_stub(mut self, stub: StubModule) -> Self {
        self.stub = stub;
        self
    }

    /// With a custom verdict cache size
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.verdicts = Cache::new(capacity);
        self
    }

    /// Stub served for blocked URLs
    #[inline]
    #[must_use]
    pub fn stub(&self) -> &StubModule {
        &self.stub
    }

    /// Diagnostic store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<DiagnosticStore> {
        &self.store
    }

    /// Bypass controller
    #[inline]
    #[must_use]
    pub fn bypass(&self) -> &Arc<BypassController> {
        &self.bypass
    }

    /// Current pattern set
    #[must_use]
    pub fn patterns(&self) -> Arc<PatternSet> {
        self.patterns.read().clone()
    }

    /// Replace block patterns; memoized verdicts are dropped
    pub fn configure(&self, patterns: PatternSet) {
        tracing::info!(count = patterns.len(), "block patterns reconfigured");
        let mut current = self.patterns.write();
        *current = Arc::new(patterns);
        self.verdicts.invalidate_all();
    }

    /// Classify a URL, memoized per URL
    #[must_use]
    pub fn classify(&self, url: &str) -> UrlVerdict {
        if let Some(hit) = self.verdicts.get(url) {
            return hit;
        }
        // insert under the read guard so configure() cannot interleave
        let patterns = self.patterns.read();
        let verdict = patterns.classify_url(url);
        self.verdicts.insert(url.to_string(), verdict.clone());
        verdict
    }

    /// Decide whether `url` seen at `point` must be replaced by the stub
    ///
    /// Records a [`BlockedEvent`] for every substitution. Returns `None` when
    /// bypass is active for the current path or no pattern matches.
    pub fn evaluate(&self, url: &str, point: InterceptionPoint) -> Option<Substitution> {
        if self.stub.serves(url) || self.bypass.is_active() {
            return None;
        }
        let verdict = self.classify(url);
        let pattern = verdict.matched_pattern.filter(|_| verdict.blocked)?;
        tracing::info!(url, pattern = %pattern, %point, "blocked script substituted");
        self.store
            .record_blocked(BlockedEvent::now(url, pattern.clone(), point));
        Some(Substitution {
            url: url.to_string(),
            pattern,
            stub_url: self.stub.path().to_string(),
        })
    }

    /// Record a block decided outside this context (background proxy)
    pub fn record_external(&self, url: &str, point: InterceptionPoint) {
        let verdict = self.classify(url);
        let pattern = verdict
            .matched_pattern
            .unwrap_or_else(|| "<proxy>".to_string());
        tracing::info!(url, pattern = %pattern, %point, "blocked script reported");
        self.store.record_blocked(BlockedEvent::now(url, pattern, point));
    }

    /// Configuration message for the background proxy
    #[must_use]
    pub fn proxy_configuration(&self) -> ProxyCommand {
        ProxyCommand::ConfigureBlocker {
            blocked_scripts: self.patterns.read().patterns().to_vec(),
            bypass_enabled: self.bypass.is_active(),
        }
    }

    /// Mark `point` installed; `false` if it already was
    pub fn try_claim(&self, point: CapturePoint) -> bool {
        self.installed.lock().insert(point)
    }

    /// Undo a claim after a failed install
    pub fn release(&self, point: CapturePoint) {
        self.installed.lock().remove(&point);
    }

    /// Whether `point` is installed
    #[must_use]
    pub fn is_installed(&self, point: CapturePoint) -> bool {
        self.installed.lock().contains(&point)
    }

    /// Installed capture points
    #[must_use]
    pub fn installed(&self) -> Vec<CapturePoint> {
        self.installed.lock().iter().copied().collect()
    }

    /// Forget installs and memoized verdicts
    pub fn reset(&self) {
        self.installed.lock().clear();
        self.verdicts.invalidate_all();
    }
}
