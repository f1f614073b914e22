//! Interception layer installation
//!
//! Each capture point installs in isolation: a failure is logged, reported
//! in the [`InstallReport`] and leaves the other points active. Installing
//! twice is a no-op for points already in place.

use crate::context::{CapturePoint, InterceptionContext};
use crate::dom::Document;
use crate::elements::GuardedElementFactory;
use crate::error::{InstallError, ProxyError};
use crate::fetch::{Fetch, GuardedFetch};
use crate::mutation::MutationWatch;
use crate::proxy::ProxyClient;
use crate::registry::CapabilityRegistry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of [`InterceptionLayer::install`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Points installed by this call
    pub installed: Vec<CapturePoint>,
    /// Points that were already in place
    pub already_installed: Vec<CapturePoint>,
    /// Points that failed, with the reason
    pub failed: Vec<(CapturePoint, String)>,
}

impl InstallReport {
    /// Whether no point failed
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs capture points into a [`CapabilityRegistry`]
#[derive(Debug)]
pub struct InterceptionLayer {
    context: Arc<InterceptionContext>,
    registry: Arc<CapabilityRegistry>,
    document: Option<Arc<Document>>,
    proxy: Mutex<Option<ProxyClient>>,
}

impl InterceptionLayer {
    /// Create layer
    #[must_use]
    pub fn new(context: Arc<InterceptionContext>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            context,
            registry,
            document: None,
            proxy: Mutex::new(None),
        }
    }

    /// With a document for the mutation watch
    #[must_use]
    pub fn with_document(mut self, document: Arc<Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Shared context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<InterceptionContext> {
        &self.context
    }

    /// Capability registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Install every capture point not yet installed
    pub fn install(&self) -> InstallReport {
        let mut report = InstallReport::default();
        for point in CapturePoint::ALL {
            if !self.context.try_claim(point) {
                report.already_installed.push(point);
                continue;
            }
            match self.install_point(point) {
                Ok(()) => {
                    tracing::debug!(%point, "capture point installed");
                    report.installed.push(point);
                }
                Err(e) => {
                    self.context.release(point);
                    tracing::warn!(%point, error = %e, "capture point failed to install");
                    report.failed.push((point, e.to_string()));
                }
            }
        }
        tracing::info!(
            installed = report.installed.len(),
            already = report.already_installed.len(),
            failed = report.failed.len(),
            "interception layer installed"
        );
        report
    }

    fn install_point(&self, point: CapturePoint) -> Result<(), InstallError> {
        let context = self.context.clone();
        match point {
            CapturePoint::Elements => {
                self.registry
                    .wrap_elements(|inner| Arc::new(GuardedElementFactory::new(inner, context)));
            }
            CapturePoint::Fetch => {
                self.registry
                    .wrap_fetch(|inner| Arc::new(GuardedFetch::new(inner, context)));
            }
            CapturePoint::BackgroundProxy => {
                let client = ProxyClient::spawn(self.registry.transport(), context.clone())?;
                client
                    .send(context.proxy_configuration())
                    .map_err(|e| InstallError::Proxy(e.to_string()))?;
                let fetcher: Arc<dyn Fetch> = client.fetcher();
                self.registry.wrap_transport(|_| fetcher);
                *self.proxy.lock() = Some(client);
            }
            CapturePoint::MutationWatch => {
                let document = self
                    .document
                    .as_ref()
                    .ok_or(InstallError::DocumentUnavailable)?;
                document.observe(Arc::new(MutationWatch::new(context)));
            }
        }
        Ok(())
    }

    /// Background proxy client, when installed
    #[must_use]
    pub fn proxy(&self) -> Option<ProxyClient> {
        self.proxy.lock().clone()
    }

    /// Push current patterns and bypass state to the background proxy
    ///
    /// # Errors
    /// - `ProxyError::Disconnected` if the worker has stopped
    pub fn sync_proxy(&self) -> Result<(), ProxyError> {
        match self.proxy() {
            Some(proxy) => proxy.send(self.context.proxy_configuration()),
            None => Ok(()),
        }
    }

    /// Remove every capture point and restore the original capabilities
    pub fn reset(&self) {
        if let Some(proxy) = self.proxy.lock().take() {
            proxy.shutdown();
        }
        if let Some(document) = &self.document {
            document.disconnect_all();
        }
        self.registry.reset();
        self.context.reset();
        tracing::info!("interception layer reset");
    }
}
