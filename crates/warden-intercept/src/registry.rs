//! Capability registry
//!
//! Holds the primitives the page uses (fetch, transport, element factory).
//! Capture points are installed by wrapping the current capability with a
//! decorator; the originals stay reachable for reset and for code that
//! captured them before the layer was installed.

use crate::dom::ElementFactory;
use crate::fetch::{Fetch, TransportFetch};
use parking_lot::RwLock;
use std::sync::Arc;

/// Registry of swappable page capabilities
#[derive(Debug)]
pub struct CapabilityRegistry {
    network: Arc<dyn Fetch>,
    transport: Arc<RwLock<Arc<dyn Fetch>>>,
    original_fetch: Arc<dyn Fetch>,
    fetch: RwLock<Arc<dyn Fetch>>,
    original_elements: Arc<dyn ElementFactory>,
    elements: RwLock<Arc<dyn ElementFactory>>,
}

impl CapabilityRegistry {
    /// Registry over a real network and element factory
    #[must_use]
    pub fn new(network: Arc<dyn Fetch>, elements: Arc<dyn ElementFactory>) -> Self {
        let transport = Arc::new(RwLock::new(network.clone()));
        let original_fetch: Arc<dyn Fetch> = Arc::new(TransportFetch::new(transport.clone()));
        Self {
            network,
            transport,
            fetch: RwLock::new(original_fetch.clone()),
            original_fetch,
            original_elements: elements.clone(),
            elements: RwLock::new(elements),
        }
    }

    /// Page-level fetch as currently installed
    #[must_use]
    pub fn fetch(&self) -> Arc<dyn Fetch> {
        self.fetch.read().clone()
    }

    /// Fetch as it was before any override
    ///
    /// Still routed through the current transport.
    #[must_use]
    pub fn original_fetch(&self) -> Arc<dyn Fetch> {
        self.original_fetch.clone()
    }

    /// Real network, below every capture point
    #[must_use]
    pub fn network(&self) -> Arc<dyn Fetch> {
        self.network.clone()
    }

    /// Current transport
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Fetch> {
        self.transport.read().clone()
    }

    /// Element factory as currently installed
    #[must_use]
    pub fn elements(&self) -> Arc<dyn ElementFactory> {
        self.elements.read().clone()
    }

    /// Replace page fetch with `wrap(current)`
    pub fn wrap_fetch<F>(&self, wrap: F)
    where
        F: FnOnce(Arc<dyn Fetch>) -> Arc<dyn Fetch>,
    {
        let mut slot = self.fetch.write();
        *slot = wrap(slot.clone());
    }

    /// Replace transport with `wrap(current)`
    pub fn wrap_transport<F>(&self, wrap: F)
    where
        F: FnOnce(Arc<dyn Fetch>) -> Arc<dyn Fetch>,
    {
        let mut slot = self.transport.write();
        *slot = wrap(slot.clone());
    }

    /// Replace element factory with `wrap(current)`
    pub fn wrap_elements<F>(&self, wrap: F)
    where
        F: FnOnce(Arc<dyn ElementFactory>) -> Arc<dyn ElementFactory>,
    {
        let mut slot = self.elements.write();
        *slot = wrap(slot.clone());
    }

    /// Restore every original capability
    pub fn reset(&self) {
        *self.fetch.write() = self.original_fetch.clone();
        *self.transport.write() = self.network.clone();
        *self.elements.write() = self.original_elements.clone();
    }
}
