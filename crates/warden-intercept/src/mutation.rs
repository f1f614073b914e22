//! Capture point 4: document mutation watch

use crate::context::InterceptionContext;
use crate::dom::{MutationObserver, MutationRecord};
use std::sync::Arc;
use warden_store::InterceptionPoint;

/// Rewrites blocked script sources on nodes inserted outside the guarded factory
#[derive(Debug)]
pub struct MutationWatch {
    context: Arc<InterceptionContext>,
}

impl MutationWatch {
    /// Create watcher
    #[must_use]
    pub fn new(context: Arc<InterceptionContext>) -> Self {
        Self { context }
    }
}

impl MutationObserver for MutationWatch {
    fn on_mutation(&self, record: &MutationRecord) {
        for node in record.added_nodes.iter().filter(|n| n.is_script()) {
            let Some(src) = node.src() else { continue };
            if let Some(sub) = self.context.evaluate(&src, InterceptionPoint::MutationWatch) {
                node.set_attribute("src", &sub.stub_url);
            }
        }
    }
}
