//! Minimal document model the capture points operate on
//!
//! Host integrations adapt their real element and document types to these
//! traits; the bundled [`Element`] and [`Document`] are in-memory versions.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// An element whose attributes can be read and written
pub trait ElementHandle: Send + Sync + Debug {
    /// Lowercase tag name
    fn tag_name(&self) -> &str;

    /// `setAttribute(name, value)`
    fn set_attribute(&self, name: &str, value: &str);

    /// `getAttribute(name)`
    fn get_attribute(&self, name: &str) -> Option<String>;

    /// `element.src = value`
    fn set_src(&self, value: &str) {
        self.set_attribute("src", value);
    }

    /// `element.src`
    fn src(&self) -> Option<String> {
        self.get_attribute("src")
    }

    /// Whether this is a script element
    fn is_script(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case("script")
    }
}

/// In-memory element
#[derive(Debug)]
pub struct Element {
    tag: String,
    attributes: RwLock<BTreeMap<String, String>>,
}

impl Element {
    /// Create element with `tag`
    #[must_use]
    pub fn new(tag: &str) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.to_ascii_lowercase(),
            attributes: RwLock::new(BTreeMap::new()),
        })
    }

    /// Script element with `src` already set, as injected markup would be
    #[must_use]
    pub fn script(src: &str) -> Arc<Self> {
        let element = Self::new("script");
        element.set_attribute("src", src);
        element
    }
}

impl ElementHandle for Element {
    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .write()
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(&name.to_ascii_lowercase()).cloned()
    }
}

/// Element creation capability (`document.createElement`)
pub trait ElementFactory: Send + Sync + Debug {
    /// Create an element with `tag`
    fn create_element(&self, tag: &str) -> Arc<dyn ElementHandle>;
}

/// Factory producing plain [`Element`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeElementFactory;

impl ElementFactory for NativeElementFactory {
    fn create_element(&self, tag: &str) -> Arc<dyn ElementHandle> {
        Element::new(tag)
    }
}

/// Batch of nodes added to the document
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Newly attached nodes
    pub added_nodes: Vec<Arc<dyn ElementHandle>>,
}

/// Receives document mutations
pub trait MutationObserver: Send + Sync + Debug {
    /// Called after nodes are attached
    fn on_mutation(&self, record: &MutationRecord);
}

/// In-memory document tree (flat)
///
/// Observers run synchronously inside [`Document::append_child`], before the
/// caller regains control, so a rewritten `src` is in place before any load.
#[derive(Debug, Default)]
pub struct Document {
    children: Mutex<Vec<Arc<dyn ElementHandle>>>,
    observers: RwLock<Vec<Arc<dyn MutationObserver>>>,
}

impl Document {
    /// Empty document
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a node and notify observers
    pub fn append_child(&self, node: Arc<dyn ElementHandle>) {
        self.children.lock().push(node.clone());
        let record = MutationRecord {
            added_nodes: vec![node],
        };
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_mutation(&record);
        }
    }

    /// Register an observer for child additions
    pub fn observe(&self, observer: Arc<dyn MutationObserver>) {
        self.observers.write().push(observer);
    }

    /// Remove every observer
    pub fn disconnect_all(&self) {
        self.observers.write().clear();
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Attached nodes
    #[must_use]
    pub fn children(&self) -> Vec<Arc<dyn ElementHandle>> {
        self.children.lock().clone()
    }
}
