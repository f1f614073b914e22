//! Capture point 1: script element `src` interception

use crate::context::InterceptionContext;
use crate::dom::{ElementFactory, ElementHandle};
use std::sync::Arc;
use warden_store::InterceptionPoint;

/// Element factory decorator wrapping every script element it creates
#[derive(Debug)]
pub struct GuardedElementFactory {
    inner: Arc<dyn ElementFactory>,
    context: Arc<InterceptionContext>,
}

impl GuardedElementFactory {
    /// Wrap the real factory
    #[must_use]
    pub fn new(inner: Arc<dyn ElementFactory>, context: Arc<InterceptionContext>) -> Self {
        Self { inner, context }
    }
}

impl ElementFactory for GuardedElementFactory {
    fn create_element(&self, tag: &str) -> Arc<dyn ElementHandle> {
        let element = self.inner.create_element(tag);
        if element.is_script() {
            Arc::new(GuardedScript {
                inner: element,
                context: self.context.clone(),
            })
        } else {
            element
        }
    }
}

/// Script element whose `src` writes are checked before they land
#[derive(Debug)]
pub struct GuardedScript {
    inner: Arc<dyn ElementHandle>,
    context: Arc<InterceptionContext>,
}

impl GuardedScript {
    fn write_src(&self, value: &str, point: InterceptionPoint) {
        let target = self
            .context
            .evaluate(value, point)
            .map_or_else(|| value.to_string(), |sub| sub.stub_url);
        self.inner.set_attribute("src", &target);
    }
}

impl ElementHandle for GuardedScript {
    fn tag_name(&self) -> &str {
        self.inner.tag_name()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("src") {
            self.write_src(value, InterceptionPoint::AttributeSet);
        } else {
            self.inner.set_attribute(name, value);
        }
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.inner.get_attribute(name)
    }

    fn set_src(&self, value: &str) {
        self.write_src(value, InterceptionPoint::PropertySet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NativeElementFactory;
    use crate::stub::STUB_MODULE_PATH;
    use warden_classifier::PatternSet;
    use warden_store::{BypassController, DiagnosticStore, Location, MemoryStorage};

    fn factory() -> (GuardedElementFactory, Arc<InterceptionContext>) {
        let store = Arc::new(DiagnosticStore::new(Arc::new(MemoryStorage::new())));
        let bypass = Arc::new(BypassController::load(store.clone(), Location::root()));
        let ctx = Arc::new(InterceptionContext::new(PatternSet::default(), store, bypass));
        (
            GuardedElementFactory::new(Arc::new(NativeElementFactory), ctx.clone()),
            ctx,
        )
    }

    #[test]
    fn attribute_write_is_rewritten() {
        let (factory, ctx) = factory();
        let script = factory.create_element("script");
        script.set_attribute("src", "/assets/useUserExtension-7c796cda.js");
        assert_eq!(script.src().as_deref(), Some(STUB_MODULE_PATH));
        assert_eq!(
            ctx.store().blocked_events()[0].interception_point,
            InterceptionPoint::AttributeSet
        );
    }

    #[test]
    fn property_write_is_rewritten() {
        let (factory, ctx) = factory();
        let script = factory.create_element("script");
        script.set_src("moz-extension://abc/content.js");
        assert_eq!(script.src().as_deref(), Some(STUB_MODULE_PATH));
        assert_eq!(
            ctx.store().blocked_events()[0].interception_point,
            InterceptionPoint::PropertySet
        );
    }

    #[test]
    fn other_elements_and_attributes_untouched() {
        let (factory, ctx) = factory();
        let img = factory.create_element("img");
        img.set_attribute("src", "chrome-extension://abc/icon.png");
        assert_eq!(img.src().as_deref(), Some("chrome-extension://abc/icon.png"));

        let script = factory.create_element("script");
        script.set_attribute("type", "module");
        script.set_src("/assets/app.js");
        assert_eq!(script.get_attribute("type").as_deref(), Some("module"));
        assert_eq!(script.src().as_deref(), Some("/assets/app.js"));
        assert!(ctx.store().blocked_events().is_empty());
    }
}
