use pretty_assertions::assert_eq;
use std::sync::Arc;
use warden_classifier::PatternSet;
use warden_intercept::{
    CapabilityRegistry, CapturePoint, Document, Element, ElementFactory, ElementHandle, Fetch,
    FetchInput, InterceptionContext, InterceptionLayer, NativeElementFactory, Request,
    JAVASCRIPT_CONTENT_TYPE, STUB_MODULE_PATH,
};
use warden_store::{BypassFlag, DiagnosticStore, InterceptionPoint};
use warden_test_utils::{bypass_at, memory_store, FakeNetwork};

const EXTENSION_BUNDLE: &str = "https://cdn.example.com/assets/useUserExtension-7c796cda.js";

struct Page {
    layer: InterceptionLayer,
    network: Arc<FakeNetwork>,
    document: Arc<Document>,
    store: Arc<DiagnosticStore>,
}

fn page_with_store(store: Arc<DiagnosticStore>, url: &str) -> Page {
    let network = FakeNetwork::new();
    let context = Arc::new(InterceptionContext::new(
        PatternSet::default(),
        store.clone(),
        bypass_at(&store, url),
    ));
    let registry = Arc::new(CapabilityRegistry::new(
        network.clone(),
        Arc::new(NativeElementFactory),
    ));
    let document = Document::new();
    let layer = InterceptionLayer::new(context, registry).with_document(document.clone());
    Page {
        layer,
        network,
        document,
        store,
    }
}

fn page(url: &str) -> Page {
    page_with_store(memory_store(), url)
}

#[tokio::test]
async fn blocked_bundle_resolves_to_stub_without_network() {
    let page = page("/gallery");
    assert!(page.layer.install().is_complete());

    let response = page
        .layer
        .registry()
        .fetch()
        .fetch(FetchInput::from(Request::get(EXTENSION_BUNDLE)))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, JAVASCRIPT_CONTENT_TYPE);
    assert!(response.body.contains("export default function stub() {"));
    assert!(response.body.contains("export function useUserExtension("));
    assert_eq!(page.network.calls(), 0);

    let events = page.store.blocked_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].interception_point, InterceptionPoint::Fetch);
}

#[tokio::test]
async fn double_install_is_a_no_op() {
    let page = page("/gallery");
    let first = page.layer.install();
    let second = page.layer.install();
    assert_eq!(first.installed, CapturePoint::ALL.to_vec());
    assert!(second.installed.is_empty());
    assert_eq!(second.already_installed, CapturePoint::ALL.to_vec());
    assert_eq!(page.document.observer_count(), 1);

    let script = page.layer.registry().elements().create_element("script");
    script.set_src(EXTENSION_BUNDLE);
    assert_eq!(script.src().as_deref(), Some(STUB_MODULE_PATH));
    page.document.append_child(script);

    let response = page.layer.registry().fetch().fetch(EXTENSION_BUNDLE.into()).await.unwrap();
    assert!(response.synthetic);

    // one event per substitution, none recorded twice
    let points: Vec<_> = page
        .store
        .blocked_events()
        .into_iter()
        .map(|e| e.interception_point)
        .collect();
    assert_eq!(points, vec![InterceptionPoint::PropertySet, InterceptionPoint::Fetch]);
}

#[tokio::test]
async fn allowed_traffic_reaches_network() {
    let page = page("/gallery");
    page.layer.install();
    let response = page
        .layer
        .registry()
        .fetch()
        .fetch("https://api.example.com/galleries".into())
        .await
        .unwrap();
    assert!(!response.synthetic);
    assert_eq!(page.network.requested(), vec!["https://api.example.com/galleries".to_string()]);
    assert!(page.store.blocked_events().is_empty());
}

#[tokio::test]
async fn proxy_catches_requests_from_pre_override_fetch() {
    let page = page("/gallery");
    // captured by third-party code before the layer was installed
    let early_fetch = page.layer.registry().original_fetch();
    page.layer.install();

    let response = early_fetch.fetch("moz-extension://abc/content.js".into()).await.unwrap();
    assert!(response.synthetic);
    assert_eq!(page.network.calls(), 0);

    let proxy = page.layer.proxy().unwrap();
    assert_eq!(
        proxy.blocked_scripts().await.unwrap(),
        vec!["moz-extension://abc/content.js".to_string()]
    );
    let events = page.store.blocked_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].interception_point, InterceptionPoint::BackgroundProxy);
}

#[tokio::test]
async fn bypass_query_lets_everything_through() {
    let page = page("/gallery?warden-bypass=1");
    page.layer.install();

    let response = page.layer.registry().fetch().fetch(EXTENSION_BUNDLE.into()).await.unwrap();
    assert!(!response.synthetic);
    assert_eq!(page.network.calls(), 1);

    let injected = Element::script("chrome-extension://abc/inject.js");
    page.document.append_child(injected.clone());
    assert_eq!(injected.src().as_deref(), Some("chrome-extension://abc/inject.js"));
    assert!(page.store.blocked_events().is_empty());
}

#[tokio::test]
async fn bypass_is_evaluated_per_request_after_navigation() {
    let store = memory_store();
    store.save_bypass_flag(&BypassFlag {
        enabled: true,
        scope_path_prefixes: ["/admin".to_string()].into_iter().collect(),
    });
    let page = page_with_store(store, "/admin/users");
    page.layer.install();

    let fetch = page.layer.registry().fetch();
    assert!(!fetch.fetch(EXTENSION_BUNDLE.into()).await.unwrap().synthetic);

    page.layer
        .context()
        .bypass()
        .navigate(warden_store::Location::parse("/gallery"));
    page.layer.sync_proxy().unwrap();
    assert!(fetch.fetch(EXTENSION_BUNDLE.into()).await.unwrap().synthetic);
}

#[test]
fn install_failures_are_isolated() {
    // no runtime for the proxy, no document for the mutation watch
    let store = memory_store();
    let network = FakeNetwork::new();
    let context = Arc::new(InterceptionContext::new(
        PatternSet::default(),
        store.clone(),
        bypass_at(&store, "/"),
    ));
    let registry = Arc::new(CapabilityRegistry::new(network, Arc::new(NativeElementFactory)));
    let layer = InterceptionLayer::new(context.clone(), registry);

    let report = layer.install();
    assert_eq!(report.installed, vec![CapturePoint::Elements, CapturePoint::Fetch]);
    let failed: Vec<_> = report.failed.iter().map(|(p, _)| *p).collect();
    assert_eq!(failed, vec![CapturePoint::BackgroundProxy, CapturePoint::MutationWatch]);
    assert!(!context.is_installed(CapturePoint::BackgroundProxy));

    let script = layer.registry().elements().create_element("script");
    script.set_attribute("src", EXTENSION_BUNDLE);
    assert_eq!(script.src().as_deref(), Some(STUB_MODULE_PATH));
}

#[tokio::test]
async fn reset_restores_original_capabilities() {
    let page = page("/gallery");
    page.layer.install();
    page.layer.reset();

    assert!(page.layer.context().installed().is_empty());
    assert_eq!(page.document.observer_count(), 0);
    let response = page.layer.registry().fetch().fetch(EXTENSION_BUNDLE.into()).await.unwrap();
    assert!(!response.synthetic);

    let again = page.layer.install();
    assert_eq!(again.installed.len(), 4);
}

#[tokio::test]
async fn reconfigured_patterns_reach_every_capture_point() {
    let page = page("/gallery");
    page.layer.install();
    page.layer
        .context()
        .configure(PatternSet::new(["tracker-widget"]));
    page.layer.sync_proxy().unwrap();

    let early = page.layer.registry().original_fetch();
    let response = early.fetch("/vendor/Tracker-Widget.js".into()).await.unwrap();
    assert!(response.synthetic);
    let response = early.fetch(EXTENSION_BUNDLE.into()).await.unwrap();
    assert!(!response.synthetic);
}
