//! Stub module served in place of blocked scripts
//!
//! The stub exposes the same export surface the application imports from the
//! blocked bundle (a default export plus the named hooks), each a harmless
//! no-op or plausible default, so importers never fail on a missing export.

use crate::fetch::Response;

/// Local path the stub is served from
pub const STUB_MODULE_PATH: &str = "/__warden/stub/user-extension.js";

/// Content type of the synthetic response
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript";

/// Value a stub export evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubValue {
    /// Function returning `undefined`
    Noop,
    /// Function returning `null`
    Null,
    /// Function returning `{}`
    EmptyObject,
    /// Function returning `[]`
    EmptyArray,
    /// State-hook shape: `[null, noop]`
    StatePair,
    /// Component rendering its children unchanged
    Passthrough,
}

impl StubValue {
    fn body(self) -> &'static str {
        match self {
            Self::Noop => "return undefined;",
            Self::Null => "return null;",
            Self::EmptyObject => "return {};",
            Self::EmptyArray => "return [];",
            Self::StatePair => "return [null, noop];",
            Self::Passthrough => "return props && props.children !== undefined ? props.children : null;",
        }
    }

    fn params(self) -> &'static str {
        match self {
            Self::Passthrough => "props",
            _ => "",
        }
    }
}

/// One named export of the stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubExport {
    /// Export name
    pub name: String,
    /// Behavior
    pub value: StubValue,
}

impl StubExport {
    /// Create export
    #[must_use]
    pub fn new(name: impl Into<String>, value: StubValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Named exports the application imports from the extension bundle
fn default_exports() -> Vec<StubExport> {
    vec![
        StubExport::new("useUserExtension", StubValue::Null),
        StubExport::new("useExtension", StubValue::Null),
        StubExport::new("useExtensionState", StubValue::StatePair),
        StubExport::new("useExtensionSettings", StubValue::EmptyObject),
        StubExport::new("useExtensionEvents", StubValue::EmptyArray),
        StubExport::new("registerExtension", StubValue::Noop),
        StubExport::new("ExtensionProvider", StubValue::Passthrough),
    ]
}

/// Syntactically valid stand-in module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubModule {
    path: String,
    exports: Vec<StubExport>,
    source: String,
}

impl StubModule {
    /// Build stub served at `path` with the given named exports
    #[must_use]
    pub fn new(path: impl Into<String>, exports: Vec<StubExport>) -> Self {
        let source = render_source(&exports);
        Self {
            path: path.into(),
            exports,
            source,
        }
    }

    /// Local path of the stub
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Module source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Named exports, in declaration order
    #[must_use]
    pub fn export_names(&self) -> Vec<&str> {
        self.exports.iter().map(|e| e.name.as_str()).collect()
    }

    /// Whether `url` points at the locally served stub
    #[must_use]
    pub fn serves(&self, url: &str) -> bool {
        let without_query = url.split(['?', '#']).next().unwrap_or_default();
        without_query.ends_with(&self.path)
    }

    /// Synthetic successful response carrying the stub source
    #[must_use]
    pub fn response(&self, url: &str) -> Response {
        Response {
            url: url.to_string(),
            status: 200,
            content_type: JAVASCRIPT_CONTENT_TYPE.to_string(),
            body: self.source.clone(),
            synthetic: true,
        }
    }
}

impl Default for StubModule {
    fn default() -> Self {
        Self::new(STUB_MODULE_PATH, default_exports())
    }
}

fn render_source(exports: &[StubExport]) -> String {
    let mut out = String::from("// Inert stand-in for a blocked script.\nconst noop = () => {};\n\n");
    for export in exports {
        out.push_str(&format!(
            "export function {}({}) {{\n  {}\n}}\n\n",
            export.name,
            export.value.params(),
            export.value.body()
        ));
    }
    out.push_str("export default function stub() {\n  return null;\n}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_declares_default_and_named_exports() {
        let stub = StubModule::default();
        let source = stub.source();
        assert!(source.contains("export default function stub() {"));
        for name in stub.export_names() {
            assert!(source.contains(&format!("export function {name}(")), "{name}");
        }
        assert_eq!(source.matches("export default").count(), 1);
    }

    #[test]
    fn response_is_synthetic_javascript() {
        let response = StubModule::default().response("/assets/useUserExtension-7c796cda.js");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, JAVASCRIPT_CONTENT_TYPE);
        assert!(response.synthetic);
    }

    #[test]
    fn serves_only_its_own_path() {
        let stub = StubModule::default();
        assert!(stub.serves("https://app.example.com/__warden/stub/user-extension.js?v=2"));
        assert!(!stub.serves("/assets/app.js"));
    }
}
