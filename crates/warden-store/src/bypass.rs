//! Bypass controller
//!
//! Resolves whether blocking is skipped for a path, in priority order:
//!
//! 1. query-parameter override on the current location (this page view only)
//! 2. persisted [`BypassFlag`] as read at page load, scoped by path prefix
//! 3. not bypassed
//!
//! Some capture points are wired at load time, so changes to the persisted
//! flag are written immediately but only take effect on the next full load.

use crate::records::BypassFlag;
use crate::store::DiagnosticStore;
use parking_lot::RwLock;
use std::sync::Arc;

/// Default reserved query parameter forcing bypass for one page view
pub const DEFAULT_BYPASS_QUERY_PARAM: &str = "warden-bypass";

/// Current navigation target: path plus decoded query pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path component, always starting with `/`
    pub path: String,
    /// Query pairs in order of appearance
    pub query: Vec<(String, String)>,
}

impl Location {
    /// Parse an absolute URL or a path with optional query and fragment
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let without_fragment = url.split('#').next().unwrap_or_default();
        let without_origin = match without_fragment.find("://") {
            Some(idx) => {
                let rest = &without_fragment[idx + 3..];
                rest.find(|c: char| c == '/' || c == '?').map_or("", |slash| &rest[slash..])
            }
            None => without_fragment,
        };
        let (path, query) = without_origin
            .split_once('?')
            .unwrap_or((without_origin, ""));

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(k), decode_component(v))
            })
            .collect();

        Self { path, query }
    }

    /// Root location with no query
    #[must_use]
    pub fn root() -> Self {
        Self::parse("/")
    }

    /// First value of a query parameter
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Form-urlencoded decoding; malformed escapes are kept as written
fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_at(bytes, i + 1), hex_at(bytes, i + 2)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_at(bytes: &[u8], idx: usize) -> Option<u8> {
    let byte = *bytes.get(idx)?;
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            if v.is_empty() {
                write!(f, "{sep}{k}")?;
            } else {
                write!(f, "{sep}{k}={v}")?;
            }
        }
        Ok(())
    }
}

/// Result of a persisted bypass change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassChange {
    /// Flag now persisted
    pub persisted: BypassFlag,
    /// Whether the page must reload for the change to apply
    pub reload_required: bool,
}

/// Decides whether blocking is skipped for a navigation path
#[derive(Debug)]
pub struct BypassController {
    store: Arc<DiagnosticStore>,
    query_param: String,
    effective: BypassFlag,
    location: RwLock<Location>,
}

impl BypassController {
    /// Snapshot the persisted flag for a page load at `location`
    #[must_use]
    pub fn load(store: Arc<DiagnosticStore>, location: Location) -> Self {
        let effective = store.bypass_flag();
        if effective.enabled {
            tracing::info!(
                scope = ?effective.scope_path_prefixes,
                "bypass mode persisted; blocking disabled for scoped paths"
            );
        }
        Self {
            store,
            query_param: DEFAULT_BYPASS_QUERY_PARAM.to_string(),
            effective,
            location: RwLock::new(location),
        }
    }

    /// With a custom override query parameter
    #[inline]
    #[must_use]
    pub fn with_query_param(mut self, name: impl Into<String>) -> Self {
        self.query_param = name.into();
        self
    }

    /// Current location
    #[must_use]
    pub fn location(&self) -> Location {
        self.location.read().clone()
    }

    /// Current path
    #[must_use]
    pub fn current_path(&self) -> String {
        self.location.read().path.clone()
    }

    /// In-page navigation; a previous query override no longer applies
    pub fn navigate(&self, location: Location) {
        tracing::debug!(to = %location, "navigation");
        *self.location.write() = location;
    }

    /// Query override on the current location, if present and recognizable
    #[must_use]
    pub fn query_override(&self) -> Option<bool> {
        let location = self.location.read();
        let value = location.query_value(&self.query_param)?;
        match value.to_ascii_lowercase().as_str() {
            "" | "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Whether blocking is skipped for `path`
    #[must_use]
    pub fn is_bypassed(&self, path: &str) -> bool {
        if let Some(forced) = self.query_override() {
            return forced;
        }
        self.effective.covers(path)
    }

    /// Whether blocking is skipped for the current path
    #[must_use]
    pub fn is_active(&self) -> bool {
        let path = self.current_path();
        self.is_bypassed(&path)
    }

    /// Flag in effect for this page load
    #[inline]
    #[must_use]
    pub fn effective_flag(&self) -> &BypassFlag {
        &self.effective
    }

    /// Flag currently persisted (may differ from the effective one)
    #[must_use]
    pub fn persisted_flag(&self) -> BypassFlag {
        self.store.bypass_flag()
    }

    fn persist(&self, flag: BypassFlag) -> BypassChange {
        self.store.save_bypass_flag(&flag);
        let reload_required = flag != self.effective;
        tracing::info!(
            enabled = flag.enabled,
            scope = ?flag.scope_path_prefixes,
            reload_required,
            "bypass flag persisted"
        );
        BypassChange {
            persisted: flag,
            reload_required,
        }
    }

    /// Enable bypass for `scope` path prefixes, or every path when `None`
    pub fn enable(&self, scope: Option<Vec<String>>) -> BypassChange {
        self.persist(BypassFlag {
            enabled: true,
            scope_path_prefixes: scope.unwrap_or_default().into_iter().collect(),
        })
    }

    /// Disable bypass
    pub fn disable(&self) -> BypassChange {
        self.persist(BypassFlag::default())
    }

    /// Flip the persisted flag (everywhere when turning on)
    pub fn toggle(&self) -> BypassChange {
        if self.persisted_flag().enabled {
            self.disable()
        } else {
            self.enable(None)
        }
    }

    /// Add `path` to the bypass scope after repeated interference failures
    pub fn escalate(&self, path: &str) -> BypassChange {
        let mut flag = self.persisted_flag();
        if flag.covers(path) {
            return BypassChange {
                reload_required: flag != self.effective,
                persisted: flag,
            };
        }
        if !flag.enabled {
            flag.scope_path_prefixes.clear();
        }
        flag.enabled = true;
        flag.scope_path_prefixes.insert(path.to_string());
        tracing::warn!(path, "escalating route to bypass mode after repeated interference");
        self.persist(flag)
    }
}
