//! Block patterns and URL classification
//!
//! A [`PatternSet`] is the ordered list of case-insensitive substrings a
//! candidate URL is tested against. Overlapping patterns are allowed: the
//! boolean verdict does not depend on order, only the reported pattern does.

use serde::{Deserialize, Serialize};

/// Patterns blocked out of the box.
///
/// The specific bundle name is listed before the generic hook name so
/// diagnostics report the most precise match.
pub const DEFAULT_BLOCK_PATTERNS: &[&str] = &[
    "useuserextension-7c796cda.js",
    "useuserextension",
    "chrome-extension://",
    "moz-extension://",
    "safari-web-extension://",
];

/// Result of testing a URL against a [`PatternSet`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlVerdict {
    /// Whether any pattern matched
    pub blocked: bool,
    /// First matching pattern in list order
    pub matched_pattern: Option<String>,
}

impl UrlVerdict {
    /// Verdict for a URL no pattern covers
    #[inline]
    #[must_use]
    pub fn allowed() -> Self {
        Self::default()
    }

    fn blocked_by(pattern: &str) -> Self {
        Self {
            blocked: true,
            matched_pattern: Some(pattern.to_string()),
        }
    }
}

/// Immutable ordered list of block patterns
///
/// Patterns are normalized to lower case on construction. Empty and
/// whitespace-only entries are dropped since they would match every URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    /// Build a pattern set from any list of patterns
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Pattern set that blocks nothing
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Test a URL against every pattern; the first match wins
    #[must_use]
    pub fn classify_url(&self, url: &str) -> UrlVerdict {
        let candidate = url.to_lowercase();
        self.patterns
            .iter()
            .find(|p| candidate.contains(p.as_str()))
            .map_or_else(UrlVerdict::allowed, |p| UrlVerdict::blocked_by(p))
    }

    /// Shorthand for `classify_url(url).blocked`
    #[inline]
    #[must_use]
    pub fn is_blocked(&self, url: &str) -> bool {
        self.classify_url(url).blocked
    }

    /// Normalized patterns in priority order
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Number of patterns
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set blocks nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_PATTERNS.iter().copied())
    }
}

impl From<Vec<String>> for PatternSet {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<PatternSet> for Vec<String> {
    fn from(value: PatternSet) -> Self {
        value.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocks_known_bundle_case_insensitively() {
        let set = PatternSet::default();
        let verdict = set.classify_url("https://app.example.com/assets/UseUserExtension-7C796CDA.js");
        assert!(verdict.blocked);
        assert_eq!(
            verdict.matched_pattern.as_deref(),
            Some("useuserextension-7c796cda.js")
        );
    }

    #[test]
    fn first_pattern_in_list_order_is_reported() {
        let set = PatternSet::new(["extension", "useuserextension"]);
        let verdict = set.classify_url("/assets/useUserExtension.js");
        assert_eq!(verdict.matched_pattern.as_deref(), Some("extension"));

        let reversed = PatternSet::new(["useuserextension", "extension"]);
        let verdict = reversed.classify_url("/assets/useUserExtension.js");
        assert_eq!(verdict.matched_pattern.as_deref(), Some("useuserextension"));
    }

    #[test]
    fn unrelated_urls_pass() {
        let set = PatternSet::default();
        assert_eq!(set.classify_url("/api/galleries?page=2"), UrlVerdict::allowed());
    }

    #[test]
    fn blank_patterns_are_dropped() {
        let set = PatternSet::new(["", "   ", "Tracker.JS "]);
        assert_eq!(set.patterns(), &["tracker.js".to_string()]);
        assert!(!set.is_blocked("/index.html"));
    }

    #[test]
    fn empty_set_blocks_nothing() {
        assert!(!PatternSet::empty().is_blocked("chrome-extension://abc/inject.js"));
    }

    #[test]
    fn serde_is_a_plain_list() {
        let set: PatternSet = serde_json::from_str(r#"["A.js","b.js"]"#).unwrap();
        assert_eq!(set.patterns(), &["a.js".to_string(), "b.js".to_string()]);
    }
}
