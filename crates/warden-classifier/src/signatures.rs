//! Interference signatures and error classification
//!
//! [`SIGNATURES`] is the one catalogue of heuristics used to decide whether a
//! runtime error was caused by an uncontrolled third-party script. Callers
//! must go through [`classify_error`]; matching the catalogue anywhere else
//! lets classification drift between call sites.
//!
//! # Precision
//!
//! The storage and security exception signatures are deliberately broad.
//! Extensions that corrupt the environment commonly surface as
//! `QuotaExceededError` or `SecurityError`, but so do a handful of genuine
//! application bugs, which will then be auto-retried as interference. This is
//! a known precision/recall tradeoff of the catalogue, not an invariant.

use serde::{Deserialize, Serialize};

/// Family a signature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// Browser-extension URI scheme in a message or stack frame
    ExtensionScheme,
    /// Opaque, redacted error surfaced by injected code
    OpaqueError,
    /// Storage quota or security exception
    StorageException,
    /// Hook name exported by the known interfering bundle
    HookName,
}

/// One entry of the interference catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Stable identifier reported in verdicts
    pub id: &'static str,
    /// Lower-case substring searched for
    pub needle: &'static str,
    /// Signature family
    pub kind: SignatureKind,
}

/// Fixed catalogue of interference signatures
pub const SIGNATURES: &[Signature] = &[
    Signature {
        id: "chrome-extension-scheme",
        needle: "chrome-extension://",
        kind: SignatureKind::ExtensionScheme,
    },
    Signature {
        id: "moz-extension-scheme",
        needle: "moz-extension://",
        kind: SignatureKind::ExtensionScheme,
    },
    Signature {
        id: "safari-extension-scheme",
        needle: "safari-web-extension://",
        kind: SignatureKind::ExtensionScheme,
    },
    Signature {
        id: "redacted-error",
        needle: "redacted",
        kind: SignatureKind::OpaqueError,
    },
    Signature {
        id: "quota-exceeded",
        needle: "quotaexceedederror",
        kind: SignatureKind::StorageException,
    },
    Signature {
        id: "security-error",
        needle: "securityerror",
        kind: SignatureKind::StorageException,
    },
    Signature {
        id: "storage-access-denied",
        needle: "access is denied for this document",
        kind: SignatureKind::StorageException,
    },
    Signature {
        id: "use-user-extension-hook",
        needle: "useuserextension",
        kind: SignatureKind::HookName,
    },
    Signature {
        id: "use-extension-hook",
        needle: "useextension",
        kind: SignatureKind::HookName,
    },
];

/// Plain-data view of a caught error
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error name or constructor (`TypeError`, `SecurityError`, ...)
    pub name: String,
    /// Error message
    pub message: String,
    /// Stack trace text, if the platform provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorReport {
    /// Create report without a stack
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Attach stack text
    #[inline]
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    fn haystack(&self) -> String {
        let mut text = String::with_capacity(
            self.name.len() + self.message.len() + self.stack.as_ref().map_or(0, String::len) + 2,
        );
        text.push_str(&self.name);
        text.push('\n');
        text.push_str(&self.message);
        if let Some(stack) = &self.stack {
            text.push('\n');
            text.push_str(stack);
        }
        text.to_lowercase()
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

/// Result of [`classify_error`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorVerdict {
    /// Whether any interference signature matched
    pub is_interference: bool,
    /// Ids of every matching signature, in catalogue order
    pub signatures: Vec<String>,
}

/// Classify an error as interference or a genuine application error
#[must_use]
pub fn classify_error(error: &ErrorReport) -> ErrorVerdict {
    let haystack = error.haystack();
    let signatures: Vec<String> = SIGNATURES
        .iter()
        .filter(|s| haystack.contains(s.needle))
        .map(|s| s.id.to_string())
        .collect();

    ErrorVerdict {
        is_interference: !signatures.is_empty(),
        signatures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_type_error_is_generic() {
        let err = ErrorReport::new("", "TypeError: cannot read property 'x' of undefined");
        let verdict = classify_error(&err);
        assert!(!verdict.is_interference);
        assert!(verdict.signatures.is_empty());
    }

    #[test]
    fn extension_frame_in_stack_is_interference() {
        let err = ErrorReport::new("TypeError", "fetch is not a function")
            .with_stack("at inject (chrome-extension://abcdef/content.js:10:3)");
        let verdict = classify_error(&err);
        assert!(verdict.is_interference);
        assert_eq!(verdict.signatures, vec!["chrome-extension-scheme".to_string()]);
    }

    #[test]
    fn storage_exceptions_match_by_name() {
        let err = ErrorReport::new("SecurityError", "The operation is insecure.");
        assert_eq!(classify_error(&err).signatures, vec!["security-error".to_string()]);

        let err = ErrorReport::new("QuotaExceededError", "setItem failed");
        assert!(classify_error(&err).is_interference);
    }

    #[test]
    fn all_matching_signatures_are_reported_in_order() {
        let err = ErrorReport::new("Error", "[redacted] in useUserExtension");
        assert_eq!(
            classify_error(&err).signatures,
            vec![
                "redacted-error".to_string(),
                "use-user-extension-hook".to_string(),
            ]
        );
    }

    #[test]
    fn display_includes_name() {
        let err = ErrorReport::new("TypeError", "boom");
        assert_eq!(err.to_string(), "TypeError: boom");
        assert_eq!(ErrorReport::new("", "boom").to_string(), "boom");
    }

    #[test]
    fn needles_are_lower_case() {
        for sig in SIGNATURES {
            assert_eq!(sig.needle, sig.needle.to_lowercase(), "{}", sig.id);
        }
    }
}
