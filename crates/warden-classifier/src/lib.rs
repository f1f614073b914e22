//! Warden Classifier
//!
//! Pure classification functions shared by every interception point and every
//! recovery guard:
//!
//! - **URL classification**: is a script/network URL covered by a block pattern?
//! - **Error classification**: does an error carry a signature of third-party
//!   interference, or is it a genuine application bug?
//!
//! Nothing in this crate performs I/O or holds mutable state, so identical
//! inputs always produce identical verdicts.
//!
//! # Example
//!
//! ```rust
//! use warden_classifier::{classify_error, ErrorReport, PatternSet};
//!
//! let patterns = PatternSet::default();
//! let verdict = patterns.classify_url("https://cdn.example.com/assets/useUserExtension-7c796cda.js");
//! assert!(verdict.blocked);
//!
//! let err = ErrorReport::new("Error", "Script error: redacted");
//! assert!(classify_error(&err).is_interference);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod patterns;
pub mod signatures;

pub use patterns::{PatternSet, UrlVerdict, DEFAULT_BLOCK_PATTERNS};
pub use signatures::{classify_error, ErrorReport, ErrorVerdict, Signature, SignatureKind, SIGNATURES};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
