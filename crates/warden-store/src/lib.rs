//! Warden Store
//!
//! Everything Warden persists lives behind this crate:
//!
//! - [`StorageBackend`]: the scoped key/value medium (browser storage in the
//!   page, a JSON file for the CLI, memory in tests)
//! - [`DiagnosticStore`]: failure-tolerant access to blocked events, error
//!   counters, flags and recovery attempts under a private key prefix
//! - [`BypassController`]: persisted bypass flag plus per-page query override
//!
//! # Failure Model
//!
//! The storage medium may be disabled by the very interference Warden defends
//! against. No operation here ever returns a storage error to its caller: the
//! first failure switches the store to an in-process map for the rest of the
//! session.
//!
//! ```text
//! caller → DiagnosticStore ─ ok ──→ StorageBackend
//!                    └─ error → degraded: in-memory fallback (session only)
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod bypass;
pub mod error;
pub mod keys;
pub mod records;
pub mod report;
pub mod store;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use bypass::{BypassChange, BypassController, Location, DEFAULT_BYPASS_QUERY_PARAM};
pub use error::StorageError;
pub use keys::{StoreKey, Versioned, DEFAULT_PREFIX};
pub use records::{
    BlockedEvent, BypassFlag, Classification, InterceptionPoint, RecoveryAttempt, RecoveryOutcome,
};
pub use report::DiagnosticsReport;
pub use store::{DiagnosticStore, DEFAULT_MAX_BLOCKED_EVENTS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
