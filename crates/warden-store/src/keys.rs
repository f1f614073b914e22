//! Key layout and versioned record envelope
//!
//! All keys are rendered from [`StoreKey`] so the namespace convention lives
//! in one place. Values are wrapped in [`Versioned`]; a record whose version
//! does not match, or that fails to decode, reads as absent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default private key prefix
pub const DEFAULT_PREFIX: &str = "warden:";

/// Logical key inside the Warden namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey<'a> {
    /// Ordered blocked-event log
    BlockedEvents,
    /// Error counter by kind
    Counter(&'a str),
    /// Named mode flag
    Flag(&'a str),
    /// Recovery attempt record for a guard
    Attempt(&'a str),
    /// Persisted bypass flag
    Bypass,
}

impl StoreKey<'_> {
    /// Render the full storage key under `prefix`
    #[must_use]
    pub fn render(&self, prefix: &str) -> String {
        match self {
            Self::BlockedEvents => format!("{prefix}blocked"),
            Self::Counter(kind) => format!("{prefix}counter:{kind}"),
            Self::Flag(name) => format!("{prefix}flag:{name}"),
            Self::Attempt(guard) => format!("{prefix}attempt:{guard}"),
            Self::Bypass => format!("{prefix}bypass"),
        }
    }
}

/// Record type with a schema version
pub trait PersistedRecord: Serialize + DeserializeOwned {
    /// Current schema version; bump on incompatible change
    const VERSION: u32;
}

/// Versioned envelope written to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Schema version the payload was written with
    pub v: u32,
    /// Payload
    pub data: T,
}

impl<T: PersistedRecord> Versioned<T> {
    /// Encode a record at its current version
    pub fn encode(data: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Versioned {
            v: T::VERSION,
            data,
        })
    }

    /// Decode a record; wrong version or malformed text reads as `None`
    #[must_use]
    pub fn decode(text: &str) -> Option<T> {
        let envelope: Versioned<T> = serde_json::from_str(text).ok()?;
        if envelope.v == T::VERSION {
            Some(envelope.data)
        } else {
            tracing::debug!(
                found = envelope.v,
                expected = T::VERSION,
                "discarding record with stale schema version"
            );
            None
        }
    }
}
