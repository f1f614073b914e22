//! Warden Interception Layer
//!
//! Four independent capture points catch blocked scripts before they reach
//! application code and substitute an inert stub module:
//!
//! | Capture point | Catches |
//! |---|---|
//! | [`GuardedElementFactory`] | `setAttribute("src")` and `src` assignments on script elements |
//! | [`GuardedFetch`] | page-level fetch calls |
//! | [`ProxyClient`] (background proxy) | every request on the transport, including ones from code holding the pre-override fetch |
//! | [`MutationWatch`] | script nodes inserted outside the wrapped creation path |
//!
//! Built-in primitives are never patched in place: each capture point is a
//! decorator taking the real capability and returning a wrapped one, installed
//! once through the [`CapabilityRegistry`].
//!
//! # Architecture
//!
//! ```text
//! app code ──fetch──→ GuardedFetch ─→ TransportFetch ─→ ProxyFetch ══msg══→ proxy worker ─→ network
//!                          │                                                   │
//!                          └──── InterceptionContext::evaluate ←── patterns ───┘ (CONFIGURE_BLOCKER)
//!                                   │ bypass? classify? record
//!                                   ↓
//!                             DiagnosticStore
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod context;
pub mod dom;
pub mod elements;
pub mod error;
pub mod fetch;
pub mod layer;
pub mod mutation;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod stub;

pub use context::{CapturePoint, InterceptionContext, Substitution};
pub use dom::{Document, Element, ElementFactory, ElementHandle, MutationObserver, MutationRecord, NativeElementFactory};
pub use elements::{GuardedElementFactory, GuardedScript};
pub use error::{FetchError, InstallError, ProxyError};
pub use fetch::{Fetch, FetchInput, GuardedFetch, Request, Response, TransportFetch};
pub use layer::{InstallReport, InterceptionLayer};
pub use mutation::MutationWatch;
pub use protocol::{ProxyCommand, ProxyEvent};
pub use proxy::{ProxyClient, ProxyFetch};
pub use registry::CapabilityRegistry;
pub use stub::{StubExport, StubModule, StubValue, JAVASCRIPT_CONTENT_TYPE, STUB_MODULE_PATH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
