//! Warden Engine
//!
//! Page-load wiring for the interference mitigation layer.
//!
//! ```text
//!   WardenConfig (toml)
//!        │
//!        ▼
//!   Engine::init ──→ DiagnosticStore ──→ BypassController
//!        │                 │                    │
//!        ├── install ──→ InterceptionLayer ←────┘
//!        │                (elements, fetch, proxy, mutation watch)
//!        │
//!        └── mount_guard ──→ RecoveryGuard ←── ErrorBus ←── report_error
//! ```
//!
//! The `warden` binary exposes the classifiers, an incident simulation over
//! file-backed storage and the diagnostics report.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod logging;
pub mod simulate;

pub use config::WardenConfig;
pub use engine::{Engine, LoggingHost, OfflineNetwork};
pub use error::{ConfigError, EngineError};
pub use keys::{KeyChord, BYPASS_TOGGLE};
pub use simulate::{
    simulate, SimulatedFailure, SimulationOptions, SimulationOutcome, SimulationReport,
    SimulationStep,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
