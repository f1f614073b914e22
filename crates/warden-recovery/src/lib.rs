//! Warden Recovery
//!
//! Per-guard recovery state machine that survives full page reloads.
//!
//! ```text
//!            catch_error            classify
//!   Idle ───────────────→ ErrorCaught ───→ Classifying
//!    ↑                                      │   │    │
//!    │ rerender / navigate    interference  │   │    │ generic
//!    └────────────── Recovering ←───────────┘   │    ↓
//!                        │      attempts ≥ max  │  Fallback ──retry──→ Idle
//!                        └──────→ Escalated ←───┘    ↑
//!                                     └──────────────┘
//! ```
//!
//! The attempt number of the open incident is persisted through the
//! [`warden_store::DiagnosticStore`] before any action is taken, so a guard
//! mounted after a reload resumes counting instead of starting over. The
//! ceiling is mandatory: once `max_attempts` is reached the guard settles in
//! `Fallback` and takes no further automatic action.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bus;
pub mod config;
pub mod error;
pub mod guard;
pub mod host;
pub mod state_machine;
pub mod view;
pub mod watchdog;

pub use bus::ErrorBus;
pub use config::RecoveryConfig;
pub use error::RecoveryError;
pub use guard::RecoveryGuard;
pub use host::RecoveryHost;
pub use state_machine::{allowed_transitions, validate_transition, GuardPhase};
pub use view::{FallbackKind, GuardView, Remedy};
pub use watchdog::Watchdog;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
