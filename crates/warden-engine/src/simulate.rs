//! Incident simulation
//!
//! Drives one guard through repeated render failures across simulated page
//! loads sharing a storage backend. A re-render renders again within the same
//! load; navigation and reload start a new load with a fresh [`Engine`], so
//! the persisted incident is what carries the attempt count across them.

use crate::config::WardenConfig;
use crate::engine::{Engine, OfflineNetwork};
use crate::error::EngineError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use warden_classifier::ErrorReport;
use warden_recovery::{GuardPhase, GuardView, RecoveryHost};
use warden_store::{DiagnosticsReport, StorageBackend};

/// Upper bound on simulated page loads
pub const DEFAULT_MAX_LOADS: u32 = 16;

/// Kind of failure the simulated route raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedFailure {
    /// Extension-style interference
    Interference,
    /// Ordinary application bug
    Generic,
}

impl SimulatedFailure {
    /// Error raised on each failing render
    #[must_use]
    pub fn error(self) -> ErrorReport {
        match self {
            Self::Interference => {
                ErrorReport::new("TypeError", "useUserExtension is not a function")
                    .with_stack("at chrome-extension://abcdef/content.js:12:7")
            }
            Self::Generic => {
                ErrorReport::new("TypeError", "Cannot read properties of undefined (reading 'id')")
            }
        }
    }
}

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Guard id
    pub guard_id: String,
    /// First URL loaded
    pub start_url: String,
    /// Renders that fail before one succeeds; `None` never succeeds
    pub failures: Option<u32>,
    /// What the failing renders raise
    pub failure: SimulatedFailure,
    /// Page loads before giving up
    pub max_loads: u32,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            guard_id: "root".to_string(),
            start_url: "/".to_string(),
            failures: None,
            failure: SimulatedFailure::Interference,
            max_loads: DEFAULT_MAX_LOADS,
        }
    }
}

/// One observed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SimulationStep {
    /// Page load began
    Load {
        /// 1-based load number
        number: u32,
        /// Loaded URL
        url: String,
        /// Whether blocking is skipped for this load
        bypass_active: bool,
    },
    /// Render failed
    RenderFailed {
        /// Guard phase after the error was handled
        phase: String,
        /// Attempt number of the open incident
        attempt: u32,
    },
    /// Guard asked for a re-render
    Rerender,
    /// Guard asked to navigate
    Navigate {
        /// Target path
        path: String,
    },
    /// Guard asked for a reload
    Reload,
    /// Render succeeded
    Ready,
    /// Guard settled on a fallback
    Fallback {
        /// Fallback reason
        kind: String,
        /// Offered remedies
        remedies: Vec<String>,
    },
}

/// How the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// Route rendered
    Recovered,
    /// Fallback view shown
    Fallback,
    /// Load cap reached
    GaveUp,
}

/// Result of [`simulate`]
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Events in order
    pub steps: Vec<SimulationStep>,
    /// Final outcome
    pub outcome: SimulationOutcome,
    /// Diagnostics at the end of the run
    pub diagnostics: DiagnosticsReport,
}

impl SimulationReport {
    /// Page loads performed
    #[must_use]
    pub fn loads(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, SimulationStep::Load { .. }))
            .count()
    }

    /// Human-readable rendering
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let line = match step {
                SimulationStep::Load {
                    number,
                    url,
                    bypass_active,
                } => format!("load #{number} {url} (bypass {})", on_off(*bypass_active)),
                SimulationStep::RenderFailed { phase, attempt } => {
                    format!("  render failed -> {phase} (attempt {attempt})")
                }
                SimulationStep::Rerender => "  re-render".to_string(),
                SimulationStep::Navigate { path } => format!("  navigate to {path}"),
                SimulationStep::Reload => "  reload".to_string(),
                SimulationStep::Ready => "  ready".to_string(),
                SimulationStep::Fallback { kind, remedies } => {
                    format!("  fallback ({kind}); remedies: {}", remedies.join(", "))
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("outcome: {:?}\n\n", self.outcome));
        out.push_str(&self.diagnostics.generate_text());
        out
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostRequest {
    Rerender,
    Navigate(String),
    Reload,
}

/// Host that forwards recovery requests to the simulation loop
#[derive(Debug)]
struct ChannelHost {
    tx: mpsc::UnboundedSender<HostRequest>,
}

impl RecoveryHost for ChannelHost {
    fn rerender(&self, _guard_id: &str) {
        let _ = self.tx.send(HostRequest::Rerender);
    }

    fn navigate(&self, path: &str) {
        let _ = self.tx.send(HostRequest::Navigate(path.to_string()));
    }

    fn reload(&self) {
        let _ = self.tx.send(HostRequest::Reload);
    }
}

/// Run an incident to completion
///
/// # Errors
/// - `EngineError::Config` for an invalid configuration
/// - `EngineError::Recovery` outside a tokio runtime
pub async fn simulate(
    config: WardenConfig,
    backend: Arc<dyn StorageBackend>,
    options: SimulationOptions,
) -> Result<SimulationReport, EngineError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host: Arc<dyn RecoveryHost> = Arc::new(ChannelHost { tx });
    let mut steps = Vec::new();
    let mut url = options.start_url.clone();
    let mut renders = 0u32;
    let mut last_engine: Option<Engine> = None;

    for number in 1..=options.max_loads {
        if let Some(previous) = last_engine.take() {
            previous.reset();
        }
        let engine = Engine::init(
            config.clone(),
            backend.clone(),
            &url,
            Arc::new(OfflineNetwork),
        )?
        .with_host(host.clone());
        engine.install();
        steps.push(SimulationStep::Load {
            number,
            url: url.clone(),
            bypass_active: engine.bypass().is_active(),
        });
        let guard = engine.mount_guard(&options.guard_id)?;

        loop {
            renders += 1;
            if options.failures.is_some_and(|n| renders > n) {
                guard.mark_ready();
                steps.push(SimulationStep::Ready);
                return Ok(finish(steps, SimulationOutcome::Recovered, &engine));
            }

            let phase = guard.catch_error(options.failure.error())?;
            steps.push(SimulationStep::RenderFailed {
                phase: format!("{phase:?}"),
                attempt: guard.attempt(),
            });
            if phase == GuardPhase::Fallback {
                if let GuardView::Fallback { kind, remedies, .. } = guard.view() {
                    steps.push(SimulationStep::Fallback {
                        kind: format!("{kind:?}"),
                        remedies: remedies.iter().map(|r| format!("{r:?}")).collect(),
                    });
                }
                return Ok(finish(steps, SimulationOutcome::Fallback, &engine));
            }

            match rx.recv().await {
                Some(HostRequest::Rerender) => steps.push(SimulationStep::Rerender),
                Some(HostRequest::Navigate(path)) => {
                    steps.push(SimulationStep::Navigate { path: path.clone() });
                    url = path;
                    break;
                }
                Some(HostRequest::Reload) => {
                    steps.push(SimulationStep::Reload);
                    break;
                }
                None => return Ok(finish(steps, SimulationOutcome::GaveUp, &engine)),
            }
        }
        last_engine = Some(engine);
    }

    tracing::warn!(max_loads = options.max_loads, "simulation hit the load cap");
    let outcome = SimulationOutcome::GaveUp;
    Ok(match last_engine {
        Some(engine) => finish(steps, outcome, &engine),
        None => {
            let engine = Engine::init(config, backend, &url, Arc::new(OfflineNetwork))?;
            finish(steps, outcome, &engine)
        }
    })
}

fn finish(steps: Vec<SimulationStep>, outcome: SimulationOutcome, engine: &Engine) -> SimulationReport {
    tracing::info!(?outcome, steps = steps.len(), "simulation finished");
    let report = SimulationReport {
        steps,
        outcome,
        diagnostics: engine.report(),
    };
    engine.reset();
    report
}
