//! Recovery guard
//!
//! One guard per mounted error boundary. Guards may nest; each keeps its own
//! incident under its own id in the shared store and runs at most one
//! recovery sequence at a time.

use crate::bus::ErrorBus;
use crate::config::RecoveryConfig;
use crate::error::RecoveryError;
use crate::host::RecoveryHost;
use crate::state_machine::{validate_transition, GuardPhase};
use crate::view::{FallbackKind, GuardView, Remedy};
use crate::watchdog::Watchdog;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use warden_classifier::{classify_error, ErrorReport};
use warden_store::{
    BypassController, Classification, DiagnosticStore, RecoveryAttempt, RecoveryOutcome,
};

/// Counter bumped for errors dropped while a sequence is running
const SUPPRESSED_COUNTER: &str = "suppressed";

/// Handle to a mounted guard
#[derive(Debug, Clone)]
pub struct RecoveryGuard {
    inner: Arc<GuardInner>,
}

#[derive(Debug)]
struct GuardInner {
    id: String,
    config: RecoveryConfig,
    store: Arc<DiagnosticStore>,
    bypass: Arc<BypassController>,
    host: Arc<dyn RecoveryHost>,
    runtime: Handle,
    mounted: AtomicBool,
    state: Mutex<GuardState>,
    watchdog: Mutex<Watchdog>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Debug)]
struct GuardState {
    phase: GuardPhase,
    incident: Option<RecoveryAttempt>,
    fallback: Option<FallbackKind>,
    last_error: Option<ErrorReport>,
    still_trying: bool,
    suppressed: u64,
    pending_action: Option<JoinHandle<()>>,
}

impl GuardState {
    fn transition(&mut self, guard_id: &str, to: GuardPhase) -> Result<(), RecoveryError> {
        validate_transition(self.phase, to)?;
        tracing::debug!(guard = guard_id, from = ?self.phase, to = ?to, "guard transition");
        self.phase = to;
        Ok(())
    }

    fn attempt(&self) -> u32 {
        self.incident.as_ref().map_or(0, |i| i.attempt_number)
    }
}

enum ScheduledAction {
    Rerender,
    Navigate(String),
}

impl RecoveryGuard {
    /// Mount a guard, resuming the incident persisted under `id`
    ///
    /// A pending incident continues its attempt count; an escalated one keeps
    /// the guard escalating until a remedy or [`RecoveryGuard::mark_ready`]
    /// closes it.
    ///
    /// # Errors
    /// - `RecoveryError::NoRuntime` outside a tokio runtime
    pub fn mount(
        id: impl Into<String>,
        config: RecoveryConfig,
        store: Arc<DiagnosticStore>,
        bypass: Arc<BypassController>,
        host: Arc<dyn RecoveryHost>,
    ) -> Result<Self, RecoveryError> {
        let runtime = Handle::try_current().map_err(|_| RecoveryError::NoRuntime)?;
        let id = id.into();

        let incident = store.load_attempt(&id);
        if let Some(attempt) = &incident {
            tracing::info!(
                guard = %id,
                incident = %attempt.incident_id,
                attempt = attempt.attempt_number,
                outcome = ?attempt.outcome,
                "resuming persisted incident"
            );
        }
        let resumed = incident.as_ref().is_some_and(RecoveryAttempt::is_pending);

        let guard = Self {
            inner: Arc::new(GuardInner {
                watchdog: Mutex::new(Watchdog::new(config.watchdog_deadline)),
                id,
                config,
                store,
                bypass,
                host,
                runtime,
                mounted: AtomicBool::new(true),
                state: Mutex::new(GuardState {
                    phase: GuardPhase::Idle,
                    incident,
                    fallback: None,
                    last_error: None,
                    still_trying: false,
                    suppressed: 0,
                    pending_action: None,
                }),
                listeners: Mutex::new(Vec::new()),
            }),
        };
        if resumed {
            guard.inner.arm_watchdog();
        }
        Ok(guard)
    }

    /// Guard identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.inner.config
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> GuardPhase {
        self.inner.state.lock().phase
    }

    /// Attempts made in the open incident
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.inner.state.lock().attempt()
    }

    /// Open or last escalated incident
    #[must_use]
    pub fn incident(&self) -> Option<RecoveryAttempt> {
        self.inner.state.lock().incident.clone()
    }

    /// Errors dropped because a sequence was already running
    #[must_use]
    pub fn suppressed_errors(&self) -> u64 {
        self.inner.state.lock().suppressed
    }

    /// Whether the guard is mounted
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Whether the stuck-state watchdog is armed
    #[must_use]
    pub fn watchdog_armed(&self) -> bool {
        self.inner.watchdog.lock().is_armed()
    }

    /// Handle an error surfacing through this guard; returns the new phase
    ///
    /// # Errors
    /// - `RecoveryError::NotMounted` after [`RecoveryGuard::unmount`]
    pub fn catch_error(&self, error: ErrorReport) -> Result<GuardPhase, RecoveryError> {
        let inner = &self.inner;
        if !self.is_mounted() {
            return Err(RecoveryError::NotMounted(inner.id.clone()));
        }

        let mut state = inner.state.lock();
        if !state.phase.accepts_errors() {
            state.suppressed += 1;
            inner.store.increment_error_counter(SUPPRESSED_COUNTER);
            tracing::debug!(
                guard = %inner.id,
                phase = ?state.phase,
                %error,
                "error dropped; sequence already running"
            );
            return Ok(state.phase);
        }

        state.transition(&inner.id, GuardPhase::ErrorCaught)?;
        state.last_error = Some(error.clone());
        inner.arm_watchdog();

        state.transition(&inner.id, GuardPhase::Classifying)?;
        let verdict = classify_error(&error);
        let classification = if verdict.is_interference {
            Classification::Interference
        } else {
            Classification::Generic
        };
        inner.store.increment_error_counter(classification.counter_kind());
        tracing::info!(
            guard = %inner.id,
            %error,
            classification = classification.counter_kind(),
            signatures = ?verdict.signatures,
            "error classified"
        );

        if classification == Classification::Generic {
            state.transition(&inner.id, GuardPhase::Fallback)?;
            state.fallback = Some(FallbackKind::Generic);
            state.still_trying = false;
            drop(state);
            inner.watchdog.lock().cancel();
            return Ok(GuardPhase::Fallback);
        }

        let mut incident = state
            .incident
            .take()
            .unwrap_or_else(|| {
                RecoveryAttempt::open(inner.id.clone(), classification)
                    .with_route(inner.bypass.current_path())
            });

        if !incident.is_pending() || incident.attempt_number >= inner.config.max_attempts {
            incident.outcome = RecoveryOutcome::Escalated;
            inner.store.save_attempt(&incident);
            tracing::warn!(
                guard = %inner.id,
                incident = %incident.incident_id,
                attempts = incident.attempt_number,
                "attempt ceiling reached; escalating to fallback"
            );
            let route = incident.route.clone();
            state.incident = Some(incident);
            state.transition(&inner.id, GuardPhase::Escalated)?;
            state.transition(&inner.id, GuardPhase::Fallback)?;
            state.fallback = Some(FallbackKind::Escalated);
            state.still_trying = false;
            drop(state);

            inner.watchdog.lock().cancel();
            if inner.config.auto_bypass_on_escalation {
                inner.escalate_route(&route);
            }
            return Ok(GuardPhase::Fallback);
        }

        incident.attempt_number += 1;
        let attempt = incident.attempt_number;
        inner.store.save_attempt(&incident);
        state.incident = Some(incident);

        let purged = inner
            .store
            .purge_matching(&inner.config.purge_prefixes, inner.config.purge_batch);
        state.transition(&inner.id, GuardPhase::Recovering)?;
        state.pending_action = Some(self.schedule(attempt));
        tracing::info!(
            guard = %inner.id,
            attempt,
            max_attempts = inner.config.max_attempts,
            purged,
            "recovery attempt scheduled"
        );
        Ok(GuardPhase::Recovering)
    }

    fn schedule(&self, attempt: u32) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.config.retry_delay;
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.run_scheduled(attempt);
            }
        })
    }

    /// Subscribe to globally published errors
    pub fn listen(&self, bus: &ErrorBus) {
        let mut rx = bus.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let id = self.inner.id.clone();
        let task = self.inner.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(error) => {
                        let Some(inner) = weak.upgrade() else { break };
                        if (Self { inner }).catch_error(error).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(guard = %id, skipped, "error listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.inner.listeners.lock().push(task);
    }

    /// The route reached its ready state; closes an open incident
    pub fn mark_ready(&self) {
        let inner = &self.inner;
        inner.reset_watchdog();
        let mut state = inner.state.lock();
        state.still_trying = false;
        if state.phase != GuardPhase::Idle {
            return;
        }
        if let Some(mut incident) = state.incident.take() {
            if incident.is_pending() {
                incident.outcome = RecoveryOutcome::Recovered;
            }
            inner.store.clear_attempt(&inner.id);
            tracing::info!(
                guard = %inner.id,
                incident = %incident.incident_id,
                attempts = incident.attempt_number,
                outcome = ?incident.outcome,
                "incident closed"
            );
        }
    }

    /// Manual retry from a fallback view
    ///
    /// # Errors
    /// - `RecoveryError::IllegalTransition` outside `Fallback`
    pub fn retry(&self) -> Result<(), RecoveryError> {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            state.transition(&inner.id, GuardPhase::Idle)?;
            state.fallback = None;
            state.last_error = None;
            state.still_trying = false;
        }
        inner.reset_watchdog();
        tracing::info!(guard = %inner.id, "manual retry");
        inner.host.rerender(&inner.id);
        Ok(())
    }

    /// Apply a remedy offered by the current view
    ///
    /// # Errors
    /// - `RecoveryError::RemedyUnavailable` when the view does not offer it
    pub fn apply_remedy(&self, remedy: Remedy) -> Result<(), RecoveryError> {
        if !self.view().offers(remedy) {
            return Err(RecoveryError::RemedyUnavailable(remedy));
        }
        let inner = &self.inner;
        tracing::info!(guard = %inner.id, ?remedy, "applying remedy");
        match remedy {
            Remedy::Retry => self.retry(),
            Remedy::Reload => {
                inner.end_incident()?;
                inner.host.reload();
                Ok(())
            }
            Remedy::ClearAndReload => {
                inner.end_incident()?;
                inner.store.clear_diagnostics();
                inner
                    .store
                    .purge_matching(&inner.config.purge_prefixes, usize::MAX);
                inner.host.reload();
                Ok(())
            }
            Remedy::NavigateHome => {
                inner.end_incident()?;
                inner.host.navigate(&inner.config.home_path);
                Ok(())
            }
        }
    }

    /// Current rendered output
    #[must_use]
    pub fn view(&self) -> GuardView {
        let inner = &self.inner;
        let state = inner.state.lock();
        match (state.phase, state.fallback) {
            (GuardPhase::Fallback, Some(kind)) => GuardView::Fallback {
                kind,
                message: state.last_error.as_ref().map(ToString::to_string),
                remedies: kind.remedies(),
                diagnostics: (kind == FallbackKind::Escalated && inner.config.show_diagnostics)
                    .then(|| Box::new(inner.store.report(inner.bypass.is_active()))),
            },
            _ if state.still_trying => GuardView::StillTrying {
                attempt: state.attempt(),
            },
            (GuardPhase::Recovering, _) => GuardView::Recovering {
                attempt: state.attempt(),
                max_attempts: inner.config.max_attempts,
            },
            _ => GuardView::Children,
        }
    }

    /// Tear down; pending actions, listeners and the watchdog are cancelled
    ///
    /// The persisted incident is kept so a later mount can resume it.
    pub fn unmount(&self) {
        let inner = &self.inner;
        if !inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = inner.state.lock().pending_action.take() {
            task.abort();
        }
        for task in inner.listeners.lock().drain(..) {
            task.abort();
        }
        inner.watchdog.lock().cancel();
        tracing::debug!(guard = %inner.id, "guard unmounted");
    }
}

impl GuardInner {
    fn arm_watchdog(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let _enter = self.runtime.enter();
        let armed = self.watchdog.lock().start(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.lock();
                if state.phase != GuardPhase::Fallback {
                    state.still_trying = true;
                }
            }
        });
        if let Err(e) = armed {
            tracing::warn!(guard = %self.id, error = %e, "watchdog not armed");
        }
    }

    fn reset_watchdog(&self) {
        *self.watchdog.lock() = Watchdog::new(self.config.watchdog_deadline);
    }

    fn run_scheduled(&self, attempt: u32) {
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }
        let action = {
            let mut state = self.state.lock();
            if state.phase != GuardPhase::Recovering {
                return;
            }
            state.pending_action = None;
            if let Err(e) = state.transition(&self.id, GuardPhase::Idle) {
                tracing::error!(guard = %self.id, error = %e, "scheduled action skipped");
                return;
            }
            if attempt <= self.config.rerender_attempts {
                ScheduledAction::Rerender
            } else {
                ScheduledAction::Navigate(self.config.safe_path.clone())
            }
        };

        match action {
            ScheduledAction::Rerender => {
                tracing::info!(guard = %self.id, attempt, "re-rendering after recovery delay");
                self.host.rerender(&self.id);
            }
            ScheduledAction::Navigate(path) => {
                tracing::info!(guard = %self.id, attempt, path = %path, "navigating to safe path");
                self.host.navigate(&path);
            }
        }
    }

    /// Scope bypass to the route the incident started on
    ///
    /// The safe and home paths are never added.
    fn escalate_route(&self, route: &str) {
        let config = &self.config;
        if route.is_empty() || route == config.safe_path || route == config.home_path {
            tracing::warn!(
                guard = %self.id,
                route,
                "incident route not escalated to bypass"
            );
            return;
        }
        self.bypass.escalate(route);
    }

    fn end_incident(&self) -> Result<(), RecoveryError> {
        self.store.clear_attempt(&self.id);
        let mut state = self.state.lock();
        state.transition(&self.id, GuardPhase::Idle)?;
        state.incident = None;
        state.fallback = None;
        state.last_error = None;
        Ok(())
    }
}

impl Drop for GuardInner {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().pending_action.take() {
            task.abort();
        }
        for task in self.listeners.get_mut().drain(..) {
            task.abort();
        }
    }
}
