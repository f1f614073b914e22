//! Guard phases and legal transitions

use crate::error::RecoveryError;

/// Phase of a recovery guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardPhase {
    /// Rendering children normally
    Idle,
    /// An error surfaced through the guard
    ErrorCaught,
    /// Deciding between recovery and fallback
    Classifying,
    /// Automatic recovery action pending
    Recovering,
    /// Attempt ceiling reached
    Escalated,
    /// Static fallback view; only manual controls leave it
    Fallback,
}

impl GuardPhase {
    /// All phases
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::ErrorCaught,
        Self::Classifying,
        Self::Recovering,
        Self::Escalated,
        Self::Fallback,
    ];

    /// Whether new errors start a sequence in this phase
    #[inline]
    #[must_use]
    pub fn accepts_errors(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: GuardPhase) -> Vec<GuardPhase> {
    use GuardPhase::{Classifying, ErrorCaught, Escalated, Fallback, Idle, Recovering};
    match from {
        Idle => vec![ErrorCaught],
        ErrorCaught => vec![Classifying],
        Classifying => vec![Recovering, Escalated, Fallback],
        Recovering => vec![Idle, Escalated],
        Escalated => vec![Fallback],
        Fallback => vec![Idle],
    }
}

/// Check a single transition
///
/// # Errors
/// - `RecoveryError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: GuardPhase, to: GuardPhase) -> Result<(), RecoveryError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(RecoveryError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_only_leaves_through_idle() {
        assert_eq!(allowed_transitions(GuardPhase::Fallback), vec![GuardPhase::Idle]);
        assert!(validate_transition(GuardPhase::Fallback, GuardPhase::Recovering).is_err());
    }

    #[test]
    fn error_path_is_ordered() {
        assert!(validate_transition(GuardPhase::Idle, GuardPhase::ErrorCaught).is_ok());
        assert!(validate_transition(GuardPhase::ErrorCaught, GuardPhase::Classifying).is_ok());
        assert!(validate_transition(GuardPhase::Idle, GuardPhase::Classifying).is_err());
    }
}
