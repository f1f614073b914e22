//! Error types for the recovery state machine

use crate::state_machine::GuardPhase;
use crate::view::Remedy;

/// Errors from guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    /// Transition not allowed by the state machine
    #[error("illegal guard transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current phase
        from: GuardPhase,
        /// Requested phase
        to: GuardPhase,
    },

    /// Timers need a tokio runtime
    #[error("no async runtime available for recovery timers")]
    NoRuntime,

    /// Remedy not offered by the current view
    #[error("remedy {0:?} is not available in the current view")]
    RemedyUnavailable(Remedy),

    /// Guard has been unmounted
    #[error("guard '{0}' is not mounted")]
    NotMounted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RecoveryError::IllegalTransition {
            from: GuardPhase::Idle,
            to: GuardPhase::Recovering,
        };
        assert_eq!(err.to_string(), "illegal guard transition: Idle -> Recovering");
        assert_eq!(
            RecoveryError::NotMounted("root".into()).to_string(),
            "guard 'root' is not mounted"
        );
    }
}
