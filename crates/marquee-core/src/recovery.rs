//! Fatal-error classification for library-driven sessions
//!
//! ```text
//!            fatal network            fatal network (again)
//!  Healthy ────────────────► Degraded(Network) ─────────────► Fatal
//!     ▲                           │
//!     └──────── progress ─────────┘
//!
//!            fatal media              fatal media (again)
//!  Healthy ────────────────► Degraded(Media) ───────────────► Fatal
//!
//!  any other fatal kind ───────────────────────────────────► Fatal
//! ```
//!
//! Non-fatal engine errors never change the state.

use crate::{
    engine::{EngineError, EngineErrorType},
    Error, StreamErrorKind,
};
use serde::{Deserialize, Serialize};

/// Why a session is degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegradedCause {
    NetworkIssue,
    MediaIssue,
}

impl From<DegradedCause> for StreamErrorKind {
    fn from(cause: DegradedCause) -> Self {
        match cause {
            DegradedCause::NetworkIssue => StreamErrorKind::NetworkIssue,
            DegradedCause::MediaIssue => StreamErrorKind::MediaIssue,
        }
    }
}

/// Health of a stream session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionHealth {
    #[default]
    Healthy,
    Degraded(DegradedCause),
    Fatal,
}

impl std::fmt::Display for SessionHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionHealth::Healthy => write!(f, "healthy"),
            SessionHealth::Degraded(DegradedCause::NetworkIssue) => write!(f, "degraded(network)"),
            SessionHealth::Degraded(DegradedCause::MediaIssue) => write!(f, "degraded(media)"),
            SessionHealth::Fatal => write!(f, "fatal"),
        }
    }
}

/// What the session must do about an engine error
#[derive(Debug)]
pub enum RecoveryAction {
    /// Log only
    Ignore,
    /// Restart the engine's load pipeline
    RestartLoad,
    /// Ask the engine to rebuild its decode pipeline
    RecoverMedia,
    /// Give up: dispose the session and report the error
    Fail(Error),
}

/// Tracks recovery attempts for one session
#[derive(Debug, Default)]
pub struct ErrorClassifier {
    health: SessionHealth,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(&self) -> SessionHealth {
        self.health
    }

    /// Classify an engine error and advance the state machine
    pub fn on_error(&mut self, error: &EngineError) -> RecoveryAction {
        if !error.fatal || self.health == SessionHealth::Fatal {
            return RecoveryAction::Ignore;
        }

        let cause = match error.error_type {
            EngineErrorType::Network => DegradedCause::NetworkIssue,
            EngineErrorType::Media => DegradedCause::MediaIssue,
            _ => {
                self.health = SessionHealth::Fatal;
                return RecoveryAction::Fail(Error::Engine(error.describe()));
            }
        };

        // A second fatal error of the same class before any progress
        if self.health == SessionHealth::Degraded(cause) {
            self.health = SessionHealth::Fatal;
            let detail = error.describe();
            return RecoveryAction::Fail(match cause {
                DegradedCause::NetworkIssue => Error::NetworkIssue(detail),
                DegradedCause::MediaIssue => Error::MediaIssue(detail),
            });
        }

        self.health = SessionHealth::Degraded(cause);
        match cause {
            DegradedCause::NetworkIssue => RecoveryAction::RestartLoad,
            DegradedCause::MediaIssue => RecoveryAction::RecoverMedia,
        }
    }

    /// The pipeline made progress. Returns the cause that was cleared, if any.
    pub fn on_progress(&mut self) -> Option<DegradedCause> {
        match self.health {
            SessionHealth::Degraded(cause) => {
                self.health = SessionHealth::Healthy;
                Some(cause)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> EngineError {
        EngineError::fatal(EngineErrorType::Network, "fragLoadTimeOut")
    }

    fn media() -> EngineError {
        EngineError::fatal(EngineErrorType::Media, "bufferStalledError")
    }

    #[test]
    fn test_single_network_error_recovers() {
        let mut classifier = ErrorClassifier::new();

        assert!(matches!(classifier.on_error(&network()), RecoveryAction::RestartLoad));
        assert_eq!(
            classifier.health(),
            SessionHealth::Degraded(DegradedCause::NetworkIssue)
        );

        assert_eq!(classifier.on_progress(), Some(DegradedCause::NetworkIssue));
        assert_eq!(classifier.health(), SessionHealth::Healthy);
    }

    #[test]
    fn test_consecutive_network_errors_are_fatal() {
        let mut classifier = ErrorClassifier::new();
        classifier.on_error(&network());

        match classifier.on_error(&network()) {
            RecoveryAction::Fail(err) => assert_eq!(err.kind(), Some(StreamErrorKind::NetworkIssue)),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(classifier.health(), SessionHealth::Fatal);
    }

    #[test]
    fn test_consecutive_media_errors_are_fatal() {
        let mut classifier = ErrorClassifier::new();
        assert!(matches!(classifier.on_error(&media()), RecoveryAction::RecoverMedia));
        assert!(matches!(classifier.on_error(&media()), RecoveryAction::Fail(Error::MediaIssue(_))));
    }

    #[test]
    fn test_recovered_session_gets_a_fresh_attempt() {
        let mut classifier = ErrorClassifier::new();
        classifier.on_error(&network());
        classifier.on_progress();

        assert!(matches!(classifier.on_error(&network()), RecoveryAction::RestartLoad));
    }

    #[test]
    fn test_switching_class_restarts_budget() {
        let mut classifier = ErrorClassifier::new();
        classifier.on_error(&network());

        assert!(matches!(classifier.on_error(&media()), RecoveryAction::RecoverMedia));
        assert_eq!(
            classifier.health(),
            SessionHealth::Degraded(DegradedCause::MediaIssue)
        );
    }

    #[test]
    fn test_other_fatal_kinds_fail_immediately() {
        let mut classifier = ErrorClassifier::new();
        let err = EngineError::fatal(EngineErrorType::Mux, "fragParsingError");

        assert!(matches!(classifier.on_error(&err), RecoveryAction::Fail(Error::Engine(_))));
        assert_eq!(classifier.health(), SessionHealth::Fatal);
    }

    #[test]
    fn test_non_fatal_errors_are_ignored() {
        let mut classifier = ErrorClassifier::new();
        let warning = EngineError::non_fatal(EngineErrorType::Network, "fragLoadError");

        assert!(matches!(classifier.on_error(&warning), RecoveryAction::Ignore));
        assert!(matches!(classifier.on_error(&warning), RecoveryAction::Ignore));
        assert_eq!(classifier.health(), SessionHealth::Healthy);
    }

    #[test]
    fn test_fatal_is_terminal() {
        let mut classifier = ErrorClassifier::new();
        classifier.on_error(&EngineError::fatal(EngineErrorType::Other, "internalException"));

        assert!(matches!(classifier.on_error(&network()), RecoveryAction::Ignore));
        assert_eq!(classifier.on_progress(), None);
        assert_eq!(classifier.health(), SessionHealth::Fatal);
    }
}
