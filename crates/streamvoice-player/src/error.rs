//! Session error types.

use streamvoice_core::{EngineError, PreconditionError, SettingsError};

/// Errors that end a synthesis-and-playback session.
///
/// Session failures are recorded as the coordinator's last error and shown
/// to the user. [`Cancelled`](Self::Cancelled) never is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No reference audio file selected.
    #[error("Select a reference audio file first")]
    MissingReference,

    /// Reference audio transcript is empty.
    #[error("Enter the text spoken in the reference audio")]
    MissingPromptText,

    /// The engine rejected the reference audio (message passed through).
    #[error("{0}")]
    InvalidReference(String),

    /// The engine rejected the parameters or text (message passed through).
    #[error("{0}")]
    InvalidParams(String),

    /// Transport, timeout or backend failure during synthesis.
    #[error("{0}")]
    Engine(String),

    /// The output device could not be acquired or written.
    #[error("Audio playback failed: {0}")]
    Playback(String),

    /// The audio thread exited unexpectedly.
    #[error("Audio thread is not running")]
    AudioThreadDied,

    /// Player settings failed validation at construction.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Draft edits are only accepted while idle.
    #[error("A session is running, stop it before changing settings")]
    Busy,

    /// The session was stopped. Never surfaced to the user.
    #[error("Session cancelled")]
    Cancelled,
}

impl From<PreconditionError> for SessionError {
    fn from(err: PreconditionError) -> Self {
        match err {
            PreconditionError::MissingReference => Self::MissingReference,
            PreconditionError::MissingPromptText => Self::MissingPromptText,
        }
    }
}

impl From<SettingsError> for SessionError {
    fn from(err: SettingsError) -> Self {
        Self::InvalidSettings(err.to_string())
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidReference(msg) => Self::InvalidReference(msg),
            EngineError::InvalidParams(msg) => Self::InvalidParams(msg),
            other => Self::Engine(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn engine_rejections_keep_their_kind() {
        let err: SessionError = EngineError::InvalidReference("too short".into()).into();
        assert_eq!(err, SessionError::InvalidReference("too short".into()));
        assert_eq!(err.to_string(), "too short");
    }

    #[test]
    fn other_engine_failures_collapse_to_engine() {
        let err: SessionError = EngineError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, SessionError::Engine(ref m) if m.contains("timed out")));
    }

    #[test]
    fn settings_errors_name_the_field() {
        let err: SessionError = SettingsError::ZeroTimeout("chunk_timeout_secs").into();
        assert_eq!(
            err.to_string(),
            "Invalid settings: Timeout 'chunk_timeout_secs' must be greater than zero"
        );
    }
}
