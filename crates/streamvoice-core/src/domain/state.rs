//! Session state machine types.
//!
//! ```text
//!   Idle → Loading → Playing → Idle
//!            │          │
//!            └──────────┴──→ Failed → Idle
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the single synthesis-and-playback session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum SessionState {
    /// No session running. Controls are editable.
    #[default]
    Idle,

    /// Waiting for the engine to produce the first audio.
    Loading,

    /// Audio is being played.
    Playing,

    /// The session ended with an error. Transient: always followed by `Idle`.
    Failed { message: String },
}

impl SessionState {
    /// Whether a session occupies the engine or the output device.
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Loading | Self::Playing)
    }

    /// Short label for logs and status payloads.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Playback path, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Synthesize the whole buffer, then play it.
    Batch,

    /// Play chunks as the engine produces them.
    Streaming,
}

impl SessionMode {
    pub const fn from_streaming_flag(streaming: bool) -> Self {
        if streaming { Self::Streaming } else { Self::Batch }
    }
}

/// Snapshot of the coordinator for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,

    /// Mode of the running session, if any.
    pub mode: Option<SessionMode>,

    /// Most recent error message, cleared when a new session starts.
    pub last_error: Option<String>,

    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loading_and_playing_are_busy() {
        assert!(!SessionState::Idle.is_busy());
        assert!(SessionState::Loading.is_busy());
        assert!(SessionState::Playing.is_busy());
        assert!(
            !SessionState::Failed {
                message: "x".into()
            }
            .is_busy()
        );
    }

    #[test]
    fn mode_follows_flag() {
        assert_eq!(SessionMode::from_streaming_flag(true), SessionMode::Streaming);
        assert_eq!(SessionMode::from_streaming_flag(false), SessionMode::Batch);
    }
}
