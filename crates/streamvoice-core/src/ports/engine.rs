//! Synthesis engine port: the boundary to the GPT-SoVITS backend.
//!
//! # Design Rules
//!
//! - Only validated [`EngineRequest`]s cross this boundary.
//! - Audio crosses as decoded PCM; wire format and codecs belong to the
//!   implementation.
//! - Streams are lazy and end with an explicit [`StreamEvent::Finished`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::domain::{AudioData, EngineRequest, StreamEvent};

/// Lazy, finite, non-restartable sequence of streaming synthesis output.
pub type ChunkStream = BoxStream<'static, Result<StreamEvent, EngineError>>;

/// Errors reported by a synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine could not use the reference audio (missing, unreadable,
    /// wrong length).
    #[error("{0}")]
    InvalidReference(String),

    /// The engine rejected the parameter combination or input text.
    #[error("{0}")]
    InvalidParams(String),

    /// Network or IPC failure talking to the engine.
    #[error("Engine unreachable: {0}")]
    Transport(String),

    /// The engine did not answer in time.
    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    /// Inference failed inside the engine.
    #[error("Engine failure: {0}")]
    Backend(String),

    /// The engine broke the streaming contract.
    #[error("Engine protocol error: {0}")]
    Protocol(String),
}

/// A text-to-speech engine conditioned on a reference voice.
///
/// Implementations must be `Send + Sync` so the player can share them
/// across session tasks.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize the whole request into one buffer.
    async fn synthesize(&self, request: &EngineRequest) -> Result<AudioData, EngineError>;

    /// Start a streaming synthesis.
    ///
    /// Errors for individual chunks surface as `Err` items at the point of
    /// failure.
    async fn synthesize_stream(&self, request: &EngineRequest)
    -> Result<ChunkStream, EngineError>;

    /// Purge engine-side cached intermediate state (reference embeddings,
    /// prompt semantics).
    async fn clear_cache(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_surfaced_verbatim() {
        let err = EngineError::InvalidReference("参考音频在3~10秒范围外".into());
        assert_eq!(err.to_string(), "参考音频在3~10秒范围外");

        let err = EngineError::InvalidParams("text is empty".into());
        assert_eq!(err.to_string(), "text is empty");
    }

    #[test]
    fn timeout_message_names_duration() {
        let err = EngineError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "Engine timed out after 3s");
    }
}
