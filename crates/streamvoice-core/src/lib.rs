//! Core domain types and port definitions for StreamVoice.
//!
//! This crate holds everything the player and engine adapters agree on:
//! synthesis parameters with their clamped ranges, session requests, the
//! session state machine labels, audio payloads, the [`SynthesisEngine`]
//! port, and player settings. It has no audio or runtime dependencies.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AudioChunk, AudioData, DEFAULT_INPUT_TEXT, EngineRequest, ParamRange, ParamRanges,
    PreconditionError, ReferenceAudio, SessionMode, SessionRequest, SessionState, SessionStatus,
    StreamEvent, SynthesisParams, TextSplitMethod,
};
pub use ports::{ChunkStream, EngineError, SynthesisEngine};
pub use settings::{SessionSettings, SessionSettingsUpdate, SettingsError, validate_settings};
