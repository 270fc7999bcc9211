//! Domain types shared by the engine port and the player.

pub mod audio;
pub mod params;
pub mod request;
pub mod state;

pub use audio::{AudioChunk, AudioData, StreamEvent};
pub use params::{ParamRange, ParamRanges, SynthesisParams, TextSplitMethod};
pub use request::{
    DEFAULT_INPUT_TEXT, EngineRequest, PreconditionError, ReferenceAudio, SessionRequest,
};
pub use state::{SessionMode, SessionState, SessionStatus};
