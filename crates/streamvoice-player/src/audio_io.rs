//! `AudioSink` trait abstraction for playback output.
//!
//! Decouples the [`PlaybackController`](crate::controller::PlaybackController)
//! from any specific audio backend:
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`LocalAudioSink`](crate::audio_local::LocalAudioSink) | Desktop: rodio playback on the default output device |
//! | test sinks | Integration tests: record calls, no hardware |
//!
//! The trait is **object-safe** (`Arc<dyn AudioSink>`). All methods take
//! `&self`; implementations use interior mutability (channels, atomics).

use crate::error::SessionError;

/// Callback invoked once when all queued audio has drained.
pub type PlaybackDoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction over an audio output device.
pub trait AudioSink: Send + Sync {
    /// Acquire the output device and prepare an empty playback queue.
    ///
    /// Any previous queue is stopped first.
    fn start_streaming(&self) -> Result<(), SessionError>;

    /// Append interleaved samples to the playback queue.
    fn append(&self, samples: Vec<f32>, sample_rate: u32, channels: u16)
    -> Result<(), SessionError>;

    /// Stop playback immediately and release the queue. Idempotent.
    fn stop(&self);

    /// Set output volume (0.0 = muted, 1.0 = full).
    fn set_volume(&self, volume: f32);

    /// Register a one-shot callback that fires when the queue drains
    /// naturally.
    ///
    /// If playback is stopped first, the callback is dropped without being
    /// called.
    fn on_playback_complete(&self, callback: PlaybackDoneCallback);
}
