//! Local (rodio) adapter for the [`AudioSink`] trait.
//!
//! [`LocalAudioSink`] is a thin wrapper around [`AudioThreadHandle`]. Every
//! handle method takes `&self` and state changes happen on the audio thread,
//! so no extra locking is needed here.

use crate::audio_io::{AudioSink, PlaybackDoneCallback};
use crate::audio_thread::AudioThreadHandle;
use crate::error::SessionError;

/// Plays audio on the system's default output device.
pub struct LocalAudioSink {
    handle: AudioThreadHandle,
}

impl LocalAudioSink {
    /// Spawn the audio thread and open the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Playback`] if no output device can be opened.
    pub fn open() -> Result<Self, SessionError> {
        Ok(Self {
            handle: AudioThreadHandle::spawn()?,
        })
    }
}

impl AudioSink for LocalAudioSink {
    fn start_streaming(&self) -> Result<(), SessionError> {
        self.handle.start_streaming()
    }

    fn append(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), SessionError> {
        self.handle.append(samples, sample_rate, channels)
    }

    fn stop(&self) {
        self.handle.stop();
    }

    fn set_volume(&self, volume: f32) {
        self.handle.set_volume(volume);
    }

    fn on_playback_complete(&self, callback: PlaybackDoneCallback) {
        self.handle.spawn_completion_watcher(callback);
    }
}
