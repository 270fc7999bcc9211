//! Audio output via `rodio`.
//!
//! [`AudioPlayback`] owns the rodio output stream and at most one [`Sink`].
//! It is `!Send` on some platforms and therefore lives on the audio thread
//! (see [`crate::audio_thread`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::audio_io::PlaybackDoneCallback;
use crate::error::SessionError;

/// Playback handle for synthesized speech.
pub struct AudioPlayback {
    /// rodio output stream (must be kept alive).
    _stream: OutputStream,

    /// Handle used to create sinks.
    stream_handle: OutputStreamHandle,

    /// Current playback sink (if any).
    sink: Option<Arc<Sink>>,

    /// Whether a playback queue is live. Cleared by `stop` so the
    /// completion watcher can tell a stop from a natural drain.
    is_playing: Arc<AtomicBool>,

    /// Volume applied to every new sink.
    volume: f32,
}

impl AudioPlayback {
    /// Open the default output device.
    pub fn new() -> Result<Self, SessionError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| SessionError::Playback(e.to_string()))?;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            is_playing: Arc::new(AtomicBool::new(false)),
            volume: 1.0,
        })
    }

    /// Create a fresh sink for queued playback, stopping any previous one.
    pub fn start_streaming(&mut self) -> Result<(), SessionError> {
        self.stop();

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| SessionError::Playback(e.to_string()))?;
        sink.set_volume(self.volume);
        self.sink = Some(Arc::new(sink));
        self.is_playing = Arc::new(AtomicBool::new(true));

        tracing::debug!("Playback sink created");
        Ok(())
    }

    /// Queue interleaved samples onto the current sink.
    pub fn append(
        &mut self,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), SessionError> {
        let Some(sink) = self.sink.as_ref() else {
            return Err(SessionError::Playback(
                "no active playback sink".to_string(),
            ));
        };

        let source = rodio::buffer::SamplesBuffer::new(channels.max(1), sample_rate, samples);
        sink.append(source);
        Ok(())
    }

    /// Spawn a thread that blocks until the sink drains or is stopped. On
    /// natural completion `on_done` is invoked; after a stop it is dropped.
    pub fn spawn_completion_watcher(&self, on_done: PlaybackDoneCallback) {
        let Some(sink) = self.sink.clone() else {
            // Nothing queued: stopped already, so the callback is dropped.
            return;
        };
        let is_playing = Arc::clone(&self.is_playing);

        // `Sink` is Send in rodio 0.20+. `sleep_until_end()` returns when the
        // queue drains or when `stop()` drops the queued sources.
        std::thread::spawn(move || {
            sink.sleep_until_end();

            if !is_playing.swap(false, Ordering::SeqCst) {
                return;
            }

            tracing::debug!("Playback finished naturally");
            on_done();
        });
    }

    /// Stop any active playback immediately.
    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::debug!("Audio playback stopped");
        }
        self.is_playing.store(false, Ordering::SeqCst);
    }

    /// Set playback volume (0.0 = muted, 1.0 = full).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }
}
