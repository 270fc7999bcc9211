//! Playback controller: sole owner of the audio output device.
//!
//! At most one playback is active. Starting a new one stops the current one
//! first. Every exit path (drain, error, stop) releases the device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use streamvoice_core::{AudioChunk, AudioData, ChunkStream, StreamEvent};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::audio_io::AudioSink;
use crate::error::SessionError;
use crate::reorder::{ChunkReorderBuffer, PushOutcome};

/// How a playback ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All queued audio drained.
    Completed,

    /// Stopped before the end.
    Stopped,
}

/// Progress notifications raised while a playback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackProgress {
    /// The device is acquired and the first audio is queued.
    Started,

    /// A streamed chunk was handed to the device.
    ChunkQueued { index: u64 },
}

struct ActivePlayback {
    id: u64,
    token: CancellationToken,
}

/// Drives the [`AudioSink`] for batch and streaming playback.
pub struct PlaybackController {
    sink: Arc<dyn AudioSink>,
    active: Mutex<Option<ActivePlayback>>,
    next_id: AtomicU64,
    max_pending_chunks: usize,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn AudioSink>, max_pending_chunks: usize) -> Self {
        Self {
            sink,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            max_pending_chunks,
        }
    }

    /// Whether a `play` or `play_stream` is in progress.
    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Play a complete buffer and wait for it to drain.
    ///
    /// Returns [`PlaybackOutcome::Stopped`] if `cancel` fires or
    /// [`stop`](Self::stop) is called first.
    pub async fn play(
        &self,
        audio: AudioData,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(PlaybackProgress) + Send,
    ) -> Result<PlaybackOutcome, SessionError> {
        let (id, token) = self.begin(cancel);
        let result = self.buffer_into_sink(audio, &token, &mut on_progress).await;
        self.finish(id);
        result
    }

    /// Play a chunk stream in index order, starting output as soon as the
    /// first contiguous chunk is available.
    pub async fn play_stream(
        &self,
        chunks: ChunkStream,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(PlaybackProgress) + Send,
    ) -> Result<PlaybackOutcome, SessionError> {
        let (id, token) = self.begin(cancel);
        let mut reorder = ChunkReorderBuffer::new(self.max_pending_chunks);

        let result = self
            .stream_into_sink(chunks, &token, &mut reorder, &mut on_progress)
            .await;

        let dropped = reorder.discard();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded buffered chunks");
        }
        self.finish(id);
        result
    }

    /// Stop the active playback, if any. Idempotent.
    pub fn stop(&self) {
        let Some(active) = self.lock_active().take() else {
            return;
        };
        active.token.cancel();
        self.sink.stop();
        tracing::debug!(playback_id = active.id, "Playback stopped");
    }

    /// Set output volume, clamped to 0.0–1.0.
    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }

    // ── Internal helpers ───────────────────────────────────────────

    async fn buffer_into_sink(
        &self,
        audio: AudioData,
        token: &CancellationToken,
        on_progress: &mut (impl FnMut(PlaybackProgress) + Send),
    ) -> Result<PlaybackOutcome, SessionError> {
        if token.is_cancelled() {
            return Ok(PlaybackOutcome::Stopped);
        }
        self.sink.start_streaming()?;
        self.sink
            .append(audio.samples, audio.sample_rate, audio.channels)?;
        on_progress(PlaybackProgress::Started);
        self.wait_for_drain(token).await
    }

    async fn stream_into_sink(
        &self,
        mut chunks: ChunkStream,
        token: &CancellationToken,
        reorder: &mut ChunkReorderBuffer,
        on_progress: &mut (impl FnMut(PlaybackProgress) + Send),
    ) -> Result<PlaybackOutcome, SessionError> {
        let mut started = false;

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return Ok(PlaybackOutcome::Stopped),
                next = chunks.next() => next,
            };

            let chunk = match next {
                Some(Ok(StreamEvent::Chunk(chunk))) => chunk,
                Some(Ok(StreamEvent::Finished)) => break,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(SessionError::Engine(
                        "stream ended without completion marker".to_string(),
                    ));
                }
            };

            let ready = match reorder
                .push(chunk)
                .map_err(|e| SessionError::Engine(e.to_string()))?
            {
                PushOutcome::Ready(ready) => ready,
                PushOutcome::Duplicate(index) => {
                    tracing::warn!(index, "Dropping duplicate audio chunk");
                    continue;
                }
            };

            for chunk in ready {
                if !started {
                    self.sink.start_streaming()?;
                }
                self.queue_chunk(chunk, on_progress)?;
                if !started {
                    started = true;
                    on_progress(PlaybackProgress::Started);
                }
            }
        }

        reorder
            .finish()
            .map_err(|e| SessionError::Engine(e.to_string()))?;

        if !started {
            return Err(SessionError::Engine(
                "engine produced no audio".to_string(),
            ));
        }

        self.wait_for_drain(token).await
    }

    fn queue_chunk(
        &self,
        chunk: AudioChunk,
        on_progress: &mut (impl FnMut(PlaybackProgress) + Send),
    ) -> Result<(), SessionError> {
        let index = chunk.index;
        tracing::trace!(index, samples = chunk.audio.samples.len(), "Queueing chunk");
        self.sink.append(
            chunk.audio.samples,
            chunk.audio.sample_rate,
            chunk.audio.channels,
        )?;
        on_progress(PlaybackProgress::ChunkQueued { index });
        Ok(())
    }

    async fn wait_for_drain(
        &self,
        token: &CancellationToken,
    ) -> Result<PlaybackOutcome, SessionError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.sink.on_playback_complete(Box::new(move || {
            let _ = done_tx.send(());
        }));

        tokio::select! {
            biased;
            () = token.cancelled() => Ok(PlaybackOutcome::Stopped),
            done = done_rx => Ok(match done {
                Ok(()) => PlaybackOutcome::Completed,
                // Callback dropped: the sink was stopped underneath us.
                Err(_) => PlaybackOutcome::Stopped,
            }),
        }
    }

    /// Register a new playback, stopping any current one first.
    fn begin(&self, parent: &CancellationToken) -> (u64, CancellationToken) {
        if self.is_active() {
            tracing::debug!("New playback requested while active: stopping current");
            self.stop();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = parent.child_token();
        *self.lock_active() = Some(ActivePlayback {
            id,
            token: token.clone(),
        });
        (id, token)
    }

    /// Release the device if playback `id` is still the active one.
    fn finish(&self, id: u64) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| a.id == id) {
            active.take();
            drop(active);
            self.sink.stop();
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActivePlayback>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
