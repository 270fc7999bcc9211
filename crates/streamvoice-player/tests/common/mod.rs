//! Shared fakes for the player integration tests.
//!
//! No audio hardware and no engine process: [`RecordingSink`] records every
//! device call and [`ScriptedEngine`] replays canned audio with optional
//! delays.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use streamvoice_core::{
    AudioChunk, AudioData, ChunkStream, EngineError, EngineRequest, SessionRequest,
    SessionState, StreamEvent, SynthesisEngine, SynthesisParams,
};
use streamvoice_player::{AudioSink, PlaybackDoneCallback, SessionError, SessionEvent};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Audio sink ─────────────────────────────────────────────────────

/// Whether the sink reports the queue drained as soon as it is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    Immediate,
    Manual,
}

#[derive(Default)]
struct SinkState {
    streaming: bool,
    acquisitions: usize,
    overlapping_acquisitions: usize,
    stops: usize,
    appended: Vec<Vec<f32>>,
    pending_callback: Option<PlaybackDoneCallback>,
    volume: Option<f32>,
    fail_start: Option<String>,
    fail_append: Option<String>,
}

/// An [`AudioSink`] that records calls instead of making sound.
pub struct RecordingSink {
    mode: DrainMode,
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new(mode: DrainMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            state: Mutex::new(SinkState::default()),
        })
    }

    /// Number of times the device was acquired.
    pub fn acquisitions(&self) -> usize {
        self.state.lock().unwrap().acquisitions
    }

    /// Acquisitions made while a previous one was still held.
    pub fn overlapping_acquisitions(&self) -> usize {
        self.state.lock().unwrap().overlapping_acquisitions
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    /// Whether the device is currently held.
    pub fn is_streaming(&self) -> bool {
        self.state.lock().unwrap().streaming
    }

    /// First sample of every appended buffer, in append order.
    pub fn markers(&self) -> Vec<f32> {
        self.state
            .lock()
            .unwrap()
            .appended
            .iter()
            .map(|b| b[0])
            .collect()
    }

    pub fn volume(&self) -> Option<f32> {
        self.state.lock().unwrap().volume
    }

    /// Make every device acquisition fail with `message`.
    pub fn fail_start_with(&self, message: &str) {
        self.state.lock().unwrap().fail_start = Some(message.to_string());
    }

    /// Make every write to the device fail with `message`.
    pub fn fail_append_with(&self, message: &str) {
        self.state.lock().unwrap().fail_append = Some(message.to_string());
    }

    /// Fire the pending completion callback, as if the queue drained.
    pub fn drain(&self) -> bool {
        let callback = self.state.lock().unwrap().pending_callback.take();
        callback.map(|cb| cb()).is_some()
    }
}

impl AudioSink for RecordingSink {
    fn start_streaming(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_start.clone() {
            return Err(SessionError::Playback(message));
        }
        if state.streaming {
            state.overlapping_acquisitions += 1;
        }
        state.streaming = true;
        state.acquisitions += 1;
        state.pending_callback = None;
        Ok(())
    }

    fn append(
        &self,
        samples: Vec<f32>,
        _sample_rate: u32,
        _channels: u16,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.streaming {
            return Err(SessionError::Playback("append without device".into()));
        }
        if let Some(message) = state.fail_append.clone() {
            return Err(SessionError::Playback(message));
        }
        state.appended.push(samples);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.streaming = false;
        state.stops += 1;
        // Dropping the callback tells the waiter the queue was stopped.
        state.pending_callback = None;
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().unwrap().volume = Some(volume);
    }

    fn on_playback_complete(&self, callback: PlaybackDoneCallback) {
        match self.mode {
            DrainMode::Immediate => callback(),
            DrainMode::Manual => self.state.lock().unwrap().pending_callback = Some(callback),
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// Audio whose samples all equal `marker`, so playback order is visible.
pub fn marked_audio(marker: f32) -> AudioData {
    AudioData::mono(vec![marker; 16], 32_000)
}

#[allow(clippy::cast_precision_loss)]
pub fn chunk(index: u64) -> Result<StreamEvent, EngineError> {
    Ok(StreamEvent::Chunk(AudioChunk::new(
        index,
        marked_audio(index as f32),
    )))
}

pub fn finished() -> Result<StreamEvent, EngineError> {
    Ok(StreamEvent::Finished)
}

/// Sets a flag if dropped before being disarmed.
struct DropFlag {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// A [`SynthesisEngine`] that replays canned results.
pub struct ScriptedEngine {
    batch: Result<AudioData, EngineError>,
    stream: Vec<Result<StreamEvent, EngineError>>,
    delay: Duration,
    chunk_delay: Duration,
    clear_result: Result<(), EngineError>,
    pub batch_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub cache_clears: AtomicUsize,
    abandoned: Arc<AtomicBool>,
    last_request: Mutex<Option<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            batch: Ok(marked_audio(0.5)),
            stream: vec![chunk(0), finished()],
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            clear_result: Ok(()),
            batch_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            cache_clears: AtomicUsize::new(0),
            abandoned: Arc::new(AtomicBool::new(false)),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_batch(mut self, result: Result<AudioData, EngineError>) -> Self {
        self.batch = result;
        self
    }

    pub fn with_stream(mut self, events: Vec<Result<StreamEvent, EngineError>>) -> Self {
        self.stream = events;
        self
    }

    /// Delay before the first response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay before each streamed item.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_clear_result(mut self, result: Result<(), EngineError>) -> Self {
        self.clear_result = result;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Whether an in-flight call was dropped before it answered.
    pub fn was_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<EngineRequest> {
        self.last_request.lock().unwrap().clone()
    }

    async fn respond_after_delay(&self, request: &EngineRequest) {
        *self.last_request.lock().unwrap() = Some(request.clone());
        let mut guard = DropFlag {
            flag: Arc::clone(&self.abandoned),
            armed: true,
        };
        tokio::time::sleep(self.delay).await;
        guard.armed = false;
    }
}

#[async_trait]
impl SynthesisEngine for ScriptedEngine {
    async fn synthesize(&self, request: &EngineRequest) -> Result<AudioData, EngineError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.respond_after_delay(request).await;
        self.batch.clone()
    }

    async fn synthesize_stream(
        &self,
        request: &EngineRequest,
    ) -> Result<ChunkStream, EngineError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.respond_after_delay(request).await;

        let delay = self.chunk_delay;
        Ok(stream::iter(self.stream.clone())
            .then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })
            .boxed())
    }

    async fn clear_cache(&self) -> Result<(), EngineError> {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
        self.clear_result.clone()
    }
}

// ── Requests and events ────────────────────────────────────────────

pub fn request(streaming: bool) -> SessionRequest {
    let mut params = SynthesisParams::default();
    params.set_streaming_mode(streaming);
    SessionRequest::new(
        "今天天气不错。",
        Some(PathBuf::from("/voices/reference.wav")),
        "参考音频的文本",
        params,
    )
}

/// Drain all pending events from the event receiver and return them.
pub fn drain_events(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

/// Collect only the states from `StateChanged` events.
pub fn states_from(events: &[SessionEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

/// State labels, which ignore the message carried by `Failed`.
pub fn labels_from(events: &[SessionEvent]) -> Vec<&'static str> {
    states_from(events).iter().map(SessionState::label).collect()
}

pub fn queued_indices(events: &[SessionEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::ChunkQueued { index } => Some(*index),
            _ => None,
        })
        .collect()
}
