//! Session coordinator: the synthesize-and-play state machine.
//!
//! ```text
//!   Idle → Loading → Playing → Idle
//!            │          │
//!            └──────────┴──→ Failed → Idle
//! ```
//!
//! One session at a time. A start intent while a session is Loading or
//! Playing first stops it completely (cancel the engine call, release the
//! device, join the task). Session work runs on a spawned tokio task; every
//! suspension point races the session's [`CancellationToken`].
//!
//! # Locking discipline
//!
//! `session` is an async mutex held across the whole of `start`, `stop` and
//! `toggle`, so a late start can never interleave with a stop. `draft` and
//! the error slot use std locks and are never held across an `.await`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use streamvoice_core::{
    EngineRequest, SessionMode, SessionRequest, SessionSettings, SessionState, SessionStatus,
    SynthesisEngine, SynthesisParams, validate_settings,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio_io::AudioSink;
use crate::audio_local::LocalAudioSink;
use crate::client::SynthesisClient;
use crate::controller::{PlaybackController, PlaybackOutcome, PlaybackProgress};
use crate::error::SessionError;

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session state changed.
    StateChanged(SessionState),

    /// Audio output began (first buffer or first contiguous chunk).
    PlaybackStarted { mode: SessionMode },

    /// A streamed chunk was handed to the device.
    ChunkQueued { index: u64 },

    /// Playback ended, naturally or by stop.
    PlaybackFinished,

    /// A session failed. Carries the user-facing message.
    Error(String),

    /// The engine cache clear was attempted.
    CacheCleared,
}

/// What a toggle intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
}

// ── Shared state ───────────────────────────────────────────────────

/// State observed by both the coordinator and the running session task.
struct Shared {
    state_tx: watch::Sender<SessionState>,
    last_error: Mutex<Option<String>>,
    mode: Mutex<Option<SessionMode>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Transition to a new state and emit a state-change event.
    fn set_state(&self, new_state: SessionState) {
        let mut old = None;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            old = Some(std::mem::replace(state, new_state.clone()));
            true
        });

        if changed {
            tracing::debug!(old = ?old, new = %new_state, "Session state transition");
            self.emit(SessionEvent::StateChanged(new_state));
        }
    }

    fn begin(&self, mode: SessionMode) {
        *lock(&self.mode) = Some(mode);
        self.set_state(SessionState::Loading);
    }

    fn on_progress(&self, mode: SessionMode, progress: PlaybackProgress) {
        match progress {
            PlaybackProgress::Started => {
                self.set_state(SessionState::Playing);
                self.emit(SessionEvent::PlaybackStarted { mode });
            }
            PlaybackProgress::ChunkQueued { index } => {
                self.emit(SessionEvent::ChunkQueued { index });
            }
        }
    }

    /// Return to Idle after a completed or stopped session.
    fn end(&self) {
        if self.state() == SessionState::Playing {
            self.emit(SessionEvent::PlaybackFinished);
        }
        *lock(&self.mode) = None;
        self.set_state(SessionState::Idle);
    }

    /// Record `err` as the last error and pass through Failed to Idle.
    fn fail(&self, err: &SessionError) {
        let message = err.to_string();
        tracing::warn!(error = %message, "Session failed");

        *lock(&self.last_error) = Some(message.clone());
        *lock(&self.mode) = None;
        self.set_state(SessionState::Failed {
            message: message.clone(),
        });
        self.emit(SessionEvent::Error(message));
        self.set_state(SessionState::Idle);
    }

    fn clear_error(&self) {
        lock(&self.last_error).take();
    }

    /// Emit an event (best-effort: if the receiver is dropped, log and move on).
    fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Session event receiver dropped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Session task ───────────────────────────────────────────────────

/// Handle to the running (or finished) session task.
struct SessionRecord {
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything one session task needs, moved onto the task.
struct SessionTask {
    id: u64,
    mode: SessionMode,
    client: SynthesisClient,
    playback: Arc<PlaybackController>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl SessionTask {
    async fn run(self, request: EngineRequest) {
        let result = match self.mode {
            SessionMode::Batch => self.run_batch(&request).await,
            SessionMode::Streaming => self.run_streaming(&request).await,
        };

        // After a stop, the coordinator owns the transition back to Idle.
        if self.cancel.is_cancelled() {
            tracing::debug!(session_id = self.id, "Session task cancelled");
            return;
        }

        match result {
            Ok(outcome) => {
                tracing::info!(session_id = self.id, ?outcome, "Session finished");
                self.shared.end();
            }
            Err(e) => {
                self.playback.stop();
                self.shared.fail(&e);
            }
        }
    }

    async fn run_batch(&self, request: &EngineRequest) -> Result<PlaybackOutcome, SessionError> {
        let audio = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            audio = self.client.synthesize(request) => audio?,
        };

        tracing::debug!(
            session_id = self.id,
            samples = audio.samples.len(),
            "Playing synthesized buffer"
        );
        let shared = Arc::clone(&self.shared);
        let mode = self.mode;
        self.playback
            .play(audio, &self.cancel, move |p| shared.on_progress(mode, p))
            .await
    }

    async fn run_streaming(
        &self,
        request: &EngineRequest,
    ) -> Result<PlaybackOutcome, SessionError> {
        let chunks = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            chunks = self.client.synthesize_stream(request) => chunks?,
        };

        let shared = Arc::clone(&self.shared);
        let mode = self.mode;
        self.playback
            .play_stream(chunks, &self.cancel, move |p| shared.on_progress(mode, p))
            .await
    }
}

// ── Coordinator ────────────────────────────────────────────────────

/// Owns the session state machine and the lifetime of every session task.
pub struct SessionCoordinator {
    client: SynthesisClient,
    playback: Arc<PlaybackController>,
    shared: Arc<Shared>,
    session: tokio::sync::Mutex<Option<SessionRecord>>,
    draft: Mutex<SessionRequest>,
    next_session_id: AtomicU64,
    stop_join_timeout: Duration,
}

impl SessionCoordinator {
    /// Create a coordinator over `engine` and `sink`.
    ///
    /// Returns the coordinator and a receiver for [`SessionEvent`]s.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSettings`] if `settings` fail
    /// [`validate_settings`].
    pub fn new(
        engine: Arc<dyn SynthesisEngine>,
        sink: Arc<dyn AudioSink>,
        settings: &SessionSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        validate_settings(settings)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Idle);

        let playback = PlaybackController::new(sink, settings.effective_max_pending_chunks());
        playback.set_volume(settings.effective_volume());

        let coordinator = Self {
            client: SynthesisClient::new(engine, settings),
            playback: Arc::new(playback),
            shared: Arc::new(Shared {
                state_tx,
                last_error: Mutex::new(None),
                mode: Mutex::new(None),
                event_tx,
            }),
            session: tokio::sync::Mutex::new(None),
            draft: Mutex::new(SessionRequest::default()),
            next_session_id: AtomicU64::new(1),
            stop_join_timeout: settings.stop_join_timeout(),
        };

        Ok((coordinator, event_rx))
    }

    /// Create a coordinator that plays through the default output device.
    pub fn with_local_output(
        engine: Arc<dyn SynthesisEngine>,
        settings: &SessionSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        validate_settings(settings)?;
        let sink = LocalAudioSink::open()?;
        Self::new(engine, Arc::new(sink), settings)
    }

    // ── Observation ────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether a session is Loading or Playing.
    pub fn is_active(&self) -> bool {
        self.state().is_busy()
    }

    /// Most recent error message, cleared when a new session starts.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Snapshot for rendering.
    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        SessionStatus {
            is_active: state.is_busy(),
            state,
            mode: *lock(&self.shared.mode),
            last_error: self.last_error(),
        }
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until no session is running.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe_state();
        let _ = rx.wait_for(|state| *state == SessionState::Idle).await;
    }

    // ── Intents ────────────────────────────────────────────────────

    /// Start a session, stopping any running one first.
    ///
    /// Precondition failures are returned *and* recorded as the last error.
    /// Engine and playback failures happen later, on the session task, and
    /// are reported through the state machine and events.
    pub async fn start(&self, request: SessionRequest) -> Result<(), SessionError> {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await;
        self.start_locked(&mut session, request)
    }

    /// Stop the running session, if any. A no-op when idle.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await;
    }

    /// The play/stop button: stop if a session is running, otherwise start.
    pub async fn toggle(&self, request: SessionRequest) -> Result<ToggleOutcome, SessionError> {
        let mut session = self.session.lock().await;
        if self.is_active() {
            self.stop_locked(&mut session).await;
            return Ok(ToggleOutcome::Stopped);
        }
        self.stop_locked(&mut session).await;
        self.start_locked(&mut session, request)?;
        Ok(ToggleOutcome::Started)
    }

    /// [`toggle`](Self::toggle) with a snapshot of the current draft.
    pub async fn toggle_draft(&self) -> Result<ToggleOutcome, SessionError> {
        let request = self.draft();
        self.toggle(request).await
    }

    /// Purge engine-side caches. Never fails and never changes the session.
    pub async fn clear_cache(&self) {
        self.client.clear_cache().await;
        self.shared.emit(SessionEvent::CacheCleared);
    }

    /// Set output volume (0.0–1.0). Allowed in any state.
    pub fn set_volume(&self, volume: f32) {
        self.playback.set_volume(volume);
    }

    // ── Draft (UI form) ────────────────────────────────────────────

    /// Current form contents.
    pub fn draft(&self) -> SessionRequest {
        lock(&self.draft).clone()
    }

    /// Whether the play button should be enabled for a new session.
    pub fn can_start(&self) -> bool {
        !self.is_active() && self.draft().validate().is_ok()
    }

    pub fn set_reference_audio(&self, path: Option<PathBuf>) -> Result<(), SessionError> {
        self.edit_draft(|draft| draft.reference_audio_path = path)
    }

    pub fn set_prompt_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.edit_draft(|draft| draft.prompt_text = text)
    }

    pub fn set_input_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.edit_draft(|draft| draft.input_text = text)
    }

    /// Change synthesis parameters through their clamping setters.
    pub fn update_params(
        &self,
        update: impl FnOnce(&mut SynthesisParams),
    ) -> Result<(), SessionError> {
        self.edit_draft(|draft| update(&mut draft.params))
    }

    fn edit_draft(&self, edit: impl FnOnce(&mut SessionRequest)) -> Result<(), SessionError> {
        if self.is_active() {
            return Err(SessionError::Busy);
        }
        edit(&mut *lock(&self.draft));
        Ok(())
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn start_locked(
        &self,
        session: &mut Option<SessionRecord>,
        request: SessionRequest,
    ) -> Result<(), SessionError> {
        self.shared.clear_error();

        let request = match request.validate() {
            Ok(request) => request,
            Err(e) => {
                let err = SessionError::from(e);
                self.shared.fail(&err);
                return Err(err);
            }
        };

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let mode = SessionMode::from_streaming_flag(request.streaming());
        let cancel = CancellationToken::new();

        tracing::info!(
            session_id = id,
            ?mode,
            reference = %request.reference.file_name(),
            "Starting session"
        );
        self.shared.begin(mode);

        let task = SessionTask {
            id,
            mode,
            client: self.client.clone(),
            playback: Arc::clone(&self.playback),
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(task.run(request));

        *session = Some(SessionRecord { id, cancel, task });
        Ok(())
    }

    async fn stop_locked(&self, session: &mut Option<SessionRecord>) {
        let Some(record) = session.take() else {
            return;
        };

        let was_running = !record.task.is_finished();
        record.cancel.cancel();
        self.playback.stop();

        match tokio::time::timeout(self.stop_join_timeout, record.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(session_id = record.id, error = %e, "Session task panicked");
            }
            Err(_) => {
                tracing::warn!(
                    session_id = record.id,
                    "Session task did not stop in time; abandoning it"
                );
            }
        }

        if was_running {
            tracing::info!(session_id = record.id, "Session stopped");
        }
        self.shared.end();
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(record) = self.session.get_mut().take() {
            record.cancel.cancel();
            record.task.abort();
        }
        self.playback.stop();
    }
}
