//! Dedicated audio output thread: keeps `!Send` rodio resources off the
//! async runtime.
//!
//! `rodio::OutputStream` is `!Send` on some platforms (macOS CoreAudio).
//! Rather than `unsafe impl Send`, it is confined to one OS thread and every
//! operation is routed through an [`AudioCommand`].

use std::sync::mpsc;
use std::thread;

use crate::audio_io::PlaybackDoneCallback;
use crate::error::SessionError;
use crate::playback::AudioPlayback;

// ── Commands ───────────────────────────────────────────────────────

/// A command sent to the audio thread.
enum AudioCommand {
    /// Create a fresh playback sink.
    StartStreaming {
        reply: mpsc::Sender<Result<(), SessionError>>,
    },

    /// Append samples to the current sink.
    Append {
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        reply: mpsc::Sender<Result<(), SessionError>>,
    },

    /// Stop playback immediately (fire-and-forget).
    Stop,

    /// Set the output volume (fire-and-forget).
    SetVolume(f32),

    /// Fire `on_done` when the current sink drains.
    SpawnCompletionWatcher { on_done: PlaybackDoneCallback },

    /// Shut down the audio thread, releasing the device.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the audio output thread.
///
/// Request–reply methods block the caller until the audio thread responds;
/// each is a local channel round trip plus a non-blocking rodio call.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread, open the output device, and return the handle.
    ///
    /// Device errors are propagated back through a one-shot init channel.
    pub fn spawn() -> Result<Self, SessionError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), SessionError>>();

        let thread = thread::Builder::new()
            .name("streamvoice-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| SessionError::Playback(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| SessionError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    pub fn start_streaming(&self) -> Result<(), SessionError> {
        self.send_and_recv(|reply| AudioCommand::StartStreaming { reply })
    }

    pub fn append(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), SessionError> {
        self.send_and_recv(|reply| AudioCommand::Append {
            samples,
            sample_rate,
            channels,
            reply,
        })
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Stop);
    }

    pub fn set_volume(&self, volume: f32) {
        let _ = self.cmd_tx.send(AudioCommand::SetVolume(volume));
    }

    pub fn spawn_completion_watcher(&self, on_done: PlaybackDoneCallback) {
        let _ = self
            .cmd_tx
            .send(AudioCommand::SpawnCompletionWatcher { on_done });
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Send a command that expects a `Result<T, SessionError>` reply.
    /// Channel failures map to [`SessionError::AudioThreadDied`].
    fn send_and_recv<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<T, SessionError>>) -> AudioCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| SessionError::AudioThreadDied)?;
        rx.recv().map_err(|_| SessionError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// Body of the audio thread. Owns `AudioPlayback` for its whole lifetime.
    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), SessionError>>) {
        let mut playback = match AudioPlayback::new() {
            Ok(p) => p,
            Err(e) => {
                let _ = init_tx.send(Err(e));
                return;
            }
        };

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::StartStreaming { reply } => {
                    let _ = reply.send(playback.start_streaming());
                }

                AudioCommand::Append {
                    samples,
                    sample_rate,
                    channels,
                    reply,
                } => {
                    let _ = reply.send(playback.append(samples, sample_rate, channels));
                }

                AudioCommand::Stop => playback.stop(),

                AudioCommand::SetVolume(volume) => playback.set_volume(volume),

                AudioCommand::SpawnCompletionWatcher { on_done } => {
                    playback.spawn_completion_watcher(on_done);
                }

                AudioCommand::Shutdown => break,
            }
        }

        playback.stop();
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
