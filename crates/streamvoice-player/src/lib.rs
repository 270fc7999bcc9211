//! Session coordination and audio playback for GPT-SoVITS synthesis.
//!
//! ```text
//!  UI intents ──► SessionCoordinator ──► SynthesisClient ──► SynthesisEngine
//!                        │                                        │
//!                        ▼                                        ▼
//!                 PlaybackController ◄── ChunkReorderBuffer ◄── chunks
//!                        │
//!                        ▼
//!                    AudioSink (rodio on a dedicated thread)
//! ```
//!
//! The coordinator owns the `Idle → Loading → Playing → Idle` state machine
//! and reports progress as [`SessionEvent`]s on an unbounded channel.

#![deny(unused_crate_dependencies)]

pub mod audio_io;
pub mod audio_local;
mod audio_thread;
pub mod client;
pub mod controller;
pub mod coordinator;
pub mod error;
mod playback;
pub mod reorder;

// Dev-dependencies used only by the integration tests.
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;

pub use audio_io::{AudioSink, PlaybackDoneCallback};
pub use audio_local::LocalAudioSink;
pub use client::SynthesisClient;
pub use controller::{PlaybackController, PlaybackOutcome, PlaybackProgress};
pub use coordinator::{SessionCoordinator, SessionEvent, ToggleOutcome};
pub use error::SessionError;
pub use reorder::{ChunkReorderBuffer, PushOutcome, ReorderError};
