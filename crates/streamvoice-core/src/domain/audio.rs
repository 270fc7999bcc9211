//! Audio payloads produced by the synthesis engine.

use std::time::Duration;

/// Decoded PCM audio (interleaved `f32` samples).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Interleaved samples, `channels` values per frame.
    pub samples: Vec<f32>,

    /// Sample rate in Hz (GPT-SoVITS emits 32 kHz).
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,
}

impl AudioData {
    /// Mono audio at `sample_rate`.
    pub const fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length of the buffer.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// One ordered unit of streamed audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Zero-based position in the stream.
    pub index: u64,

    pub audio: AudioData,
}

impl AudioChunk {
    pub const fn new(index: u64, audio: AudioData) -> Self {
        Self { index, audio }
    }
}

/// Element of a streaming synthesis response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of audio. Chunks may arrive out of index order.
    Chunk(AudioChunk),

    /// Explicit end of stream: no further chunks follow.
    Finished,
}
