//! Index-ordered reassembly of streamed audio chunks.
//!
//! Chunks may arrive out of order at the transport layer. The buffer holds
//! early arrivals until every lower index has been released, so the device
//! is always fed in strictly increasing index order starting at 0.

use std::collections::BTreeMap;

use streamvoice_core::AudioChunk;

/// Why a chunk stream cannot be reassembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    /// Too many later chunks are waiting on a missing one.
    #[error("chunk {missing} never arrived ({pending} later chunks waiting)")]
    GapTooLarge { missing: u64, pending: usize },

    /// The stream finished while chunks were still waiting on a gap.
    #[error("stream finished without chunk {missing}")]
    MissingAtEnd { missing: u64 },
}

/// What happened to a pushed chunk.
#[derive(Debug, PartialEq)]
pub enum PushOutcome {
    /// Chunks now playable, in index order (possibly empty if the chunk is
    /// being held behind a gap).
    Ready(Vec<AudioChunk>),

    /// The index was already released or is already held.
    Duplicate(u64),
}

/// Reorders chunks by index before they reach the output device.
#[derive(Debug)]
pub struct ChunkReorderBuffer {
    next_index: u64,
    pending: BTreeMap<u64, AudioChunk>,
    max_pending: usize,
}

impl ChunkReorderBuffer {
    pub fn new(max_pending: usize) -> Self {
        Self {
            next_index: 0,
            pending: BTreeMap::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Index the device is waiting for.
    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Number of chunks held behind a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accept one chunk and release every chunk that is now contiguous.
    pub fn push(&mut self, chunk: AudioChunk) -> Result<PushOutcome, ReorderError> {
        let index = chunk.index;
        if index < self.next_index || self.pending.contains_key(&index) {
            return Ok(PushOutcome::Duplicate(index));
        }

        self.pending.insert(index, chunk);

        let mut ready = Vec::new();
        while let Some(chunk) = self.pending.remove(&self.next_index) {
            ready.push(chunk);
            self.next_index += 1;
        }

        if self.pending.len() > self.max_pending {
            return Err(ReorderError::GapTooLarge {
                missing: self.next_index,
                pending: self.pending.len(),
            });
        }

        Ok(PushOutcome::Ready(ready))
    }

    /// Confirm the stream ended with nothing stuck behind a gap.
    pub fn finish(&self) -> Result<(), ReorderError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ReorderError::MissingAtEnd {
                missing: self.next_index,
            })
        }
    }

    /// Drop everything held (used on cancellation).
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
