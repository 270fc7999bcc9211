//! Synthesis client: timeouts, stream contract checks and logging around a
//! [`SynthesisEngine`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use streamvoice_core::{
    AudioData, ChunkStream, EngineError, EngineRequest, SessionSettings, StreamEvent,
    SynthesisEngine,
};

use crate::error::SessionError;

/// Front door to the synthesis engine used by the session coordinator.
#[derive(Clone)]
pub struct SynthesisClient {
    engine: Arc<dyn SynthesisEngine>,
    request_timeout: Duration,
    chunk_timeout: Duration,
}

impl SynthesisClient {
    pub fn new(engine: Arc<dyn SynthesisEngine>, settings: &SessionSettings) -> Self {
        Self {
            engine,
            request_timeout: settings.request_timeout(),
            chunk_timeout: settings.chunk_timeout(),
        }
    }

    /// Synthesize the whole request into one buffer.
    pub async fn synthesize(&self, request: &EngineRequest) -> Result<AudioData, SessionError> {
        tracing::info!(
            text_chars = request.text.chars().count(),
            reference = %request.reference.file_name(),
            "Requesting batch synthesis"
        );
        let started = Instant::now();

        let audio = tokio::time::timeout(self.request_timeout, self.engine.synthesize(request))
            .await
            .map_err(|_| EngineError::Timeout(self.request_timeout))??;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis(),
            audio_ms = audio.duration().as_millis(),
            "Batch synthesis complete"
        );
        Ok(audio)
    }

    /// Open a streaming synthesis.
    ///
    /// The returned stream enforces the chunk timeout, ends right after the
    /// engine's `Finished` marker, and turns a stream that stops without
    /// one into [`EngineError::Protocol`]. It yields nothing after an error.
    pub async fn synthesize_stream(
        &self,
        request: &EngineRequest,
    ) -> Result<ChunkStream, SessionError> {
        tracing::info!(
            text_chars = request.text.chars().count(),
            reference = %request.reference.file_name(),
            "Requesting streaming synthesis"
        );

        let inner = tokio::time::timeout(
            self.request_timeout,
            self.engine.synthesize_stream(request),
        )
        .await
        .map_err(|_| EngineError::Timeout(self.request_timeout))??;

        Ok(guard_stream(inner, self.chunk_timeout))
    }

    /// Purge engine-side caches. Failures are logged and swallowed.
    pub async fn clear_cache(&self) {
        match tokio::time::timeout(self.request_timeout, self.engine.clear_cache()).await {
            Ok(Ok(())) => tracing::info!("Engine cache cleared"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to clear engine cache"),
            Err(_) => tracing::warn!(
                timeout_ms = self.request_timeout.as_millis(),
                "Timed out clearing engine cache"
            ),
        }
    }
}

struct GuardState {
    inner: ChunkStream,
    chunk_timeout: Duration,
    done: bool,
}

fn guard_stream(inner: ChunkStream, chunk_timeout: Duration) -> ChunkStream {
    let state = GuardState {
        inner,
        chunk_timeout,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        let item = match tokio::time::timeout(st.chunk_timeout, st.inner.next()).await {
            Err(_) => Err(EngineError::Timeout(st.chunk_timeout)),
            Ok(None) => Err(EngineError::Protocol(
                "stream ended without completion marker".to_string(),
            )),
            Ok(Some(item)) => item,
        };

        st.done = !matches!(item, Ok(StreamEvent::Chunk(_)));
        Some((item, st))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use streamvoice_core::AudioChunk;

    use super::*;

    fn chunk(index: u64) -> Result<StreamEvent, EngineError> {
        Ok(StreamEvent::Chunk(AudioChunk::new(
            index,
            AudioData::mono(vec![0.1; 8], 32_000),
        )))
    }

    #[tokio::test]
    async fn guard_stops_after_finished() {
        let inner = stream::iter(vec![chunk(0), Ok(StreamEvent::Finished), chunk(1)]).boxed();
        let items: Vec<_> = guard_stream(inner, Duration::from_secs(1)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Ok(StreamEvent::Finished));
    }

    #[tokio::test]
    async fn guard_flags_missing_completion_marker() {
        let inner = stream::iter(vec![chunk(0)]).boxed();
        let items: Vec<_> = guard_stream(inner, Duration::from_secs(1)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(EngineError::Protocol(_))));
    }

    #[tokio::test]
    async fn guard_times_out_stalled_stream() {
        let inner = stream::pending().boxed();
        let items: Vec<_> = guard_stream(inner, Duration::from_millis(10)).collect().await;
        assert_eq!(items, vec![Err(EngineError::Timeout(Duration::from_millis(10)))]);
    }

    #[tokio::test]
    async fn guard_ends_after_error() {
        let inner = stream::iter(vec![
            chunk(0),
            Err(EngineError::Backend("oom".into())),
            chunk(1),
        ])
        .boxed();
        let items: Vec<_> = guard_stream(inner, Duration::from_secs(1)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
