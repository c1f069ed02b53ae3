//! Voice recording on top of an audio capture session.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use chatter_core::types::MediaBlob;

use crate::device::PipelineEvent;
use crate::error::CaptureError;
use crate::session::CaptureSession;

/// Encoded audio chunks in the order they arrived.
#[derive(Debug, Clone, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks carry nothing and are skipped.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate all chunks, in arrival order, into one blob.
    pub fn into_blob(self, mime_type: impl Into<String>) -> MediaBlob {
        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks {
            data.extend_from_slice(&chunk);
        }
        MediaBlob::new(mime_type, data)
    }
}

/// An in-progress recording.
///
/// Produced by [`CaptureSession::start_recording`]. Call [`stop`](Self::stop)
/// to get the recorded blob; dropping the handle instead discards the
/// recording and closes the session.
#[derive(Debug)]
pub struct RecordingHandle {
    session: CaptureSession,
    pipeline: UnboundedReceiver<PipelineEvent>,
    mime_type: String,
    started_at: DateTime<Utc>,
}

impl RecordingHandle {
    pub(crate) fn new(
        session: CaptureSession,
        pipeline: UnboundedReceiver<PipelineEvent>,
        mime_type: String,
    ) -> Self {
        Self {
            session,
            pipeline,
            mime_type,
            started_at: Utc::now(),
        }
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop recording and assemble the audio blob.
    ///
    /// Moves the session through `Finalizing`: tracks are stopped, then every
    /// chunk the pipeline delivered before its `Ended` marker is collected in
    /// arrival order. The session is `Stopped` when this returns.
    pub async fn stop(mut self) -> Result<MediaBlob, CaptureError> {
        let released = self.session.begin_finalizing()?;
        tracing::debug!(session_id = %self.session.id(), released, "Recording finalizing");

        let mut buffer = ChunkBuffer::new();
        while let Some(event) = self.pipeline.recv().await {
            match event {
                PipelineEvent::Data(chunk) => buffer.push(chunk),
                PipelineEvent::Ended => break,
            }
        }
        self.session.finish();

        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
        tracing::info!(
            session_id = %self.session.id(),
            chunks = buffer.chunk_count(),
            bytes = buffer.total_bytes(),
            elapsed_ms,
            "Recording stopped"
        );
        Ok(buffer.into_blob(self.mime_type.clone()))
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        self.session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::device::MediaKind;
    use crate::mock::MockDeviceProvider;
    use crate::state::CaptureState;

    #[test]
    fn test_chunk_buffer_skips_empty_chunks() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(vec![1, 2]);
        buffer.push(Vec::new());
        buffer.push(vec![3]);
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.total_bytes(), 3);
        assert_eq!(buffer.into_blob("audio/wav").data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stop_concatenates_chunks_in_arrival_order() {
        let provider = MockDeviceProvider::new();
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let handle = session.start_recording("audio/wav").unwrap();

        let feeder = provider.clone();
        let feeding = tokio::spawn(async move {
            for chunk in [b"c1".to_vec(), b"c2".to_vec(), b"c3".to_vec()] {
                assert!(feeder.push_chunk(chunk));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
        feeding.await.unwrap();

        let blob = handle.stop().await.unwrap();
        assert_eq!(blob.data, b"c1c2c3".to_vec());
        assert_eq!(blob.mime_type, "audio/wav");
        assert_eq!(session.state(), CaptureState::Stopped);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_chunks_available_before_recording_are_kept() {
        let provider = MockDeviceProvider::new().with_chunks(vec![vec![1], vec![], vec![2, 3]]);
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let handle = session.start_recording("audio/webm").unwrap();
        provider.push_chunk(vec![4]);

        let blob = handle.stop().await.unwrap();
        assert_eq!(blob.data, vec![1, 2, 3, 4]);
        assert_eq!(blob.mime_type, "audio/webm");
    }

    #[tokio::test]
    async fn test_chunks_after_stop_are_ignored() {
        let provider = MockDeviceProvider::new();
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let handle = session.start_recording("audio/wav").unwrap();
        provider.push_chunk(vec![7]);

        let blob = handle.stop().await.unwrap();
        assert!(!provider.push_chunk(vec![8]));
        assert_eq!(blob.data, vec![7]);
    }

    #[tokio::test]
    async fn test_empty_recording_yields_empty_blob() {
        let provider = MockDeviceProvider::new();
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let blob = session.start_recording("audio/wav").unwrap().stop().await.unwrap();
        assert!(blob.is_empty());
        assert_eq!(session.state(), CaptureState::Stopped);
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_session() {
        let provider = MockDeviceProvider::new();
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let handle = session.start_recording("audio/wav").unwrap();
        assert_eq!(provider.live_tracks(), 1);

        drop(handle);
        assert_eq!(session.state(), CaptureState::Stopped);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_stop_after_close_fails() {
        let provider = MockDeviceProvider::new();
        let session = CaptureSession::open(&provider, MediaKind::Audio)
            .await
            .unwrap();
        let handle = session.start_recording("audio/wav").unwrap();
        session.close();

        let err = handle.stop().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidState {
                from: CaptureState::Stopped,
                to: CaptureState::Finalizing
            }
        ));
        assert_eq!(provider.live_tracks(), 0);
    }
}
