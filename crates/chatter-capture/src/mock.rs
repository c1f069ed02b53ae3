//! Simulated camera and microphone.
//!
//! [`MockDeviceProvider`] grants streams without hardware. It can deny access
//! per device kind, hold the permission prompt open until released, serve a
//! fixed camera frame, feed microphone chunks, and count live tracks so tests
//! can assert nothing leaked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::device::{
    DeviceProvider, DeviceStream, MediaKind, MediaTrack, PipelineEvent, Resolution, VideoFrame,
    VideoSource,
};
use crate::error::CaptureError;

/// Colour of the default simulated camera frame.
const DEFAULT_FRAME_RGB: [u8; 3] = [96, 96, 96];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Track that reports its liveness into a shared counter.
#[derive(Debug)]
pub struct MockTrack {
    id: Uuid,
    kind: MediaKind,
    live: AtomicBool,
    live_counter: Arc<AtomicUsize>,
    on_end: Mutex<Option<UnboundedSender<PipelineEvent>>>,
}

impl MockTrack {
    fn new(
        kind: MediaKind,
        live_counter: Arc<AtomicUsize>,
        on_end: Option<UnboundedSender<PipelineEvent>>,
    ) -> Self {
        live_counter.fetch_add(1, Ordering::SeqCst);
        Self {
            id: Uuid::new_v4(),
            kind,
            live: AtomicBool::new(true),
            live_counter,
            on_end: Mutex::new(on_end),
        }
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        self.live_counter.fetch_sub(1, Ordering::SeqCst);
        if let Some(tx) = lock(&self.on_end).take() {
            let _ = tx.send(PipelineEvent::Ended);
        }
        tracing::debug!(track_id = %self.id, kind = %self.kind, "Mock track stopped");
    }
}

/// Camera that always shows the same frame.
#[derive(Debug, Clone)]
pub struct StaticVideoSource {
    resolution: Resolution,
    frame: Option<VideoFrame>,
}

impl StaticVideoSource {
    pub fn new(resolution: Resolution, frame: Option<VideoFrame>) -> Self {
        Self { resolution, frame }
    }
}

impl VideoSource for StaticVideoSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.frame.clone()
    }
}

#[derive(Debug)]
struct MockState {
    denied: HashMap<MediaKind, String>,
    gate: Option<Arc<Notify>>,
    resolution: Resolution,
    frame: Option<VideoFrame>,
    scripted_chunks: Vec<Vec<u8>>,
    audio_feed: Option<UnboundedSender<PipelineEvent>>,
}

/// Device provider backed by simulated hardware.
///
/// Clones share state, so a test can keep one clone to feed chunks or
/// inspect track counts while another is handed to the code under test.
#[derive(Debug, Clone)]
pub struct MockDeviceProvider {
    state: Arc<Mutex<MockState>>,
    live_tracks: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl Default for MockDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceProvider {
    /// A 640x480 camera showing a grey frame and a silent microphone.
    pub fn new() -> Self {
        let resolution = Resolution::new(640, 480);
        Self {
            state: Arc::new(Mutex::new(MockState {
                denied: HashMap::new(),
                gate: None,
                resolution,
                frame: Some(VideoFrame::solid(
                    resolution.width,
                    resolution.height,
                    DEFAULT_FRAME_RGB,
                )),
                scripted_chunks: Vec::new(),
                audio_feed: None,
            })),
            live_tracks: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the camera's native resolution; the frame is regenerated to match.
    pub fn with_resolution(self, width: u32, height: u32) -> Self {
        {
            let mut state = lock(&self.state);
            state.resolution = Resolution::new(width, height);
            state.frame = Some(VideoFrame::solid(width, height, DEFAULT_FRAME_RGB));
        }
        self
    }

    /// Serve a specific frame (its size may differ from the resolution).
    pub fn with_frame(self, frame: VideoFrame) -> Self {
        lock(&self.state).frame = Some(frame);
        self
    }

    /// Camera grants access but has not produced a frame yet.
    pub fn without_frame(self) -> Self {
        lock(&self.state).frame = None;
        self
    }

    /// Chunks delivered as soon as a microphone stream opens.
    pub fn with_chunks(self, chunks: Vec<Vec<u8>>) -> Self {
        lock(&self.state).scripted_chunks = chunks;
        self
    }

    /// Refuse streams of `kind` with the given reason.
    pub fn deny(self, kind: MediaKind, reason: &str) -> Self {
        lock(&self.state).denied.insert(kind, reason.to_string());
        self
    }

    /// Keep every following request pending until the returned `Notify` is
    /// signalled once per request.
    pub fn hold_permission(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.state).gate = Some(Arc::clone(&gate));
        gate
    }

    /// Deliver an encoded chunk to the most recently opened microphone.
    ///
    /// Returns false when no recording can receive it any more.
    pub fn push_chunk(&self, chunk: Vec<u8>) -> bool {
        let state = lock(&self.state);
        match state.audio_feed.as_ref() {
            Some(tx) => tx.send(PipelineEvent::Data(chunk)).is_ok(),
            None => false,
        }
    }

    /// Tracks handed out and not yet stopped, across all streams.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    /// Number of stream requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn build_stream(&self, kind: MediaKind) -> Result<DeviceStream, CaptureError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.denied.get(&kind) {
            return Err(CaptureError::DeviceAccess {
                kind,
                reason: reason.clone(),
            });
        }

        let stream = match kind {
            MediaKind::Video => {
                let track: Arc<dyn MediaTrack> =
                    Arc::new(MockTrack::new(kind, Arc::clone(&self.live_tracks), None));
                let source = StaticVideoSource::new(state.resolution, state.frame.clone());
                DeviceStream::video(vec![track], Arc::new(source))
            }
            MediaKind::Audio => {
                let (tx, rx) = mpsc::unbounded_channel();
                for chunk in &state.scripted_chunks {
                    let _ = tx.send(PipelineEvent::Data(chunk.clone()));
                }
                state.audio_feed = Some(tx.clone());
                let track: Arc<dyn MediaTrack> =
                    Arc::new(MockTrack::new(kind, Arc::clone(&self.live_tracks), Some(tx)));
                DeviceStream::audio(vec![track], rx)
            }
        };
        Ok(stream)
    }
}

impl DeviceProvider for MockDeviceProvider {
    async fn request_stream(&self, kind: MediaKind) -> Result<DeviceStream, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.state).gate.clone();
        if let Some(gate) = gate {
            tracing::debug!(kind = %kind, "Mock permission prompt pending");
            gate.notified().await;
        }
        self.build_stream(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_video_stream_counts_tracks() {
        let provider = MockDeviceProvider::new();
        let stream = provider.request_stream(MediaKind::Video).await.unwrap();
        assert_eq!(stream.kind(), MediaKind::Video);
        assert_eq!(provider.live_tracks(), 1);
        assert_eq!(provider.requests(), 1);

        let source = stream.video_source().unwrap();
        assert_eq!(source.resolution(), Resolution::new(640, 480));
        assert!(source.current_frame().is_some());

        drop(stream);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_denied_kind_returns_device_access() {
        let provider = MockDeviceProvider::new().deny(MediaKind::Audio, "no microphone");
        let err = provider.request_stream(MediaKind::Audio).await.unwrap_err();
        match err {
            CaptureError::DeviceAccess { kind, reason } => {
                assert_eq!(kind, MediaKind::Audio);
                assert_eq!(reason, "no microphone");
            }
            other => panic!("Expected DeviceAccess, got {:?}", other),
        }
        assert_eq!(provider.live_tracks(), 0);

        // Other kinds are unaffected.
        assert!(provider.request_stream(MediaKind::Video).await.is_ok());
    }

    #[tokio::test]
    async fn test_stopping_audio_track_ends_pipeline() {
        let provider = MockDeviceProvider::new();
        let mut stream = provider.request_stream(MediaKind::Audio).await.unwrap();
        let mut pipeline = stream.take_pipeline().unwrap();

        assert!(provider.push_chunk(vec![1, 2]));
        stream.stop_all();

        assert_eq!(pipeline.recv().await, Some(PipelineEvent::Data(vec![1, 2])));
        assert_eq!(pipeline.recv().await, Some(PipelineEvent::Ended));
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_track_stop_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let track = MockTrack::new(MediaKind::Video, Arc::clone(&counter), None);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        track.stop();
        track.stop();
        assert!(!track.is_live());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_chunk_without_microphone() {
        let provider = MockDeviceProvider::new();
        assert!(!provider.push_chunk(vec![1]));
    }

    #[tokio::test]
    async fn test_hold_permission_blocks_until_notified() {
        let provider = MockDeviceProvider::new();
        let gate = provider.hold_permission();

        let pending = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.request_stream(MediaKind::Video).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        assert_eq!(provider.live_tracks(), 0);

        gate.notify_one();
        let stream = pending.await.unwrap().unwrap();
        assert_eq!(stream.live_tracks(), 1);
    }
}
