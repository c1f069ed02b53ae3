//! Capture session lifecycle.
//!
//! A [`CaptureSession`] owns at most one device stream and guarantees that
//! every track it acquired is stopped on every exit path: explicit close,
//! cancel while the permission prompt is pending, device errors, finishing a
//! recording, or the last handle being dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use chatter_core::types::MediaBlob;

use crate::device::{DeviceProvider, DeviceStream, MediaKind, Resolution};
use crate::error::CaptureError;
use crate::raster::{FrameEncoder, RasterBuffer};
use crate::recorder::RecordingHandle;
use crate::state::{CaptureState, StateMachine};

/// Handle to a camera or microphone capture session.
///
/// Clones share the same session, so one handle can `close` while another is
/// still awaiting [`CaptureSession::acquire`].
#[derive(Debug, Clone)]
pub struct CaptureSession {
    id: Uuid,
    kind: MediaKind,
    inner: Arc<Mutex<SessionInner>>,
}

#[derive(Debug)]
struct SessionInner {
    machine: StateMachine,
    stream: Option<DeviceStream>,
    opened_at: Option<DateTime<Utc>>,
}

impl SessionInner {
    /// Drop the stream, stopping its tracks. Returns tracks stopped.
    fn release(&mut self) -> usize {
        match self.stream.take() {
            Some(stream) => stream.stop_all(),
            None => 0,
        }
    }
}

impl CaptureSession {
    /// Create an `Idle` session that has not touched any device yet.
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            inner: Arc::new(Mutex::new(SessionInner {
                machine: StateMachine::new(),
                stream: None,
                opened_at: None,
            })),
        }
    }

    /// Create a session and acquire its device stream.
    pub async fn open<P: DeviceProvider>(
        provider: &P,
        kind: MediaKind,
    ) -> Result<Self, CaptureError> {
        let session = Self::new(kind);
        session.acquire(provider).await?;
        Ok(session)
    }

    /// Request the device stream: `Idle -> Requesting -> Active`.
    ///
    /// On denial or hardware failure the session ends `Stopped` and the
    /// provider's error is returned. If [`close`](Self::close) was called
    /// while the request was pending, the stream is released as soon as it
    /// arrives and [`CaptureError::Cancelled`] is returned.
    pub async fn acquire<P: DeviceProvider>(&self, provider: &P) -> Result<(), CaptureError> {
        self.lock().machine.transition(CaptureState::Requesting)?;
        tracing::info!(session_id = %self.id, kind = %self.kind, "Requesting device stream");

        let outcome = provider.request_stream(self.kind).await;

        let mut inner = self.lock();
        match outcome {
            Err(err) => {
                inner.machine.stop();
                tracing::warn!(session_id = %self.id, kind = %self.kind, error = %err, "Device stream request failed");
                Err(err)
            }
            Ok(stream) => {
                if inner.machine.current() != CaptureState::Requesting {
                    let released = stream.stop_all();
                    drop(stream);
                    tracing::info!(
                        session_id = %self.id,
                        released,
                        "Session closed while requesting, late stream released"
                    );
                    return Err(CaptureError::Cancelled);
                }
                inner.machine.transition(CaptureState::Active)?;
                tracing::info!(
                    session_id = %self.id,
                    stream_id = %stream.id(),
                    tracks = stream.tracks().len(),
                    "Capture session active"
                );
                inner.stream = Some(stream);
                inner.opened_at = Some(Utc::now());
                Ok(())
            }
        }
    }

    /// Stop every owned track and move to `Stopped`.
    ///
    /// Idempotent. Returns the number of tracks stopped by this call.
    pub fn close(&self) -> usize {
        let mut inner = self.lock();
        let previous = inner.machine.current();
        if !inner.machine.stop() {
            return 0;
        }
        let released = inner.release();
        tracing::info!(
            session_id = %self.id,
            kind = %self.kind,
            from = %previous,
            released,
            "Capture session closed"
        );
        released
    }

    /// Grab the current camera frame and encode it as a still image.
    ///
    /// The frame is drawn into a raster sized to the stream's native
    /// resolution before encoding. Requires an `Active` video session.
    pub async fn capture_photo<E: FrameEncoder>(
        &self,
        encoder: &E,
    ) -> Result<MediaBlob, CaptureError> {
        self.require_kind(MediaKind::Video)?;
        let raster = {
            let inner = self.lock();
            let stream = active_stream(&inner)?;
            let source = stream.video_source().ok_or(CaptureError::NoFrame)?;
            let frame = source.current_frame().ok_or(CaptureError::NoFrame)?;
            let mut raster = RasterBuffer::new(source.resolution());
            raster.draw(&frame);
            raster
        };

        let blob = encoder.encode(&raster).await?;
        tracing::info!(
            session_id = %self.id,
            width = raster.width(),
            height = raster.height(),
            bytes = blob.len(),
            "Photo captured"
        );
        Ok(blob)
    }

    /// Begin buffering encoded audio chunks. Requires an `Active` audio
    /// session; only one recording per session.
    pub fn start_recording(
        &self,
        mime_type: impl Into<String>,
    ) -> Result<RecordingHandle, CaptureError> {
        self.require_kind(MediaKind::Audio)?;
        let pipeline = {
            let mut inner = self.lock();
            if inner.machine.current() != CaptureState::Active {
                return Err(CaptureError::NotActive(inner.machine.current()));
            }
            inner
                .stream
                .as_mut()
                .and_then(|s| s.take_pipeline())
                .ok_or(CaptureError::AlreadyRecording)?
        };
        tracing::info!(session_id = %self.id, "Recording started");
        Ok(RecordingHandle::new(self.clone(), pipeline, mime_type.into()))
    }

    /// `Active -> Finalizing`, stopping the tracks so the pipeline flushes.
    pub(crate) fn begin_finalizing(&self) -> Result<usize, CaptureError> {
        let mut inner = self.lock();
        inner.machine.transition(CaptureState::Finalizing)?;
        Ok(inner.release())
    }

    /// `Finalizing -> Stopped`. A concurrent `close` may already have stopped
    /// the session, which is fine.
    pub(crate) fn finish(&self) {
        let mut inner = self.lock();
        if inner.machine.current() == CaptureState::Finalizing {
            inner.machine.stop();
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> CaptureState {
        self.lock().machine.current()
    }

    pub fn is_active(&self) -> bool {
        self.state() == CaptureState::Active
    }

    /// Tracks currently live on the owned stream.
    pub fn live_tracks(&self) -> usize {
        self.lock()
            .stream
            .as_ref()
            .map(|s| s.live_tracks())
            .unwrap_or(0)
    }

    /// Native resolution of an active camera stream.
    pub fn resolution(&self) -> Option<Resolution> {
        self.lock()
            .stream
            .as_ref()
            .and_then(|s| s.video_source().map(|v| v.resolution()))
    }

    /// When the stream became active.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.lock().opened_at
    }

    fn require_kind(&self, expected: MediaKind) -> Result<(), CaptureError> {
        if self.kind != expected {
            return Err(CaptureError::WrongKind {
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn active_stream(inner: &SessionInner) -> Result<&DeviceStream, CaptureError> {
    match (&inner.stream, inner.machine.current()) {
        (Some(stream), CaptureState::Active) => Ok(stream),
        (_, state) => Err(CaptureError::NotActive(state)),
    }
}
