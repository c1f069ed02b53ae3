//! Conversation controller.
//!
//! [`ChatController`] is the single entry point the render layer drives: it
//! turns user actions into messages, schedules assistant replies, opens
//! capture surfaces, and reports outcomes through the [`Notifier`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use chatter_capture::{
    BmpEncoder, CaptureError, CaptureSession, DeviceProvider, FrameEncoder, MediaKind,
    RecordingHandle,
};
use chatter_core::config::ChatterConfig;
use chatter_core::ids::IdGenerator;
use chatter_core::types::{Message, MessageId, NotificationKind};

use crate::blob::BlobStore;
use crate::composer::{ImageFile, MessageComposer};
use crate::error::ChatError;
use crate::log::ConversationLog;
use crate::notify::Notifier;
use crate::responder::{ResponseService, ResponseSimulator};

pub const MSG_INVALID_UPLOAD: &str = "Please select an image file";
pub const MSG_IMAGE_UPLOADED: &str = "Image uploaded";
pub const MSG_CAMERA_FAILED: &str = "Failed to access camera";
pub const MSG_CAMERA_NOT_READY: &str = "Camera not initialized properly";
pub const MSG_PHOTO_CAPTURED: &str = "Photo captured successfully";
pub const MSG_RECORDING_STARTED: &str = "Started recording...";
pub const MSG_RECORDING_FAILED: &str = "Failed to start recording";
pub const MSG_RECORDING_STOPPED: &str = "Recording stopped";
pub const MSG_RECORDING_SAVE_FAILED: &str = "Failed to save recording";

// =============================================================================
// ChatController
// =============================================================================

/// Drives one conversation.
///
/// `P` supplies device streams and `E` encodes photos. Cheap to clone; clones
/// share the same conversation.
pub struct ChatController<P, E = BmpEncoder> {
    log: ConversationLog,
    composer: MessageComposer,
    responder: Arc<dyn ResponseService>,
    notifier: Arc<dyn Notifier>,
    provider: Arc<P>,
    encoder: Arc<E>,
    audio_mime_type: String,
    pending_replies: Arc<AtomicUsize>,
}

impl<P, E> Clone for ChatController<P, E> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            composer: self.composer.clone(),
            responder: Arc::clone(&self.responder),
            notifier: Arc::clone(&self.notifier),
            provider: Arc::clone(&self.provider),
            encoder: Arc::clone(&self.encoder),
            audio_mime_type: self.audio_mime_type.clone(),
            pending_replies: Arc::clone(&self.pending_replies),
        }
    }
}

impl<P, E> ChatController<P, E>
where
    P: DeviceProvider,
    E: FrameEncoder,
{
    /// Build a controller with a simulated assistant configured from `config`.
    pub fn new(
        provider: P,
        encoder: E,
        notifier: Arc<dyn Notifier>,
        config: &ChatterConfig,
    ) -> Self {
        let composer = MessageComposer::new(IdGenerator::new(), BlobStore::new());
        let responder = Arc::new(ResponseSimulator::from_config(
            composer.clone(),
            &config.assistant,
        ));
        Self {
            log: ConversationLog::new(),
            composer,
            responder,
            notifier,
            provider: Arc::new(provider),
            encoder: Arc::new(encoder),
            audio_mime_type: config.capture.audio_mime_type.clone(),
            pending_replies: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the assistant.
    pub fn with_responder(mut self, responder: Arc<dyn ResponseService>) -> Self {
        self.responder = responder;
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn composer(&self) -> &MessageComposer {
        &self.composer
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.all()
    }

    /// Whether an assistant reply is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending_replies.load(Ordering::SeqCst) > 0
    }

    /// Send a text message and schedule the assistant's reply.
    ///
    /// Blank input returns [`ChatError::EmptyInput`] without touching the log.
    /// The returned task appends the reply when it completes. Must be called
    /// inside a Tokio runtime.
    pub fn send_text(&self, content: &str) -> Result<JoinHandle<()>, ChatError> {
        let message = self.log.append_with(|| self.composer.from_text(content))?;
        tracing::info!(message_id = %message.id, "User message sent");

        self.pending_replies.fetch_add(1, Ordering::SeqCst);
        let log = self.log.clone();
        let composer = self.composer.clone();
        let responder = Arc::clone(&self.responder);
        let pending = Arc::clone(&self.pending_replies);
        Ok(tokio::spawn(async move {
            let reply = responder.respond(&message).await;
            // Numbered at append time, after anything sent meanwhile.
            match log.append_with(|| Ok(composer.reissue(reply))) {
                Ok(reply) => tracing::info!(
                    message_id = %reply.id,
                    in_reply_to = %message.id,
                    "Assistant replied"
                ),
                Err(e) => tracing::warn!(error = %e, "Failed to append assistant reply"),
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    /// Add an uploaded image to the conversation.
    pub fn upload_image(&self, file: ImageFile) -> Result<MessageId, ChatError> {
        let message = commit(&self.log, &self.composer, |composer| {
            composer.from_image_file(file)
        })
        .inspect_err(|err| {
            if matches!(err, ChatError::UnsupportedMedia { .. }) {
                self.notifier.notify(NotificationKind::Error, MSG_INVALID_UPLOAD);
            }
        })?;
        self.notifier.notify(NotificationKind::Success, MSG_IMAGE_UPLOADED);
        Ok(message.id)
    }

    /// Create a camera surface that has not asked for the device yet.
    ///
    /// Pair with [`acquire_camera`](Self::acquire_camera). The surface can be
    /// cancelled while the permission prompt is still pending.
    pub fn camera_surface(&self) -> CameraSurface<E> {
        CameraSurface {
            session: CaptureSession::new(MediaKind::Video),
            encoder: Arc::clone(&self.encoder),
            composer: self.composer.clone(),
            log: self.log.clone(),
            notifier: Arc::clone(&self.notifier),
        }
    }

    /// Request the camera for a session made by
    /// [`camera_surface`](Self::camera_surface).
    ///
    /// Denial and hardware failure are reported through the notifier. A
    /// request abandoned by closing the surface returns
    /// [`CaptureError::Cancelled`] without a notification.
    pub async fn acquire_camera(&self, session: &CaptureSession) -> Result<(), ChatError> {
        match session.acquire(&*self.provider).await {
            Ok(()) => Ok(()),
            Err(CaptureError::Cancelled) => {
                tracing::debug!(session_id = %session.id(), "Camera request abandoned");
                Err(CaptureError::Cancelled.into())
            }
            Err(err) => {
                self.notifier.notify(NotificationKind::Error, MSG_CAMERA_FAILED);
                Err(err.into())
            }
        }
    }

    /// Open the camera and wait until its preview is live.
    pub async fn open_camera(&self) -> Result<CameraSurface<E>, ChatError> {
        let camera = self.camera_surface();
        self.acquire_camera(camera.session()).await?;
        Ok(camera)
    }

    /// Open the microphone and start recording a voice message.
    pub async fn start_recording(&self) -> Result<RecorderSurface, ChatError> {
        match self.open_recorder().await {
            Ok(handle) => {
                self.notifier.notify(NotificationKind::Info, MSG_RECORDING_STARTED);
                Ok(RecorderSurface {
                    handle,
                    composer: self.composer.clone(),
                    log: self.log.clone(),
                    notifier: Arc::clone(&self.notifier),
                })
            }
            Err(err) => {
                self.notifier.notify(NotificationKind::Error, MSG_RECORDING_FAILED);
                Err(err.into())
            }
        }
    }

    async fn open_recorder(&self) -> Result<RecordingHandle, CaptureError> {
        let session = CaptureSession::open(&*self.provider, MediaKind::Audio).await?;
        session.start_recording(self.audio_mime_type.clone())
    }

    /// Release every media reference held for the conversation.
    pub fn shutdown(&self) -> usize {
        let released = self.composer.blobs().release_all();
        tracing::info!(released, messages = self.log.len(), "Conversation shut down");
        released
    }
}

/// Compose a message and append it under the log lock.
///
/// Media registered while composing is released again if the append fails.
fn commit<F>(
    log: &ConversationLog,
    composer: &MessageComposer,
    compose: F,
) -> Result<Message, ChatError>
where
    F: FnOnce(&MessageComposer) -> Result<Message, ChatError>,
{
    let mut media_url = None;
    let result = log.append_with(|| {
        let message = compose(composer)?;
        media_url = message.media_url().map(str::to_string);
        Ok(message)
    });
    if let (Err(err), Some(url)) = (&result, media_url) {
        composer.blobs().release_local_reference(&url);
        tracing::warn!(error = %err, media_url = %url, "Message rejected, media released");
    }
    result
}

// =============================================================================
// Capture surfaces
// =============================================================================

/// A camera preview waiting for the user to take a photo or dismiss it.
///
/// The camera is released on every exit: photo taken, cancel, or drop.
pub struct CameraSurface<E> {
    session: CaptureSession,
    encoder: Arc<E>,
    composer: MessageComposer,
    log: ConversationLog,
    notifier: Arc<dyn Notifier>,
}

impl<E: FrameEncoder> CameraSurface<E> {
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Capture the current frame, add it to the conversation, and close the
    /// camera.
    pub async fn take_photo(self) -> Result<MessageId, ChatError> {
        let captured = self.session.capture_photo(&*self.encoder).await;
        self.session.close();

        let blob = match captured {
            Ok(blob) => blob,
            Err(err) => {
                let text = match err {
                    CaptureError::NoFrame | CaptureError::NotActive(_) => MSG_CAMERA_NOT_READY,
                    _ => MSG_CAMERA_FAILED,
                };
                self.notifier.notify(NotificationKind::Error, text);
                return Err(err.into());
            }
        };

        let message = commit(&self.log, &self.composer, |composer| {
            Ok(composer.from_photo_capture(blob))
        })?;
        self.notifier.notify(NotificationKind::Success, MSG_PHOTO_CAPTURED);
        Ok(message.id)
    }

    /// Dismiss the preview without adding anything.
    pub fn cancel(self) {
        tracing::debug!(session_id = %self.session.id(), "Camera dismissed");
    }
}

impl<E> Drop for CameraSurface<E> {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// A voice recording in progress.
///
/// Dropping it without calling [`stop`](Self::stop) discards the recording
/// and releases the microphone.
pub struct RecorderSurface {
    handle: RecordingHandle,
    composer: MessageComposer,
    log: ConversationLog,
    notifier: Arc<dyn Notifier>,
}

impl RecorderSurface {
    pub fn session(&self) -> &CaptureSession {
        self.handle.session()
    }

    /// Finish the recording and add it to the conversation as a voice message.
    pub async fn stop(self) -> Result<MessageId, ChatError> {
        let blob = match self.handle.stop().await {
            Ok(blob) => blob,
            Err(err) => {
                self.notifier.notify(NotificationKind::Error, MSG_RECORDING_SAVE_FAILED);
                return Err(err.into());
            }
        };
        self.notifier.notify(NotificationKind::Success, MSG_RECORDING_STOPPED);

        let message = commit(&self.log, &self.composer, |composer| {
            Ok(composer.from_audio_capture(blob))
        })?;
        Ok(message.id)
    }

    /// Discard the recording.
    pub fn cancel(self) {
        tracing::debug!(session_id = %self.handle.session().id(), "Recording discarded");
    }
}
