//! Message construction for every input path.
//!
//! Each constructor assigns a fresh [`MessageId`] and registers any media
//! with the [`BlobStore`] so the message only carries a reference.

use chatter_core::ids::IdGenerator;
use chatter_core::types::{MediaBlob, MediaType, Message, MessageId, Role};

use crate::blob::BlobStore;
use crate::error::ChatError;

/// Content of a message built from a captured photo.
pub const PHOTO_CAPTION: &str = "Captured photo from camera";
/// Content of a message built from a voice recording.
pub const VOICE_CAPTION: &str = "Voice message";

/// A file chosen by the user for upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Builds [`Message`] values. Clones share id sequence and blob store.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    ids: IdGenerator,
    blobs: BlobStore,
}

impl MessageComposer {
    pub fn new(ids: IdGenerator, blobs: BlobStore) -> Self {
        Self { ids, blobs }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Build a user text message.
    ///
    /// Input that is empty after trimming is rejected with
    /// [`ChatError::EmptyInput`]. Accepted content is kept exactly as typed.
    pub fn from_text(&self, content: &str) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        Ok(self.text_message(Role::User, content))
    }

    /// Build a user image message from an uploaded file.
    pub fn from_image_file(&self, file: ImageFile) -> Result<Message, ChatError> {
        if !file.mime_type.starts_with("image/") {
            tracing::debug!(name = %file.name, mime_type = %file.mime_type, "Rejected upload");
            return Err(ChatError::UnsupportedMedia {
                mime_type: file.mime_type,
            });
        }
        let content = format!("Sent an image: {}", file.name);
        let blob = MediaBlob::new(file.mime_type, file.data);
        Ok(self.media_message(content, blob, MediaType::Image))
    }

    pub fn from_photo_capture(&self, blob: MediaBlob) -> Message {
        self.media_message(PHOTO_CAPTION.to_string(), blob, MediaType::Image)
    }

    pub fn from_audio_capture(&self, blob: MediaBlob) -> Message {
        self.media_message(VOICE_CAPTION.to_string(), blob, MediaType::Audio)
    }

    /// Build an assistant text message.
    pub fn assistant_reply(&self, content: &str) -> Message {
        self.text_message(Role::Assistant, content)
    }

    /// Give `message` the next id in this composer's sequence.
    pub fn reissue(&self, mut message: Message) -> Message {
        message.id = self.next_id();
        message
    }

    fn next_id(&self) -> MessageId {
        self.ids.next_id()
    }

    fn text_message(&self, role: Role, content: &str) -> Message {
        Message::text(self.next_id(), role, content)
    }

    fn media_message(&self, content: String, blob: MediaBlob, media_type: MediaType) -> Message {
        let url = self.blobs.create_local_reference(blob);
        Message::with_media(self.next_id(), Role::User, content, url, media_type)
    }
}
