//! Chatter Chat crate - the conversation and its input paths.
//!
//! Builds messages from text, uploaded images, camera photos and voice
//! recordings, keeps them in an append-only `ConversationLog`, answers user
//! text through a `ResponseService`, and reports capture outcomes through a
//! `Notifier`. `ChatController` ties these together for the render layer.

pub mod blob;
pub mod composer;
pub mod controller;
pub mod error;
pub mod log;
pub mod notify;
pub mod responder;

pub use blob::{BlobStore, BLOB_URL_PREFIX};
pub use composer::{ImageFile, MessageComposer};
pub use controller::{CameraSurface, ChatController, RecorderSurface};
pub use error::ChatError;
pub use log::{ConversationLog, ObserverId};
pub use notify::{Notification, NotificationCenter, Notifier, TracingNotifier};
pub use responder::{ResponseService, ResponseSimulator};
