//! Local addressing for media blobs.
//!
//! Messages never embed media bytes; they carry a `blob:` URL that the render
//! layer resolves here. References stay valid until released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use chatter_core::types::MediaBlob;

/// Prefix of every reference handed out by [`BlobStore`].
pub const BLOB_URL_PREFIX: &str = "blob:chatter/";

/// In-memory registry of addressable blobs. Clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    entries: Arc<Mutex<HashMap<String, MediaBlob>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a URL-like reference to it.
    pub fn create_local_reference(&self, blob: MediaBlob) -> String {
        let url = format!("{}{}", BLOB_URL_PREFIX, Uuid::new_v4());
        tracing::debug!(url = %url, mime_type = %blob.mime_type, bytes = blob.len(), "Blob reference created");
        self.lock().insert(url.clone(), blob);
        url
    }

    /// Look up the blob behind a reference.
    pub fn resolve(&self, url: &str) -> Option<MediaBlob> {
        self.lock().get(url).cloned()
    }

    /// Free one reference. Returns false if it was unknown or already released.
    pub fn release_local_reference(&self, url: &str) -> bool {
        let released = self.lock().remove(url).is_some();
        if released {
            tracing::debug!(url = %url, "Blob reference released");
        }
        released
    }

    /// Free every reference. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MediaBlob>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
