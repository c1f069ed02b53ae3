//! The ordered conversation history.
//!
//! [`ConversationLog`] is append-only and its ids strictly increase in append
//! order. Observers registered with [`ConversationLog::subscribe`] see every
//! appended message exactly once and in append order.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatter_core::types::{Message, MessageId};

use crate::error::ChatError;

/// Callback invoked for each appended message.
pub type Observer = Box<dyn Fn(&Message) + Send + Sync>;

/// Handle returned by [`ConversationLog::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct Entries {
    messages: Vec<Message>,
}

impl Entries {
    fn check_next(&self, id: MessageId) -> Result<(), ChatError> {
        let Some(last) = self.messages.last().map(|m| m.id) else {
            return Ok(());
        };
        if id > last {
            Ok(())
        } else if self.messages.iter().any(|m| m.id == id) {
            Err(ChatError::DuplicateMessage(id))
        } else {
            Err(ChatError::OutOfOrder { id, last })
        }
    }
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    list: Vec<(ObserverId, Observer)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, append-only message history. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct ConversationLog {
    entries: Arc<Mutex<Entries>>,
    observers: Arc<Mutex<Observers>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and notify observers.
    ///
    /// Fails with [`ChatError::DuplicateMessage`] if a message with the same
    /// id is already present, or [`ChatError::OutOfOrder`] if its id is not
    /// greater than the latest one. Observers run on the caller's thread and
    /// must not call back into the log.
    pub fn append(&self, message: Message) -> Result<(), ChatError> {
        self.append_with(|| Ok(message)).map(|_| ())
    }

    /// Build a message and append it in one step.
    ///
    /// `compose` runs while the log is locked, so ids drawn from a shared
    /// generator inside it land in the log in increasing order. It must not
    /// touch the log. Returns the stored message.
    pub fn append_with<F>(&self, compose: F) -> Result<Message, ChatError>
    where
        F: FnOnce() -> Result<Message, ChatError>,
    {
        // Held across the push and the callbacks so concurrent appends
        // reach observers in the order they were stored.
        let observers = lock(&self.observers);
        let message = {
            let mut entries = lock(&self.entries);
            let message = compose()?;
            entries.check_next(message.id)?;
            entries.messages.push(message.clone());
            message
        };

        tracing::debug!(
            message_id = %message.id,
            role = %message.role,
            media = ?message.media_type(),
            "Message appended"
        );
        for (_, observer) in observers.list.iter() {
            observer(&message);
        }
        Ok(message)
    }

    /// Snapshot of all messages in append order.
    pub fn all(&self) -> Vec<Message> {
        lock(&self.entries).messages.clone()
    }

    pub fn get(&self, id: MessageId) -> Option<Message> {
        lock(&self.entries)
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn last(&self) -> Option<Message> {
        lock(&self.entries).messages.last().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).messages.is_empty()
    }

    /// Register a callback for future appends.
    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let mut observers = lock(&self.observers);
        observers.next_id += 1;
        let id = ObserverId(observers.next_id);
        observers.list.push((id, Box::new(observer)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.list.len();
        observers.list.retain(|(existing, _)| *existing != id);
        observers.list.len() != before
    }
}

impl fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationLog")
            .field("messages", &self.len())
            .field("observers", &lock(&self.observers).list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_core::ids::IdGenerator;
    use chatter_core::types::Role;

    fn message(id: u64, content: &str) -> Message {
        Message::text(MessageId::new(id), Role::User, content)
    }

    #[test]
    fn test_append_preserves_order() {
        let log = ConversationLog::new();
        log.append(message(1, "a")).unwrap();
        log.append(message(2, "b")).unwrap();
        log.append(message(3, "c")).unwrap();

        let contents: Vec<_> = log.all().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(log.last().unwrap().content, "c");
        assert_eq!(log.get(MessageId::new(2)).unwrap().content, "b");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let log = ConversationLog::new();
        log.append(message(5, "first")).unwrap();

        let err = log.append(message(5, "second")).unwrap_err();
        assert!(matches!(err, ChatError::DuplicateMessage(id) if id == MessageId::new(5)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.all()[0].content, "first");
    }

    #[test]
    fn test_older_id_rejected() {
        let log = ConversationLog::new();
        log.append(message(5, "a")).unwrap();
        log.append(message(9, "b")).unwrap();

        let err = log.append(message(7, "late")).unwrap_err();
        assert!(matches!(
            err,
            ChatError::OutOfOrder { id, last }
                if id == MessageId::new(7) && last == MessageId::new(9)
        ));
        assert!(matches!(
            log.append(message(5, "again")),
            Err(ChatError::DuplicateMessage(_))
        ));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_append_with_returns_stored_message() {
        let log = ConversationLog::new();
        let stored = log.append_with(|| Ok(message(3, "built"))).unwrap();
        assert_eq!(stored.id, MessageId::new(3));
        assert_eq!(log.last().unwrap().content, "built");

        let err = log
            .append_with(|| Err(ChatError::EmptyInput))
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyInput));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_observer_sees_each_append_once() {
        let log = ConversationLog::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        log.subscribe(move |m| sink.lock().unwrap().push(m.id.as_u64()));

        log.append(message(1, "a")).unwrap();
        let _ = log.append(message(1, "dup"));
        log.append(message(2, "b")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let log = ConversationLog::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let id = log.subscribe(move |_| *sink.lock().unwrap() += 1);

        log.append(message(1, "a")).unwrap();
        assert!(log.unsubscribe(id));
        assert!(!log.unsubscribe(id));
        log.append(message(2, "b")).unwrap();

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_appends_keep_ids_increasing() {
        let log = ConversationLog::new();
        let ids = IdGenerator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        log.subscribe(move |m| sink.lock().unwrap().push(m.id));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = log.clone();
                let ids = ids.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        log.append_with(|| Ok(Message::text(ids.next_id(), Role::User, "x")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored: Vec<_> = log.all().into_iter().map(|m| m.id).collect();
        assert_eq!(stored.len(), 400);
        assert!(stored.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(*seen.lock().unwrap(), stored);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = ConversationLog::new();
        log.append(message(1, "a")).unwrap();
        let snapshot = log.all();
        log.append(message(2, "b")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
        assert!(!log.is_empty());
    }
}
