//! User-facing notifications.
//!
//! Capture and upload outcomes are reported through a [`Notifier`]. The
//! [`NotificationCenter`] keeps a bounded, acknowledgeable history of them
//! separate from the conversation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use chatter_core::config::NotificationConfig;
use chatter_core::types::NotificationKind;

/// Sink for transient user notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, text: &str);
}

/// Emits notifications as log events only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NotificationKind, text: &str) {
        match kind {
            NotificationKind::Error => tracing::warn!(kind = %kind, "{}", text),
            _ => tracing::info!(kind = %kind, "{}", text),
        }
    }
}

/// One retained notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded notification history. Clones share it.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    entries: Arc<Mutex<VecDeque<Notification>>>,
    max_entries: usize,
    enabled: bool,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl NotificationCenter {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
            enabled: true,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_entries)
        }
    }

    /// Record a notification, evicting the oldest when full.
    ///
    /// Returns `None` when recording is disabled.
    pub fn push(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Option<Uuid> {
        if !self.enabled || self.max_entries == 0 {
            return None;
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            description,
            timestamp: Utc::now(),
        };
        let id = notification.id;

        let mut entries = self.lock();
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(notification);
        Some(id)
    }

    /// Retained notifications, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Dismiss one notification. Returns false if it is not retained.
    pub fn acknowledge(&self, id: Uuid) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|n| n.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Dismiss everything. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, kind: NotificationKind, text: &str) {
        TracingNotifier.notify(kind, text);
        self.push(kind, text, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_list() {
        let center = NotificationCenter::new(10);
        center.push(NotificationKind::Info, "Started recording...", None);
        center.push(
            NotificationKind::Error,
            "Failed to access camera",
            Some("permission denied".to_string()),
        );

        let list = center.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Started recording...");
        assert_eq!(list[1].kind, NotificationKind::Error);
        assert_eq!(list[1].description.as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_oldest_evicted_when_full() {
        let center = NotificationCenter::new(2);
        center.push(NotificationKind::Info, "one", None);
        center.push(NotificationKind::Info, "two", None);
        center.push(NotificationKind::Info, "three", None);

        let titles: Vec<_> = center.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "three"]);
    }

    #[test]
    fn test_acknowledge_and_clear() {
        let center = NotificationCenter::new(5);
        let first = center.push(NotificationKind::Success, "a", None).unwrap();
        center.push(NotificationKind::Success, "b", None);
        center.push(NotificationKind::Success, "c", None);

        assert!(center.acknowledge(first));
        assert!(!center.acknowledge(first));
        assert_eq!(center.count(), 2);
        assert_eq!(center.clear_all(), 2);
        assert_eq!(center.count(), 0);
    }

    #[test]
    fn test_disabled_center_records_nothing() {
        let center = NotificationCenter::from_config(&NotificationConfig {
            enabled: false,
            max_entries: 10,
        });
        assert!(center.push(NotificationKind::Info, "x", None).is_none());
        center.notify(NotificationKind::Error, "y");
        assert_eq!(center.count(), 0);
    }

    #[test]
    fn test_notifier_records_title() {
        let center = NotificationCenter::default();
        let notifier: &dyn Notifier = &center;
        notifier.notify(NotificationKind::Success, "Photo captured successfully");
        assert_eq!(center.list()[0].title, "Photo captured successfully");
    }

    #[test]
    fn test_serializes_without_empty_description() {
        let center = NotificationCenter::new(1);
        center.push(NotificationKind::Info, "hi", None);
        let json = serde_json::to_value(&center.list()[0]).unwrap();
        assert_eq!(json["kind"], "info");
        assert_eq!(json["title"], "hi");
        assert!(json.get("description").is_none());
    }
}
