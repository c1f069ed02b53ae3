//! Message id assignment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::types::MessageId;

/// Hands out strictly increasing [`MessageId`]s.
///
/// Ids start from the current Unix time in milliseconds. When two ids are
/// requested within the same millisecond (or the clock steps backwards) the
/// previous id plus one is used instead, so ids never repeat and always sort
/// in assignment order. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: Arc<AtomicU64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fixed value instead of the wall clock's past.
    ///
    /// The next id is at least `floor + 1`.
    pub fn starting_after(floor: u64) -> Self {
        Self {
            last: Arc::new(AtomicU64::new(floor)),
        }
    }

    /// Assign the next id. Saturates at `u64::MAX`.
    pub fn next_id(&self) -> MessageId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return MessageId::new(candidate),
                Err(observed) => current = observed,
            }
        }
    }
}
