//! Live sources.
//!
//! A live source is an ordered collection that reports its own fine-grained
//! changes. The observation controller reads its full contents once per
//! recomputation and then follows its notifications through a bridge.

pub mod memory;

pub use memory::MemorySource;

use crate::identity::Key;
use seqobs_core_types::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// A native change notification, in the source's own terms.
///
/// `before` is the id of the item that follows the affected item once the
/// change is applied, or `None` at the tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SourceNotification {
    AddedAt {
        id: Key,
        item: Value,
        at_index: usize,
        before: Option<Key>,
    },
    Changed {
        id: Key,
        new_item: Value,
        old_item: Value,
    },
    Removed {
        id: Key,
        item: Value,
    },
    MovedTo {
        id: Key,
        item: Value,
        from_index: usize,
        to_index: usize,
        before: Option<Key>,
    },
}

impl SourceNotification {
    pub fn id(&self) -> &Key {
        match self {
            SourceNotification::AddedAt { id, .. }
            | SourceNotification::Changed { id, .. }
            | SourceNotification::Removed { id, .. }
            | SourceNotification::MovedTo { id, .. } => id,
        }
    }
}

/// Receiver for a source's notifications.
pub type NotificationSink = Rc<dyn Fn(SourceNotification)>;

/// An ordered, incrementally observable collection of keyed items.
pub trait LiveSource {
    /// Identity used to recognise the same source across recomputations.
    fn id(&self) -> SourceId;

    /// Full current contents, in order.
    fn snapshot(&self) -> Vec<Value>;

    /// Deliver every change made after this call to `sink`.
    ///
    /// There is no initial replay of current contents.
    fn observe(&self, sink: NotificationSink) -> SourceSubscription;
}

/// Guard for one `observe` registration.
///
/// Stopping is idempotent; dropping the guard stops it.
#[must_use = "dropping a subscription stops it immediately"]
pub struct SourceSubscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl SourceSubscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for SourceSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SourceSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSubscription")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_subscription_stop_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut sub = SourceSubscription::new(move || counter.set(counter.get() + 1));
        assert!(!sub.is_stopped());
        sub.stop();
        sub.stop();
        drop(sub);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_subscription_drop_stops() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        drop(SourceSubscription::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 1);
    }
}
