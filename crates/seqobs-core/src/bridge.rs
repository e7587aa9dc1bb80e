//! Live source bridge.
//!
//! While a live source is the current generation, its native notifications
//! are translated one for one into canonical events positioned against the
//! rendered state. The bridge never synthesizes events of its own: items
//! held when it detaches are left for the next transition diff.

use crate::identity::Key;
use crate::model::{RenderedState, SequenceEvent};
use crate::source::{LiveSource, NotificationSink, SourceNotification, SourceSubscription};
use seqobs_core_types::SourceId;

/// Owns the subscription to one live source.
#[derive(Debug)]
pub struct LiveSourceBridge {
    source_id: SourceId,
    subscription: SourceSubscription,
}

impl LiveSourceBridge {
    /// Subscribe `sink` to every later change of `source`.
    pub fn attach(source: &dyn LiveSource, sink: NotificationSink) -> Self {
        let source_id = source.id();
        let subscription = source.observe(sink);
        tracing::debug!(
            component = module_path!(),
            source_id = %source_id,
            "bridge attached"
        );
        Self {
            source_id,
            subscription,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn is_attached(&self) -> bool {
        !self.subscription.is_stopped()
    }

    /// Unsubscribe. Items already rendered are left in place.
    pub fn detach(mut self) {
        self.subscription.stop();
        tracing::debug!(
            component = module_path!(),
            source_id = %self.source_id,
            "bridge detached"
        );
    }
}

/// Translate a native notification into a canonical event.
///
/// Positions come from the notification's `before` key resolved against
/// `state`; the item reported as current or old is the one `state` holds.
/// Notifications that contradict `state` yield `None`.
pub fn translate(state: &RenderedState, notification: SourceNotification) -> Option<SequenceEvent> {
    match notification {
        SourceNotification::AddedAt {
            id, item, before, ..
        } => {
            if state.contains(&id) {
                return dropped(&id, "already present");
            }
            let at_index = match &before {
                Some(next) => match state.index_of(next) {
                    Some(i) => i,
                    None => return dropped(&id, "unknown before-key"),
                },
                None => state.len(),
            };
            Some(SequenceEvent::AddedAt {
                key: id,
                item,
                at_index,
                before,
            })
        }
        SourceNotification::Changed { id, new_item, .. } => match state.get(&id) {
            Some(old_item) => Some(SequenceEvent::Changed {
                key: id,
                new_item,
                old_item: old_item.clone(),
            }),
            None => dropped(&id, "unknown key"),
        },
        SourceNotification::Removed { id, .. } => match state.get(&id) {
            Some(item) => Some(SequenceEvent::Removed {
                item: item.clone(),
                key: id,
            }),
            None => dropped(&id, "unknown key"),
        },
        SourceNotification::MovedTo { id, before, .. } => {
            let (Some(from_index), Some(item)) = (state.index_of(&id), state.get(&id)) else {
                return dropped(&id, "unknown key");
            };
            let to_index = match &before {
                Some(next) if *next == id => return dropped(&id, "moved before itself"),
                Some(next) => match state.index_of(next) {
                    Some(pos) if pos > from_index => pos - 1,
                    Some(pos) => pos,
                    None => return dropped(&id, "unknown before-key"),
                },
                None => state.len().saturating_sub(1),
            };
            Some(SequenceEvent::MovedTo {
                item: item.clone(),
                key: id,
                from_index,
                to_index,
                before,
            })
        }
    }
}

fn dropped(key: &Key, reason: &str) -> Option<SequenceEvent> {
    tracing::debug!(
        component = module_path!(),
        key = %key,
        reason,
        "notification dropped"
    );
    None
}
