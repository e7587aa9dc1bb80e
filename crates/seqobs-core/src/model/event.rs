//! Canonical change events.

use crate::identity::Key;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step that brings a consumer's rendered state closer to the latest
/// provider output.
///
/// Indices are relative to the rendered state immediately before the event
/// is applied. `before` is the key that follows the item once the event has
/// been applied, or `None` when the item sits at the tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequenceEvent {
    AddedAt {
        key: Key,
        item: Value,
        at_index: usize,
        before: Option<Key>,
    },
    Changed {
        key: Key,
        new_item: Value,
        old_item: Value,
    },
    Removed {
        key: Key,
        item: Value,
    },
    MovedTo {
        key: Key,
        item: Value,
        from_index: usize,
        to_index: usize,
        before: Option<Key>,
    },
}

impl SequenceEvent {
    /// The key this event is about.
    pub fn key(&self) -> &Key {
        match self {
            SequenceEvent::AddedAt { key, .. }
            | SequenceEvent::Changed { key, .. }
            | SequenceEvent::Removed { key, .. }
            | SequenceEvent::MovedTo { key, .. } => key,
        }
    }

    /// Short name of the event kind, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SequenceEvent::AddedAt { .. } => "added_at",
            SequenceEvent::Changed { .. } => "changed",
            SequenceEvent::Removed { .. } => "removed",
            SequenceEvent::MovedTo { .. } => "moved_to",
        }
    }
}
