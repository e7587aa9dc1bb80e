//! The authoritative record of what has been communicated to the consumer.
//!
//! # Invariants
//!
//! 1. `order` never holds the same key twice.
//! 2. `order` and `items` always hold exactly the same key set.
//! 3. After an event is applied, the state equals the snapshot that produced
//!    it, in content and in order.
//!
//! Mutation is crate-private: only the differ's working copy and the
//! observation controller apply events.

use crate::errors::{Result, SeqObsError};
use crate::identity::Key;
use crate::model::{SequenceEvent, Snapshot};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RenderedState {
    order: Vec<Key>,
    items: HashMap<Key, Value>,
}

impl RenderedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh state holding exactly `snapshot`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut state = Self::new();
        for (key, item) in snapshot.entries() {
            state.order.push(key.clone());
            state.items.insert(key.clone(), item.clone());
        }
        state
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> &[Key] {
        &self.order
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.items.get(key)
    }

    pub fn index_of(&self, key: &Key) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    /// Key at `index`, if in range.
    pub fn key_at(&self, index: usize) -> Option<&Key> {
        self.order.get(index)
    }

    /// Copy of the current contents, in order.
    pub fn to_snapshot(&self) -> Snapshot {
        let entries = self
            .order
            .iter()
            .filter_map(|k| self.items.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        Snapshot::from_entries_unchecked(entries)
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.items.clear();
    }

    /// Apply one event, checking it against the current state first.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentState` when the event does not describe a valid
    /// transition from the current state; the state is left untouched.
    pub(crate) fn apply(&mut self, event: &SequenceEvent) -> Result<()> {
        match event {
            SequenceEvent::AddedAt {
                key,
                item,
                at_index,
                before,
            } => {
                if self.contains(key) {
                    return Err(inconsistent(format!("{} added twice", key)));
                }
                if *at_index > self.order.len() {
                    return Err(inconsistent(format!(
                        "{} added at {} past the end ({})",
                        key,
                        at_index,
                        self.order.len()
                    )));
                }
                if self.order.get(*at_index) != before.as_ref() {
                    return Err(inconsistent(format!(
                        "{} added at {} but before-key does not match",
                        key, at_index
                    )));
                }
                self.order.insert(*at_index, key.clone());
                self.items.insert(key.clone(), item.clone());
            }
            SequenceEvent::Changed { key, new_item, .. } => {
                let slot = self
                    .items
                    .get_mut(key)
                    .ok_or_else(|| inconsistent(format!("{} changed but not present", key)))?;
                *slot = new_item.clone();
            }
            SequenceEvent::Removed { key, .. } => {
                let index = self
                    .index_of(key)
                    .ok_or_else(|| inconsistent(format!("{} removed but not present", key)))?;
                self.order.remove(index);
                self.items.remove(key);
            }
            SequenceEvent::MovedTo {
                key,
                item,
                from_index,
                to_index,
                before,
            } => {
                if self.order.get(*from_index) != Some(key) {
                    return Err(inconsistent(format!(
                        "{} moved from {} but is not there",
                        key, from_index
                    )));
                }
                if *to_index >= self.order.len() {
                    return Err(inconsistent(format!(
                        "{} moved to {} past the end ({})",
                        key,
                        to_index,
                        self.order.len()
                    )));
                }
                let moved = self.order.remove(*from_index);
                if self.order.get(*to_index) != before.as_ref() {
                    self.order.insert(*from_index, moved);
                    return Err(inconsistent(format!(
                        "{} moved to {} but before-key does not match",
                        key, to_index
                    )));
                }
                self.order.insert(*to_index, moved);
                self.items.insert(key.clone(), item.clone());
            }
        }
        Ok(())
    }
}

fn inconsistent(reason: String) -> SeqObsError {
    SeqObsError::InconsistentState { reason }
}
