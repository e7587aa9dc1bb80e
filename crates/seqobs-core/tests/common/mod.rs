use seqobs_core::{Key, SequenceCallbacks, SequenceEvent};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Callback set that records every delivered event
///
/// Clones share the same log, so the test keeps one clone and hands the
/// other to `observe`.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<SequenceEvent>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SequenceEvent> {
        self.events.borrow().clone()
    }

    /// Return the events recorded so far and forget them
    pub fn take(&self) -> Vec<SequenceEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl SequenceCallbacks for Recorder {
    fn on_event(&mut self, event: &SequenceEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Structured records with the given ids
#[allow(dead_code)]
pub fn docs(ids: &[&str]) -> Vec<Value> {
    ids.iter().map(|id| json!({ "_id": id })).collect()
}

#[allow(dead_code)]
pub fn names(events: &[SequenceEvent]) -> Vec<&'static str> {
    events.iter().map(SequenceEvent::name).collect()
}

/// Events as JSON with every key removed
///
/// Unkeyed items get fresh keys on every run, so tests on scalar sequences
/// compare everything except the keys.
#[allow(dead_code)]
pub fn strip_ids(events: &[SequenceEvent]) -> Vec<Value> {
    events
        .iter()
        .map(|event| {
            let mut value = serde_json::to_value(event).unwrap();
            if let Some(fields) = value.as_object_mut() {
                fields.remove("key");
                fields.remove("before");
            }
            value
        })
        .collect()
}

/// Independent consumer-side model of the rendered sequence
///
/// Applies events the way a renderer would and asserts that every index
/// and before-key agrees with what it holds.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    pub entries: Vec<(Key, Value)>,
}

#[allow(dead_code)]
impl Mirror {
    pub fn from_docs(items: &[Value]) -> Self {
        Self {
            entries: items
                .iter()
                .map(|item| (Key::from_id_value(&item["_id"]).unwrap(), item.clone()))
                .collect(),
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn items(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    fn position(&self, key: &Key) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn apply(&mut self, event: &SequenceEvent) {
        match event {
            SequenceEvent::AddedAt {
                key,
                item,
                at_index,
                before,
            } => {
                assert!(self.position(key).is_none(), "{} added twice", key);
                assert_eq!(
                    self.entries.get(*at_index).map(|(k, _)| k),
                    before.as_ref(),
                    "before-key of added {}",
                    key
                );
                self.entries.insert(*at_index, (key.clone(), item.clone()));
            }
            SequenceEvent::Changed {
                key,
                new_item,
                old_item,
            } => {
                let i = self.position(key).expect("changed key present");
                assert_eq!(&self.entries[i].1, old_item, "old item of {}", key);
                self.entries[i].1 = new_item.clone();
            }
            SequenceEvent::Removed { key, item } => {
                let i = self.position(key).expect("removed key present");
                assert_eq!(&self.entries[i].1, item, "removed item of {}", key);
                self.entries.remove(i);
            }
            SequenceEvent::MovedTo {
                key,
                from_index,
                to_index,
                before,
                ..
            } => {
                assert_eq!(self.position(key), Some(*from_index), "from index of {}", key);
                let entry = self.entries.remove(*from_index);
                assert_eq!(
                    self.entries.get(*to_index).map(|(k, _)| k),
                    before.as_ref(),
                    "before-key of moved {}",
                    key
                );
                self.entries.insert(*to_index, entry);
            }
        }
    }

    pub fn apply_all(&mut self, events: &[SequenceEvent]) {
        for event in events {
            self.apply(event);
        }
    }
}
