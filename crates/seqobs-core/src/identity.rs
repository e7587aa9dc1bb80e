//! Item identity extraction.
//!
//! A structured record is a JSON object carrying a non-null `_id` field; its
//! key is derived from that field and is stable across generations. Every
//! other item is unkeyed and receives a freshly minted key each time a
//! snapshot is extracted, so unkeyed items never keep their identity from one
//! recomputation to the next.

use crate::model::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Name of the identity field on structured records.
pub const ID_FIELD: &str = "_id";

/// Stable identity token for one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Key {
    /// A string `_id`.
    Id(String),
    /// A non-string `_id`, as compact JSON text.
    Encoded(String),
    /// Minted for an unkeyed item; never reused.
    Generated(Uuid),
}

impl Key {
    /// Key for a string identity.
    pub fn id(id: impl Into<String>) -> Self {
        Key::Id(id.into())
    }

    /// Derive the key for an `_id` value. `null` has no key.
    pub fn from_id_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Key::Id(s.clone())),
            other => Some(Key::Encoded(other.to_string())),
        }
    }

    /// Mint a key that no other item will ever carry.
    pub fn generate() -> Self {
        Key::Generated(Uuid::new_v4())
    }

    /// True when the key was minted for an unkeyed item.
    pub fn is_generated(&self) -> bool {
        matches!(self, Key::Generated(_))
    }

    /// The `_id` value this key was derived from, if any.
    pub fn to_id_value(&self) -> Option<Value> {
        match self {
            Key::Id(s) => Some(Value::String(s.clone())),
            Key::Encoded(text) => serde_json::from_str(text).ok(),
            Key::Generated(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(s) | Key::Encoded(s) => f.write_str(s),
            Key::Generated(uuid) => write!(f, "~{}", uuid),
        }
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Key::Id(id.to_string())
    }
}

/// Classification of a raw item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Keyed(Key),
    Unkeyed,
}

/// Classify an item as keyed or unkeyed.
pub fn identify(item: &Value) -> Identity {
    match key_of(item) {
        Some(key) => Identity::Keyed(key),
        None => Identity::Unkeyed,
    }
}

/// The persistent key of a structured record, if it has one.
pub fn key_of(item: &Value) -> Option<Key> {
    item.as_object()
        .and_then(|fields| fields.get(ID_FIELD))
        .and_then(Key::from_id_value)
}

/// When a key present in both the old and the new snapshot reports `changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    /// Fire for every common key, whether or not its value differs.
    #[default]
    Always,
    /// Fire only when the old and new values differ.
    WhenDifferent,
}

impl ChangePolicy {
    /// Whether `changed` fires for this pair of values.
    pub fn fires(&self, old: &Value, new: &Value) -> bool {
        match self {
            ChangePolicy::Always => true,
            ChangePolicy::WhenDifferent => old != new,
        }
    }
}

/// Builds keyed snapshots from raw provider output.
#[derive(Debug, Default)]
pub struct IdentityExtractor {
    duplicates: usize,
}

impl IdentityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of duplicate keys re-keyed by this extractor so far.
    pub fn duplicates_seen(&self) -> usize {
        self.duplicates
    }

    /// Pair every item with its key, preserving order.
    ///
    /// Items sharing a key within one snapshot are unsupported input: the
    /// first occurrence keeps the key and each later one is given a
    /// generated key.
    pub fn extract(&mut self, items: impl IntoIterator<Item = Value>) -> Snapshot {
        let mut seen: HashSet<Key> = HashSet::new();
        let mut entries = Vec::new();
        for item in items {
            let key = match identify(&item) {
                Identity::Keyed(key) if seen.contains(&key) => {
                    self.duplicates += 1;
                    tracing::warn!(
                        component = module_path!(),
                        key = %key,
                        "duplicate key in snapshot; item re-keyed"
                    );
                    Key::generate()
                }
                Identity::Keyed(key) => key,
                Identity::Unkeyed => Key::generate(),
            };
            seen.insert(key.clone());
            entries.push((key, item));
        }
        Snapshot::from_entries_unchecked(entries)
    }
}
