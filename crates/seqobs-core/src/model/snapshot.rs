use crate::identity::{IdentityExtractor, Key};
use serde_json::Value;

/// An ordered list of `(key, item)` pairs with unique keys.
///
/// Snapshots are produced fresh each time a source is read and are never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(Key, Value)>,
}

impl Snapshot {
    /// The empty snapshot (what a `Null` provider output materializes to).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extract keys from raw items.
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        IdentityExtractor::new().extract(items)
    }

    /// Caller guarantees the keys are unique.
    pub(crate) fn from_entries_unchecked(entries: Vec<(Key, Value)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(Key, Value)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn items(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = (Key, Value);
    type IntoIter = std::vec::IntoIter<(Key, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
