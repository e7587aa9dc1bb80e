//! In-memory live source.

use crate::errors::{Result, SeqObsError};
use crate::identity::{key_of, Key, ID_FIELD};
use crate::source::{LiveSource, NotificationSink, SourceNotification, SourceSubscription};
use seqobs_core_types::SourceId;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// An ordered collection of JSON documents that notifies observers of every
/// change.
///
/// Documents are kept sorted by `_id`, or by a single field when built with
/// [`MemorySource::sorted_by`]; ties are broken by key. Clones share the same
/// collection and the same [`SourceId`].
///
/// Not thread-safe (`Rc`/`RefCell`); designed for single-threaded use.
#[derive(Clone)]
pub struct MemorySource {
    inner: Rc<Inner>,
}

struct Inner {
    id: SourceId,
    sort_by: Option<String>,
    docs: RefCell<Vec<(Key, Value)>>,
    observers: RefCell<Vec<(u64, NotificationSink)>>,
    next_observer: Cell<u64>,
}

impl MemorySource {
    /// Create an empty source ordered by `_id`
    pub fn new() -> Self {
        Self::with_order(None)
    }

    /// Create an empty source ordered by `field`
    pub fn sorted_by(field: impl Into<String>) -> Self {
        Self::with_order(Some(field.into()))
    }

    fn with_order(sort_by: Option<String>) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: SourceId::next(),
                sort_by,
                docs: RefCell::new(Vec::new()),
                observers: RefCell::new(Vec::new()),
                next_observer: Cell::new(0),
            }),
        }
    }

    /// Field the documents are ordered by, if not `_id`
    pub fn sort_field(&self) -> Option<&str> {
        self.inner.sort_by.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.docs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.docs.borrow().is_empty()
    }

    /// Keys in current order
    pub fn keys(&self) -> Vec<Key> {
        self.inner
            .docs
            .borrow()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.inner
            .docs
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, doc)| doc.clone())
    }

    /// Insert a document
    ///
    /// A document without `_id` (or with a `null` one) is given a fresh
    /// UUID string id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItem` if `doc` is not a JSON object, or `DuplicateKey`
    /// if a document with the same id is already present.
    pub fn insert(&self, doc: Value) -> Result<Key> {
        let mut fields = match doc {
            Value::Object(fields) => fields,
            other => {
                return Err(SeqObsError::InvalidItem {
                    reason: format!("documents must be JSON objects, got {}", other),
                })
            }
        };
        if fields.get(ID_FIELD).map_or(true, Value::is_null) {
            fields.insert(
                ID_FIELD.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        let doc = Value::Object(fields);
        let key = key_of(&doc).ok_or_else(|| SeqObsError::Internal {
            message: "document lost its _id".to_string(),
        })?;

        let notification = {
            let mut docs = self.inner.docs.borrow_mut();
            if docs.iter().any(|(k, _)| *k == key) {
                return Err(SeqObsError::DuplicateKey {
                    key: key.to_string(),
                });
            }
            let at_index = self.insertion_point(&docs, &key, &doc);
            let before = docs.get(at_index).map(|(k, _)| k.clone());
            docs.insert(at_index, (key.clone(), doc.clone()));
            SourceNotification::AddedAt {
                id: key.clone(),
                item: doc,
                at_index,
                before,
            }
        };
        self.notify(vec![notification]);
        Ok(key)
    }

    /// Insert every document of `docs`, in order
    ///
    /// # Errors
    ///
    /// Stops at the first document [`MemorySource::insert`] rejects.
    pub fn extend(&self, docs: impl IntoIterator<Item = Value>) -> Result<Vec<Key>> {
        docs.into_iter().map(|doc| self.insert(doc)).collect()
    }

    /// Modify a document in place
    ///
    /// Observers see `changed` if the document differs afterwards, followed by
    /// `moved_to` if its sorted position changed.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` for an unknown key, or `ImmutableIdentity` if
    /// `f` altered `_id` (nothing is committed in that case).
    pub fn update(&self, key: &Key, f: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let notifications = {
            let mut docs = self.inner.docs.borrow_mut();
            let from_index = docs
                .iter()
                .position(|(k, _)| k == key)
                .ok_or_else(|| SeqObsError::ItemNotFound {
                    key: key.to_string(),
                })?;
            let old_doc = docs[from_index].1.clone();
            let mut fields = match &old_doc {
                Value::Object(fields) => fields.clone(),
                _ => Map::new(),
            };
            f(&mut fields);
            let new_doc = Value::Object(fields);
            if key_of(&new_doc).as_ref() != Some(key) {
                return Err(SeqObsError::ImmutableIdentity {
                    key: key.to_string(),
                });
            }
            if new_doc == old_doc {
                return Ok(());
            }

            docs.remove(from_index);
            let to_index = self.insertion_point(&docs, key, &new_doc);
            let before = docs.get(to_index).map(|(k, _)| k.clone());
            docs.insert(to_index, (key.clone(), new_doc.clone()));

            let mut out = vec![SourceNotification::Changed {
                id: key.clone(),
                new_item: new_doc.clone(),
                old_item: old_doc,
            }];
            if to_index != from_index {
                out.push(SourceNotification::MovedTo {
                    id: key.clone(),
                    item: new_doc,
                    from_index,
                    to_index,
                    before,
                });
            }
            out
        };
        self.notify(notifications);
        Ok(())
    }

    /// Set a single field of a document
    ///
    /// # Errors
    ///
    /// As [`MemorySource::update`].
    pub fn set_field(&self, key: &Key, field: &str, value: Value) -> Result<()> {
        let field = field.to_string();
        self.update(key, move |fields| {
            fields.insert(field, value);
        })
    }

    /// Remove a document, returning it
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` for an unknown key.
    pub fn remove(&self, key: &Key) -> Result<Value> {
        let doc = {
            let mut docs = self.inner.docs.borrow_mut();
            let index = docs
                .iter()
                .position(|(k, _)| k == key)
                .ok_or_else(|| SeqObsError::ItemNotFound {
                    key: key.to_string(),
                })?;
            docs.remove(index).1
        };
        self.notify(vec![SourceNotification::Removed {
            id: key.clone(),
            item: doc.clone(),
        }]);
        Ok(doc)
    }

    /// Number of live `observe` registrations
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    fn insertion_point(&self, docs: &[(Key, Value)], key: &Key, doc: &Value) -> usize {
        let probe = self.sort_value(doc);
        docs.partition_point(|(k, d)| {
            compare_json(&self.sort_value(d), &probe).then_with(|| k.cmp(key)) == Ordering::Less
        })
    }

    fn sort_value(&self, doc: &Value) -> Value {
        let field = self.inner.sort_by.as_deref().unwrap_or(ID_FIELD);
        doc.get(field).cloned().unwrap_or(Value::Null)
    }

    fn notify(&self, notifications: Vec<SourceNotification>) {
        let sinks: Vec<(u64, NotificationSink)> = self
            .inner
            .observers
            .borrow()
            .iter()
            .map(|(handle, sink)| (*handle, Rc::clone(sink)))
            .collect();
        for notification in notifications {
            for (handle, sink) in &sinks {
                // Skip observers that unsubscribed during this delivery.
                if !self.is_observing(*handle) {
                    continue;
                }
                sink(notification.clone());
            }
        }
    }

    fn is_observing(&self, handle: u64) -> bool {
        self.inner
            .observers
            .borrow()
            .iter()
            .any(|(h, _)| *h == handle)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("id", &self.inner.id)
            .field("sort_by", &self.inner.sort_by)
            .field("len", &self.len())
            .finish()
    }
}

impl LiveSource for MemorySource {
    fn id(&self) -> SourceId {
        self.inner.id
    }

    fn snapshot(&self) -> Vec<Value> {
        self.inner
            .docs
            .borrow()
            .iter()
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    fn observe(&self, sink: NotificationSink) -> SourceSubscription {
        let handle = self.inner.next_observer.get();
        self.inner.next_observer.set(handle + 1);
        self.inner.observers.borrow_mut().push((handle, sink));

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        SourceSubscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|(h, _)| *h != handle);
            }
        })
    }
}

/// Total order over JSON values: null < bool < number < string < array <
/// object.
pub fn compare_json(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_json(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_json(lv, rv)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}
