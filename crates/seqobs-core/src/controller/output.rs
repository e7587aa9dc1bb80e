use crate::source::LiveSource;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// What a sequence provider returns on each run.
#[derive(Clone)]
pub enum SequenceOutput {
    /// Nothing; renders as an empty sequence.
    Null,
    /// A fully materialized ordered collection.
    Snapshot(Vec<Value>),
    /// A live source that reports its own changes.
    Source(Rc<dyn LiveSource>),
}

impl SequenceOutput {
    pub fn items(items: impl IntoIterator<Item = Value>) -> Self {
        SequenceOutput::Snapshot(items.into_iter().collect())
    }

    pub fn source(source: impl LiveSource + 'static) -> Self {
        SequenceOutput::Source(Rc::new(source))
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            SequenceOutput::Null => OutputKind::Null,
            SequenceOutput::Snapshot(_) => OutputKind::Snapshot,
            SequenceOutput::Source(_) => OutputKind::Source,
        }
    }
}

impl From<Vec<Value>> for SequenceOutput {
    fn from(items: Vec<Value>) -> Self {
        SequenceOutput::Snapshot(items)
    }
}

impl From<Option<Vec<Value>>> for SequenceOutput {
    fn from(items: Option<Vec<Value>>) -> Self {
        items.map_or(SequenceOutput::Null, SequenceOutput::Snapshot)
    }
}

impl fmt::Debug for SequenceOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceOutput::Null => f.write_str("Null"),
            SequenceOutput::Snapshot(items) => f.debug_tuple("Snapshot").field(items).finish(),
            SequenceOutput::Source(source) => f
                .debug_tuple("Source")
                .field(&source.id().to_string())
                .finish(),
        }
    }
}

/// Classification of a provider output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Null,
    Snapshot,
    Source,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Null => "null",
            OutputKind::Snapshot => "snapshot",
            OutputKind::Source => "source",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
