pub mod event;
pub mod rendered;
pub mod snapshot;

pub use event::SequenceEvent;
pub use rendered::RenderedState;
pub use snapshot::Snapshot;
