//! SeqObs Core - observe-sequence engine
//!
//! This crate turns a reactively recomputed sequence provider into a stream
//! of canonical add/change/remove/move events, including:
//! - Identity extraction for structured records and unkeyed scalars
//! - Snapshot diffing with a minimal set of moves
//! - Live source bridging for collections that report their own changes
//! - The observation controller that switches between the two across
//!   recomputations
//! - A small dependency tracker and an in-memory live source to drive it

pub mod bridge;
pub mod controller;
pub mod diff;
pub mod errors;
pub mod identity;
pub mod logging_facility;
pub mod model;
pub mod reactive;
pub mod source;

// Re-export commonly used types
pub use bridge::LiveSourceBridge;
pub use controller::{
    observe, observe_with_options, NoCallbacks, ObserveHandle, ObserveOptions, OutputKind, Phase,
    SequenceCallbacks, SequenceOutput, StopHandle,
};
pub use errors::{ExError, ExErrorKind, Result, SeqObsError};
pub use identity::{ChangePolicy, IdentityExtractor, Key};
pub use model::{RenderedState, SequenceEvent, Snapshot};
pub use reactive::{Computation, ComputationContext, Dependency, ReactiveVar, Tracker};
pub use source::{LiveSource, MemorySource, SourceNotification, SourceSubscription};
