//! Minimal dependency tracking.
//!
//! A [`Tracker`] runs computations, records which [`Dependency`] values they
//! read through their [`ComputationContext`], and reruns invalidated
//! computations when [`Tracker::flush`] is called. Nothing reruns on its own:
//! the flush is the only scheduling point.
//!
//! ```ignore
//! let tracker = Tracker::new();
//! let count = ReactiveVar::new(1);
//! let c = count.clone();
//! let computation = tracker.enter(move |cx| {
//!     println!("count = {}", c.get(cx));
//!     Ok(())
//! })?;
//! count.set(2);
//! tracker.flush()?; // prints "count = 2"
//! ```

pub mod tracker;
pub mod var;

pub use tracker::{Computation, ComputationContext, Dependency, Tracker};
pub use var::ReactiveVar;
