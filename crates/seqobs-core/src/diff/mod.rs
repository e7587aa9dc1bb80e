//! Snapshot differ.
//!
//! Turns the rendered state and a freshly materialized snapshot into the
//! ordered list of canonical events that carries one into the other.
//!
//! ## Entry point
//!
//! ```ignore
//! use seqobs_core::diff::diff;
//!
//! let events = diff(&rendered, &snapshot, ChangePolicy::Always)?;
//! ```
//!
//! ## Guarantees
//!
//! - **Phase order**: removals (old order), additions, changes and moves
//!   (new order), never interleaved.
//! - **Consistent indices**: every index and before-key is computed against
//!   the state left by the preceding event.
//! - **Minimal moves**: the number of `moved_to` events equals the number of
//!   surviving keys minus the longest run already in agreeing order.

pub mod engine;
pub mod lis;

pub use engine::diff;
pub use lis::longest_increasing_subsequence;
