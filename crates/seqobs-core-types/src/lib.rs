//! Core types shared across seqobs facilities
//!
//! This crate provides foundational types used by the engine, its error
//! facility and its logging facility:
//!
//! - **Correlation types**: ObservationId, SourceId
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{ObservationId, SourceId};
