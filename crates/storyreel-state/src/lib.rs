//! Job state store for progressive story generation.
//!
//! This crate provides:
//! - `JobStore`: concurrency-safe story/scene records, optionally persisted
//!   as one JSON document per story
//! - `StatusQuery`: read-only projections for polling clients

pub mod error;
pub mod persistence;
pub mod status;
pub mod store;

pub use error::{StateError, StateResult};
pub use persistence::StoryRecord;
pub use status::StatusQuery;
pub use store::{JobStore, INTERRUPTED_REASON};
