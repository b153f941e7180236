//! The storage engine boundary.
//!
//! Cursors reach storage only through the [`IndexHandle`] and
//! [`EngineCursor`] traits. The in-memory engine is the reference
//! implementation of both.
pub mod api;
#[cfg(feature = "kv-mem")]
pub mod mem;

pub use self::api::{EngineCursor, FetchOutcome, FetchRequest, IndexHandle, IndexKind, Row, RowCallback};
