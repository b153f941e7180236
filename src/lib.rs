//! Bounds-driven cursors over the ordered indexes of a document store.
//!
//! An [`idx::IndexCursor`] scans the keys of a single index between a set
//! of bounds, fetching rows from the storage engine in growing batches. Keys
//! falling into gaps between bound intervals are skipped by repositioning
//! the engine, rather than by reading through the gap.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cnf;
pub mod ctx;
pub mod err;
pub mod idx;
pub mod key;
pub mod kvs;
