//! Index cursors.
//!
//! A cursor is opened with [`factory::make`] and walks the keys of one
//! index within a set of [`bounds::Bounds`], in either direction.
pub mod bounds;
pub mod buffer;
pub mod cursor;
pub mod factory;
pub mod iterator;
pub mod strategy;

pub use self::cursor::{CursorState, Exhaustion, IndexCursor};
pub use self::factory::{CursorConfig, make};
