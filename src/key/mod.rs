//! How index keys are represented and ordered.
//!
//! Byte-level key encoding belongs to the storage engine. Cursors only see
//! decoded keys: a tuple of field [`Value`]s compared under the index
//! [`Ordering`], with the primary key appended.
pub use self::index::*;
pub use self::ordering::*;
pub use self::value::*;

mod index;
mod ordering;
mod value;
