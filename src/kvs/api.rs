//! This module defines the API between index cursors and a storage engine.
use std::ops::ControlFlow;

use bytes::Bytes;
use serde::Serialize;

use crate::err::Result;
use crate::key::{Direction, IndexKey, Ordering, SeekKey, Value};

pub mod requirements {
	//! Allows the `Send` requirement on engine handles to be dropped for
	//! WASM targets, where there is no `cfg` support for trait bounds.

	/// This trait defines WASM requirements for an engine handle.
	#[cfg(target_family = "wasm")]
	pub trait EngineRequirements {}

	#[cfg(target_family = "wasm")]
	impl<T> EngineRequirements for T {}

	/// This trait defines non-WASM requirements for an engine handle.
	#[cfg(not(target_family = "wasm"))]
	pub trait EngineRequirements: Send {}

	#[cfg(not(target_family = "wasm"))]
	impl<T: Send> EngineRequirements for T {}
}

/// The kind of an index, which decides where rows find their documents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
	/// The primary key index. Rows carry the full document.
	Primary,
	/// A secondary index which stores a copy of the full document.
	Clustering,
	/// A secondary index whose rows only carry a key. Documents are read
	/// separately through the primary index.
	Secondary,
}

impl IndexKind {
	/// Check if rows of this index carry the full document.
	pub fn is_clustering(&self) -> bool {
		matches!(self, IndexKind::Primary | IndexKind::Clustering)
	}
}

/// A single row delivered by an engine cursor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row {
	pub key: IndexKey,
	pub doc: Option<Bytes>,
}

/// A request for a bulk fetch of rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchRequest {
	/// The maximum number of rows to deliver
	pub limit: u32,
	/// The direction to move in
	pub direction: Direction,
	/// Whether documents should be delivered along with keys
	pub values: bool,
	/// Whether the scanned range is already locked
	pub prelocked: bool,
	/// Whether delivered rows should be locked for a later write
	pub for_update: bool,
}

/// The state of an engine cursor after a bulk fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchOutcome {
	/// The fetch stopped early, because either the row limit was reached or
	/// the consumer asked to stop. More rows may follow.
	More,
	/// The engine cursor ran out of rows in its direction.
	EndOfData,
}

/// The consumer of a bulk fetch. Returning [`ControlFlow::Break`] stops the
/// fetch after the row which was just delivered.
#[cfg(not(target_family = "wasm"))]
pub type RowCallback<'a> = dyn FnMut(Row) -> ControlFlow<()> + Send + 'a;

#[cfg(target_family = "wasm")]
pub type RowCallback<'a> = dyn FnMut(Row) -> ControlFlow<()> + 'a;

/// This trait defines the API for an index of a storage engine.
#[cfg_attr(target_family = "wasm", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_family = "wasm"), async_trait::async_trait)]
pub trait IndexHandle: requirements::EngineRequirements + Sync {
	/// The name of this index.
	fn name(&self) -> &str;

	/// The kind of this index.
	fn kind(&self) -> IndexKind;

	/// The key pattern of this index.
	fn ordering(&self) -> &Ordering;

	/// Check if some document has produced more than one key in this index.
	///
	/// An index may become multikey while a cursor over it is open, so this
	/// is read again at the start of every fetch batch.
	fn is_multikey(&self) -> bool;

	/// Open an engine cursor over this index.
	async fn cursor(&self) -> Result<Box<dyn EngineCursor>>;

	/// Fetch the full document with primary key `pk`.
	async fn lookup(&self, pk: &Value) -> Result<Option<Bytes>>;

	/// The smallest key which may still belong to an uncommitted write.
	/// Tailable cursors never expose rows at or past this key.
	async fn min_unsafe_key(&self) -> Result<Option<IndexKey>> {
		Ok(None)
	}
}

/// This trait defines the API for a positioned cursor of a storage engine.
///
/// A fetch continues from the position left by the last seek, or from the
/// row after the last row delivered. An engine cursor which has not been
/// positioned starts from the first row in the fetch direction.
#[cfg_attr(target_family = "wasm", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_family = "wasm"), async_trait::async_trait)]
pub trait EngineCursor: requirements::EngineRequirements {
	/// Reposition this cursor at the first row admitted by `target` when
	/// moving in `direction`.
	async fn seek(&mut self, target: &SeekKey, direction: Direction) -> Result<()>;

	/// Deliver up to `request.limit` rows to `each`.
	async fn fetch(
		&mut self,
		request: &FetchRequest,
		each: &mut RowCallback<'_>,
	) -> Result<FetchOutcome>;

	/// Lock the whole range between two positions up front.
	async fn prelock(&mut self, from: &SeekKey, to: &SeekKey) -> Result<()>;
}
