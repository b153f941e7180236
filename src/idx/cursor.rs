use std::collections::HashSet;
use std::fmt::{self, Display};
use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use serde_json::json;

use crate::cnf::{INTERRUPT_CHECK_BATCHES, ROW_BUFFER_PREFERRED_SIZE};
use crate::ctx::Context;
use crate::err::{Error, Result};
use crate::idx::buffer::RowBuffer;
use crate::idx::factory::CursorConfig;
use crate::idx::iterator::Classification;
use crate::idx::strategy::{MaterializationMode, ScanStrategy};
use crate::key::{Direction, IndexKey, SeekKey, Value};
use crate::kvs::{EngineCursor, FetchOutcome, FetchRequest, IndexHandle, IndexKind, Row};

const TARGET: &str = "idxcursor::idx::cursor";

/// Why a cursor stopped producing rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Exhaustion {
	/// The engine ran out of rows. A tailable cursor may find more later.
	EndOfData,
	/// No further key can lie within bounds.
	Bounds,
}

/// Why a bulk fetch stopped before the engine did.
enum Halt {
	Skip(SeekKey),
	Bounds,
	Unsafe(IndexKey),
}

/// The state an [`IndexCursor`] carries between calls.
#[derive(Debug, Default)]
pub struct CursorState {
	/// The row the cursor is positioned on
	current: Option<Row>,
	/// The scan direction
	direction: Direction,
	/// Whether rows must be deduplicated by primary key
	multikey: bool,
	/// The primary keys returned by a secondary scan
	dups: HashSet<Value, ahash::RandomState>,
	/// Whether the cursor waits for new rows at the end of the scan
	tailable: bool,
	/// The tailing watermark, refreshed before each fetch of a tailable cursor
	min_unsafe_key: Option<IndexKey>,
	/// The number of rows delivered by the engine
	nscanned: u64,
}

impl CursorState {
	pub fn current_key(&self) -> Option<&IndexKey> {
		self.current.as_ref().map(|r| &r.key)
	}

	pub fn current_pk(&self) -> Option<&Value> {
		self.current.as_ref().map(|r| &r.key.pk)
	}

	/// The document of the current row, if it has been materialized.
	pub fn current_doc(&self) -> Option<&Bytes> {
		self.current.as_ref().and_then(|r| r.doc.as_ref())
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	pub fn is_multikey(&self) -> bool {
		self.multikey
	}

	pub fn is_tailable(&self) -> bool {
		self.tailable
	}

	pub fn min_unsafe_key(&self) -> Option<&IndexKey> {
		self.min_unsafe_key.as_ref()
	}

	pub fn nscanned(&self) -> u64 {
		self.nscanned
	}

	/// The number of distinct primary keys recorded by a secondary scan.
	pub fn seen(&self) -> usize {
		self.dups.len()
	}
}

/// A cursor over the keys of a single index, restricted to a set of bounds.
///
/// Rows are fetched from the engine in batches of growing size and buffered.
/// Each fetched key is classified against the bounds: keys in bounds are
/// buffered, a key in a gap between intervals repositions the engine past
/// the gap, and the first key past the bounds ends the scan.
pub struct IndexCursor {
	/// The index being scanned
	index: Arc<dyn IndexHandle>,
	/// The engine cursor, absent when the bounds admit no key
	engine: Option<Box<dyn EngineCursor>>,
	/// The bounds and fetch policy for this scan
	strategy: ScanStrategy,
	/// Rows fetched but not yet consumed
	buffer: RowBuffer,
	/// The cursor state record
	state: CursorState,
	/// Set once no more rows can be fetched
	exhausted: Option<Exhaustion>,
	/// Where the engine must be repositioned before the next fetch
	pending: Option<SeekKey>,
	/// The last in-bounds key the engine delivered
	last: Option<IndexKey>,
	/// The number of fetch batches run so far
	batches: u64,
	/// Whether the scanned range was locked up front
	prelocked: bool,
	/// Whether delivered rows are locked for a later write
	for_update: bool,
	/// The bounds rendering reported by explain
	bounds: serde_json::Value,
}

impl IndexCursor {
	pub(crate) fn new(
		index: Arc<dyn IndexHandle>,
		engine: Option<Box<dyn EngineCursor>>,
		strategy: ScanStrategy,
		config: &CursorConfig,
	) -> Self {
		let multikey = index.kind() != IndexKind::Primary && index.is_multikey();
		let (exhausted, pending) = if strategy.bounds.is_empty() || engine.is_none() {
			(Some(Exhaustion::Bounds), None)
		} else {
			(None, Some(strategy.bounds.start()))
		};
		IndexCursor {
			index,
			engine,
			strategy,
			buffer: RowBuffer::new(*ROW_BUFFER_PREFERRED_SIZE),
			state: CursorState {
				direction: config.direction,
				multikey,
				tailable: config.tailable,
				..CursorState::default()
			},
			exhausted,
			pending,
			last: None,
			batches: 0,
			prelocked: config.prelock,
			for_update: config.for_update,
			bounds: config.bounds.explain(),
		}
	}

	/// Move to the next row, returning `false` once the scan is over.
	///
	/// For a tailable cursor, running out of rows is not final: the next
	/// call refreshes the watermark and looks for rows added since.
	pub async fn advance(&mut self, ctx: &Context) -> Result<bool> {
		self.state.current = None;
		let mut retried = false;
		loop {
			while self.buffer.next() {
				let Some(row) = self.buffer.take_current() else {
					break;
				};
				if !self.is_safe(&row.key) {
					trace!(target: TARGET, "{self}: returning {} to the engine, past the watermark", row.key);
					self.pending = Some(SeekKey::to(&row.key));
					self.buffer.empty();
					self.exhausted = Some(Exhaustion::EndOfData);
					break;
				}
				if self.returned_before(&row.key.pk) {
					trace!(target: TARGET, "{self}: skipping duplicate of {}", row.key.pk);
					continue;
				}
				self.state.current = Some(row);
				return Ok(true);
			}
			match self.exhausted {
				Some(Exhaustion::EndOfData) if self.state.tailable && !retried => {
					retried = true;
					self.exhausted = None;
					if self.pending.is_none() {
						self.pending = Some(match &self.last {
							Some(key) => SeekKey::after(key),
							None => self.strategy.bounds.start(),
						});
					}
				}
				Some(_) => return Ok(false),
				None => (),
			}
			self.fetch_more_rows(ctx).await?;
		}
	}

	/// Refill the row buffer from the engine.
	async fn fetch_more_rows(&mut self, ctx: &Context) -> Result<()> {
		self.buffer.empty();
		let name = self.index.name().to_owned();
		if self.strategy.wants_values() && self.index.kind() != IndexKind::Primary {
			let multikey = self.index.is_multikey();
			if multikey && !self.state.multikey {
				debug!(target: TARGET, "{self}: index is now multikey");
			}
			self.state.multikey = multikey;
		}
		if self.state.tailable {
			self.state.min_unsafe_key = self.index.min_unsafe_key().await?;
			if let Some(key) = &self.state.min_unsafe_key {
				trace!(target: TARGET, "{name}: tailing up to {key}");
			}
		}
		let request = FetchRequest {
			limit: 0,
			direction: self.state.direction,
			values: self.strategy.wants_values(),
			prelocked: self.prelocked,
			for_update: self.for_update,
		};
		loop {
			self.batches += 1;
			let deep = (self.batches - 1) % (*INTERRUPT_CHECK_BATCHES).max(1) == 0;
			if let Some(reason) = ctx.done(deep) {
				debug!(target: TARGET, "{name}: scan interrupted: {reason}");
				return Err(reason.into());
			}
			let Some(engine) = self.engine.as_mut() else {
				self.exhausted = Some(Exhaustion::Bounds);
				return Ok(());
			};
			if let Some(target) = self.pending.take() {
				trace!(target: TARGET, "{name}: seeking to {target}");
				engine.seek(&target, request.direction).await?;
			}
			let request = FetchRequest {
				limit: self.strategy.fetch.next_hint(),
				..request
			};
			let ordering = self.index.ordering();
			let buffer = &mut self.buffer;
			let bounds = &mut self.strategy.bounds;
			let state = &mut self.state;
			let last = &mut self.last;
			let mut halt = None;
			let mut delivered = 0u64;
			let mut each = |row: Row| {
				state.nscanned += 1;
				delivered += 1;
				if let Some(watermark) = &state.min_unsafe_key {
					if ordering.compare_keys(&row.key, watermark).is_ge() {
						halt = Some(Halt::Unsafe(row.key));
						return ControlFlow::Break(());
					}
				}
				*last = Some(row.key.clone());
				match bounds.advance(&row.key) {
					Classification::InBounds => {
						buffer.append(row.key, row.doc);
						if buffer.is_gorged() {
							ControlFlow::Break(())
						} else {
							ControlFlow::Continue(())
						}
					}
					Classification::Skip(target) => {
						halt = Some(Halt::Skip(target));
						ControlFlow::Break(())
					}
					Classification::Exhausted => {
						halt = Some(Halt::Bounds);
						ControlFlow::Break(())
					}
				}
			};
			let outcome = engine.fetch(&request, &mut each).await?;
			trace!(target: TARGET, "{name}: fetched {delivered} rows of {}", request.limit);
			match halt {
				Some(Halt::Skip(target)) => {
					self.pending = Some(target);
					if self.buffer.is_empty() {
						continue;
					}
				}
				Some(Halt::Bounds) => {
					debug!(target: TARGET, "{name}: reached the end of the bounds");
					self.exhausted = Some(Exhaustion::Bounds);
				}
				Some(Halt::Unsafe(key)) => {
					trace!(target: TARGET, "{name}: stopped at {key}, past the watermark");
					self.pending = Some(SeekKey::to(&key));
					self.exhausted = Some(Exhaustion::EndOfData);
				}
				None if outcome == FetchOutcome::EndOfData || delivered == 0 => {
					self.exhausted = Some(Exhaustion::EndOfData);
				}
				None => (),
			}
			return Ok(());
		}
	}

	/// Record a primary key about to be returned, checking whether it was
	/// returned before. Secondary scans record from the first row, so that
	/// an index which becomes multikey mid-scan still never repeats a
	/// document.
	fn returned_before(&mut self, pk: &Value) -> bool {
		if self.index.kind() == IndexKind::Primary || !self.strategy.wants_values() {
			return false;
		}
		let fresh = self.state.dups.insert(pk.clone());
		self.state.multikey && !fresh
	}

	fn is_safe(&self, key: &IndexKey) -> bool {
		match &self.state.min_unsafe_key {
			Some(watermark) if self.state.tailable => {
				self.index.ordering().compare_keys(key, watermark).is_lt()
			}
			_ => true,
		}
	}

	/// Check if the cursor is positioned on a row.
	pub fn ok(&self) -> bool {
		self.state.current.is_some()
	}

	/// Check if the cursor has run out of rows.
	pub fn eof(&self) -> bool {
		!self.ok()
	}

	/// The document of the current row.
	///
	/// Rows of a secondary index carry no document, so the first call for
	/// each row reads it through the primary index.
	pub async fn current(&mut self) -> Result<&Bytes> {
		ensure!(self.strategy.mode() == MaterializationMode::Full, Error::CountOnlyDocument);
		let Some(row) = self.state.current.as_mut() else {
			return Err(Error::CursorUnpositioned);
		};
		if row.doc.is_none() {
			match self.index.lookup(&row.key.pk).await? {
				Some(doc) => row.doc = Some(doc),
				None => {
					return Err(Error::Ds(format!(
						"Index '{}' refers to the missing document {}",
						self.index.name(),
						row.key.pk
					)));
				}
			}
		}
		row.doc.as_ref().ok_or_else(|| Error::Unreachable("IndexCursor::current".to_owned()))
	}

	/// The key of the current row.
	pub fn curr_key(&self) -> Result<&IndexKey> {
		self.state.current_key().ok_or(Error::CursorUnpositioned)
	}

	/// The primary key of the current row.
	pub fn curr_pk(&self) -> Result<&Value> {
		self.state.current_pk().ok_or(Error::CursorUnpositioned)
	}

	/// The number of rows the engine has delivered to this cursor,
	/// including rows outside the bounds.
	pub fn nscanned(&self) -> u64 {
		self.state.nscanned
	}

	/// Keep this cursor open at the end of the scan, so that rows added
	/// later can be read.
	pub fn set_tailable(&mut self) -> Result<()> {
		ensure!(self.state.direction.is_forward(), Error::TailableBackward);
		ensure!(
			!self.prelocked,
			Error::InvalidConfig("a prelocked cursor can not be tailable".to_owned())
		);
		self.state.tailable = true;
		Ok(())
	}

	pub fn tailable(&self) -> bool {
		self.state.tailable
	}

	pub fn is_multikey(&self) -> bool {
		self.state.multikey
	}

	/// Record that the document with primary key `pk` has been seen,
	/// returning whether it had been seen before. Nothing is recorded for
	/// scans over indexes which are not multikey.
	pub fn observe_and_check_duplicate(&mut self, pk: &Value) -> bool {
		if !self.state.multikey {
			return false;
		}
		!self.state.dups.insert(pk.clone())
	}

	/// Called before the document with primary key `pk` is deleted or moved.
	///
	/// Buffered rows of the document are dropped. When the cursor is
	/// positioned on the document, it is materialized so that it can still
	/// be read, or the cursor advances if it is already gone.
	pub async fn invalidate(&mut self, ctx: &Context, pk: &Value) -> Result<()> {
		let dropped = self.buffer.discard(pk);
		if dropped > 0 {
			trace!(target: TARGET, "{self}: dropped {dropped} buffered rows of {pk}");
		}
		if self.strategy.mode() == MaterializationMode::CountOnly {
			return Ok(());
		}
		let Some(row) = self.state.current.as_mut() else {
			return Ok(());
		};
		if &row.key.pk != pk || row.doc.is_some() {
			return Ok(());
		}
		match self.index.lookup(pk).await? {
			Some(doc) => {
				row.doc = Some(doc);
				Ok(())
			}
			None => {
				debug!(target: TARGET, "{self}: document {pk} vanished, advancing");
				self.advance(ctx).await.map(|_| ())
			}
		}
	}

	/// Count the rows remaining after the current one, leaving the cursor
	/// exhausted.
	pub async fn count(&mut self, ctx: &Context) -> Result<u64> {
		let mut count = 0;
		while self.advance(ctx).await? {
			count += 1;
		}
		Ok(count)
	}

	/// Describe this cursor and the work it has done.
	pub fn explain(&self) -> serde_json::Value {
		json!({
			"cursor": self.to_string(),
			"index": self.index.name(),
			"kind": self.strategy.kind(),
			"mode": self.strategy.mode(),
			"direction": self.state.direction,
			"isMultiKey": self.state.multikey,
			"tailable": self.state.tailable,
			"indexBounds": self.bounds,
			"nscanned": self.state.nscanned,
			"exhausted": self.exhausted,
		})
	}

	/// The cursor state record.
	pub fn state(&self) -> &CursorState {
		&self.state
	}

	/// Turn this cursor into a stream of keys and documents.
	pub fn into_stream(self, ctx: Context) -> impl Stream<Item = Result<(IndexKey, Bytes)>> {
		futures::stream::try_unfold((self, ctx), |(mut cursor, ctx)| async move {
			if !cursor.advance(&ctx).await? {
				return Ok(None);
			}
			let key = cursor.curr_key()?.clone();
			let doc = cursor.current().await?.clone();
			Ok(Some(((key, doc), (cursor, ctx))))
		})
	}
}

impl Display for IndexCursor {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "IndexCursor {}", self.index.name())?;
		if !self.state.direction.is_forward() {
			f.write_str(" reverse")?;
		}
		if self.state.multikey {
			f.write_str(" multi")?;
		}
		Ok(())
	}
}
