#![cfg(feature = "kv-mem")]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::err::{Error, Result};
use crate::key::{Direction, IndexKey, Ordering, SeekKey, Value};
use crate::kvs::api::{EngineCursor, FetchOutcome, FetchRequest, IndexHandle, IndexKind, Row, RowCallback};

const TARGET: &str = "idxcursor::kvs::mem";

type Documents = HashMap<Value, Bytes, ahash::RandomState>;

/// Counters describing the work an index has been asked to do.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineStats {
	/// The number of bulk fetch calls
	pub fetches: u64,
	/// The number of repositioning calls
	pub seeks: u64,
	/// The number of rows delivered to cursors
	pub rows: u64,
	/// The row limit requested by each bulk fetch, in order
	pub hints: Vec<u32>,
	/// The number of rows locked individually
	pub row_locks: u64,
	/// The number of ranges locked up front
	pub range_locks: u64,
}

/// An in-memory document store with any number of ordered indexes.
#[derive(Default)]
pub struct Datastore {
	/// The documents, by primary key
	docs: Arc<RwLock<Documents>>,
	/// The indexes defined on this datastore
	indexes: RwLock<HashMap<String, Arc<MemIndex>, ahash::RandomState>>,
}

impl Datastore {
	pub fn new() -> Self {
		Datastore::default()
	}

	/// Define an index, replacing any existing index with the same name.
	pub fn define_index(&self, name: &str, kind: IndexKind, ordering: Ordering) -> Arc<MemIndex> {
		let ordering = match kind {
			IndexKind::Primary => Ordering::ascending(1),
			_ => ordering,
		};
		let index = Arc::new(MemIndex {
			inner: Arc::new(Inner {
				name: name.to_owned(),
				kind,
				ordering,
				docs: self.docs.clone(),
				keys: RwLock::new(Vec::new()),
				multikey: AtomicBool::new(false),
				generation: AtomicU64::new(0),
				min_unsafe: RwLock::new(None),
				stats: Mutex::new(EngineStats::default()),
			}),
		});
		if kind == IndexKind::Primary {
			for pk in self.docs.read().keys() {
				index.insert(vec![pk.clone()], pk.clone());
			}
		}
		debug!(target: TARGET, "Defined {kind:?} index '{name}'");
		self.indexes.write().insert(name.to_owned(), index.clone());
		index
	}

	/// Store a document. Every primary index receives a key for it, while
	/// secondary keys are added with [`MemIndex::insert`].
	pub fn insert(&self, pk: impl Into<Value>, doc: impl Into<Bytes>) {
		let pk = pk.into();
		self.docs.write().insert(pk.clone(), doc.into());
		for index in self.indexes.read().values() {
			if index.kind() == IndexKind::Primary {
				index.insert(vec![pk.clone()], pk.clone());
			}
		}
	}

	/// Remove a document along with every index key which refers to it.
	pub fn remove(&self, pk: &Value) -> Option<Bytes> {
		for index in self.indexes.read().values() {
			index.remove(pk);
		}
		self.docs.write().remove(pk)
	}
}

struct Inner {
	/// The name of this index
	name: String,
	/// The kind of this index
	kind: IndexKind,
	/// The key pattern of this index
	ordering: Ordering,
	/// The documents shared with the datastore
	docs: Arc<RwLock<Documents>>,
	/// The index keys, sorted under the key pattern
	keys: RwLock<Vec<IndexKey>>,
	/// Whether a document has produced more than one key
	multikey: AtomicBool,
	/// Bumped when the index is rebuilt, invalidating open cursors
	generation: AtomicU64,
	/// The smallest key which may belong to an uncommitted write
	min_unsafe: RwLock<Option<IndexKey>>,
	/// Counters for the work done on this index
	stats: Mutex<EngineStats>,
}

/// An ordered index held in memory.
pub struct MemIndex {
	inner: Arc<Inner>,
}

impl MemIndex {
	/// Add a single key for the document with primary key `pk`.
	pub fn insert(&self, fields: Vec<Value>, pk: impl Into<Value>) {
		let key = IndexKey::new(fields, pk.into());
		let mut keys = self.inner.keys.write();
		if let Err(i) = keys.binary_search_by(|k| self.inner.ordering.compare_keys(k, &key)) {
			keys.insert(i, key);
		}
	}

	/// Add every key generated for a document. A document with more than
	/// one key makes this index multikey.
	pub fn insert_keys(&self, keys: Vec<Vec<Value>>, pk: impl Into<Value>) {
		let pk = pk.into();
		if keys.len() > 1 && !self.inner.multikey.swap(true, AtomicOrdering::Relaxed) {
			debug!(target: TARGET, "Index '{}' is now multikey", self.inner.name);
		}
		for fields in keys {
			self.insert(fields, pk.clone());
		}
	}

	/// Remove every key referring to the document with primary key `pk`,
	/// returning how many were removed.
	pub fn remove(&self, pk: &Value) -> usize {
		let mut keys = self.inner.keys.write();
		let before = keys.len();
		keys.retain(|k| &k.pk != pk);
		before - keys.len()
	}

	/// Set the tailing watermark, or clear it with `None`.
	pub fn set_min_unsafe_key(&self, key: Option<IndexKey>) {
		*self.inner.min_unsafe.write() = key;
	}

	/// Rebuild this index. Cursors opened before the rebuild fail with
	/// [`Error::TxRetryable`] on their next engine call.
	pub fn recreate(&self) {
		self.inner.generation.fetch_add(1, AtomicOrdering::AcqRel);
	}

	pub fn len(&self) -> usize {
		self.inner.keys.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.keys.read().is_empty()
	}

	/// A snapshot of the work done on this index.
	pub fn stats(&self) -> EngineStats {
		self.inner.stats.lock().clone()
	}

	pub fn reset_stats(&self) {
		*self.inner.stats.lock() = EngineStats::default();
	}
}

#[cfg_attr(target_family = "wasm", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_family = "wasm"), async_trait::async_trait)]
impl IndexHandle for MemIndex {
	fn name(&self) -> &str {
		&self.inner.name
	}

	fn kind(&self) -> IndexKind {
		self.inner.kind
	}

	fn ordering(&self) -> &Ordering {
		&self.inner.ordering
	}

	fn is_multikey(&self) -> bool {
		self.inner.multikey.load(AtomicOrdering::Relaxed)
	}

	#[instrument(level = "trace", target = "idxcursor::kvs::api", skip(self), fields(index = %self.inner.name))]
	async fn cursor(&self) -> Result<Box<dyn EngineCursor>> {
		Ok(Box::new(MemCursor {
			generation: self.inner.generation.load(AtomicOrdering::Acquire),
			index: self.inner.clone(),
			position: None,
		}))
	}

	#[instrument(level = "trace", target = "idxcursor::kvs::api", skip(self))]
	async fn lookup(&self, pk: &Value) -> Result<Option<Bytes>> {
		Ok(self.inner.docs.read().get(pk).cloned())
	}

	async fn min_unsafe_key(&self) -> Result<Option<IndexKey>> {
		Ok(self.inner.min_unsafe.read().clone())
	}
}

/// A positioned cursor over a [`MemIndex`].
pub struct MemCursor {
	/// The index being scanned
	index: Arc<Inner>,
	/// The index generation this cursor was opened against
	generation: u64,
	/// Where the next fetch continues from
	position: Option<SeekKey>,
}

impl MemCursor {
	fn check(&self) -> Result<()> {
		ensure!(
			self.generation == self.index.generation.load(AtomicOrdering::Acquire),
			Error::TxRetryable
		);
		Ok(())
	}
}

#[cfg_attr(target_family = "wasm", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_family = "wasm"), async_trait::async_trait)]
impl EngineCursor for MemCursor {
	#[instrument(level = "trace", target = "idxcursor::kvs::api", skip(self), fields(target = %target))]
	async fn seek(&mut self, target: &SeekKey, direction: Direction) -> Result<()> {
		self.check()?;
		self.index.stats.lock().seeks += 1;
		self.position = Some(target.clone());
		Ok(())
	}

	#[instrument(level = "trace", target = "idxcursor::kvs::api", skip(self, each))]
	async fn fetch(
		&mut self,
		request: &FetchRequest,
		each: &mut RowCallback<'_>,
	) -> Result<FetchOutcome> {
		self.check()?;
		let dir = request.direction;
		let ordering = &self.index.ordering;
		let keys = self.index.keys.read();
		let docs = self.index.docs.read();
		// For forward scans `next` is the index of the next key, and for
		// backward scans it is one past the next key
		let mut next = match (&self.position, dir) {
			(None, Direction::Forward) => 0,
			(None, Direction::Backward) => keys.len(),
			(Some(p), Direction::Forward) => keys.partition_point(|k| !p.admits(k, ordering, dir)),
			(Some(p), Direction::Backward) => keys.partition_point(|k| p.admits(k, ordering, dir)),
		};
		let mut delivered = 0u32;
		let mut last = None;
		let outcome = loop {
			if delivered >= request.limit {
				break FetchOutcome::More;
			}
			let key = match dir {
				Direction::Forward => keys.get(next),
				Direction::Backward => next.checked_sub(1).and_then(|i| keys.get(i)),
			};
			let Some(key) = key else {
				break FetchOutcome::EndOfData;
			};
			match dir {
				Direction::Forward => next += 1,
				Direction::Backward => next -= 1,
			}
			delivered += 1;
			last = Some(key);
			let doc = if request.values && self.index.kind.is_clustering() {
				docs.get(&key.pk).cloned()
			} else {
				None
			};
			let row = Row {
				key: key.clone(),
				doc,
			};
			if each(row).is_break() {
				break FetchOutcome::More;
			}
		};
		if let Some(key) = last {
			self.position = Some(SeekKey::after(key));
		}
		trace!(target: TARGET, "Delivered {delivered} rows from '{}' ({outcome:?})", self.index.name);
		let mut stats = self.index.stats.lock();
		stats.fetches += 1;
		stats.rows += delivered as u64;
		stats.hints.push(request.limit);
		if request.for_update && !request.prelocked {
			stats.row_locks += delivered as u64;
		}
		Ok(outcome)
	}

	#[instrument(level = "trace", target = "idxcursor::kvs::api", skip(self), fields(from = %from, to = %to))]
	async fn prelock(&mut self, from: &SeekKey, to: &SeekKey) -> Result<()> {
		self.check()?;
		self.index.stats.lock().range_locks += 1;
		Ok(())
	}
}
