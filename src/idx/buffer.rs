use std::collections::VecDeque;

use bytes::Bytes;

use crate::key::{IndexKey, Value};
use crate::kvs::Row;

/// A bounded FIFO of rows fetched from the engine but not yet consumed.
pub struct RowBuffer {
	/// The rows waiting to be read
	rows: VecDeque<Row>,
	/// The row most recently read with [`RowBuffer::next`]
	current: Option<Row>,
	/// The bytes appended since this buffer was last emptied
	size: usize,
	/// The number of bytes above which this buffer is considered full
	preferred: usize,
}

impl RowBuffer {
	pub fn new(preferred: usize) -> Self {
		RowBuffer {
			rows: VecDeque::new(),
			current: None,
			size: 0,
			preferred,
		}
	}

	/// Append a fetched row. The document is absent for secondary indexes
	/// and for count-only scans.
	pub fn append(&mut self, key: IndexKey, doc: Option<Bytes>) {
		self.size += key.size() + doc.as_ref().map_or(0, Bytes::len);
		self.rows.push_back(Row {
			key,
			doc,
		});
	}

	/// Check if enough bytes have been appended that no more rows should be
	/// fetched until the buffer is emptied.
	pub fn is_gorged(&self) -> bool {
		self.size >= self.preferred
	}

	/// Advance to the next buffered row, returning whether one was available.
	pub fn next(&mut self) -> bool {
		self.current = self.rows.pop_front();
		self.current.is_some()
	}

	/// The row most recently read with [`RowBuffer::next`].
	pub fn current(&self) -> Option<&Row> {
		self.current.as_ref()
	}

	/// Take the row most recently read with [`RowBuffer::next`].
	pub fn take_current(&mut self) -> Option<Row> {
		self.current.take()
	}

	/// Discard every buffered row and reset the appended size.
	pub fn empty(&mut self) {
		self.rows.clear();
		self.current = None;
		self.size = 0;
	}

	/// Drop every waiting row of the document with primary key `pk`,
	/// returning how many were dropped.
	pub fn discard(&mut self, pk: &Value) -> usize {
		let before = self.rows.len();
		self.rows.retain(|r| &r.key.pk != pk);
		before - self.rows.len()
	}

	/// The number of rows still waiting to be read.
	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// The bytes appended since this buffer was last emptied.
	pub fn size(&self) -> usize {
		self.size
	}
}
