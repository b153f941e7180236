//! Classifies scanned keys against the bounds of a cursor.
//!
//! A [`BoundsIterator`] looks at each key the engine delivers and decides
//! whether it is within bounds, whether the scan should jump ahead to a
//! later key, or whether no further key can be within bounds. Jumping
//! ahead is what turns a multi-interval scan into a skip scan.
use std::cmp;

use crate::idx::bounds::{FieldRangeVector, KeyRange};
use crate::key::{Direction, IndexKey, Ordering, SeekKey, Value};

/// The verdict of a [`BoundsIterator`] on a single scanned key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Classification {
	/// The key lies within bounds.
	InBounds,
	/// The key lies outside bounds, but later keys may not. The scan
	/// should continue from the given target, which never passes an
	/// in-bounds key.
	Skip(SeekKey),
	/// No key at or past this one can lie within bounds.
	Exhausted,
}

/// Walks a cursor's bounds in scan order.
#[derive(Clone, Debug)]
pub enum BoundsIterator {
	/// Bounds which admit no key at all.
	Empty,
	/// Every key of the index.
	Full(FullIterator),
	/// A single contiguous range.
	Range(RangeIterator),
	/// A vector of per-field intervals.
	Intervals(IntervalsIterator),
}

impl BoundsIterator {
	/// Where the scan should begin.
	pub fn start(&self) -> SeekKey {
		match self {
			BoundsIterator::Empty => SeekKey::at(vec![]),
			BoundsIterator::Full(i) => SeekKey::at(i.fill(Direction::lowest)),
			BoundsIterator::Range(i) => SeekKey::at(i.start.clone()),
			BoundsIterator::Intervals(i) => SeekKey::at(i.lead(&[], 0)),
		}
	}

	/// The last position the scan may reach.
	pub fn end(&self) -> SeekKey {
		match self {
			BoundsIterator::Empty => SeekKey::at(vec![]),
			BoundsIterator::Full(i) => SeekKey::at(i.fill(Direction::highest)),
			BoundsIterator::Range(i) => SeekKey::at(i.end.clone()),
			BoundsIterator::Intervals(i) => SeekKey::at(i.tail()),
		}
	}

	/// Check whether this iterator can never admit a key.
	pub fn is_empty(&self) -> bool {
		matches!(self, BoundsIterator::Empty)
	}

	/// Classify the next key delivered by the engine.
	pub fn advance(&mut self, key: &IndexKey) -> Classification {
		match self {
			BoundsIterator::Empty => Classification::Exhausted,
			BoundsIterator::Full(_) => Classification::InBounds,
			BoundsIterator::Range(i) => i.advance(key),
			BoundsIterator::Intervals(i) => i.advance(key),
		}
	}
}

#[derive(Clone, Debug)]
pub struct FullIterator {
	ordering: Ordering,
	dir: Direction,
}

impl FullIterator {
	pub fn new(ordering: Ordering, dir: Direction) -> Self {
		FullIterator {
			ordering,
			dir,
		}
	}

	fn fill(&self, sentinel: fn(Direction) -> Value) -> Vec<Value> {
		(0..self.ordering.len()).map(|i| sentinel(self.ordering.effective(i, self.dir))).collect()
	}
}

/// Checks keys against a start and end key. Both keys are padded to the
/// full length of the index, so that a short key covers every key that
/// starts with it.
#[derive(Clone, Debug)]
pub struct RangeIterator {
	ordering: Ordering,
	dir: Direction,
	start: Vec<Value>,
	end: Vec<Value>,
	end_inclusive: bool,
}

impl RangeIterator {
	pub fn new(range: KeyRange, ordering: Ordering, dir: Direction) -> Self {
		let n = ordering.len();
		let pad = |mut key: Vec<Value>, sentinel: fn(Direction) -> Value| {
			for i in key.len()..n {
				key.push(sentinel(ordering.effective(i, dir)));
			}
			key
		};
		let start = pad(range.start, Direction::lowest);
		let end = if range.end_inclusive {
			pad(range.end, Direction::highest)
		} else {
			pad(range.end, Direction::lowest)
		};
		RangeIterator {
			ordering,
			dir,
			start,
			end,
			end_inclusive: range.end_inclusive,
		}
	}

	fn advance(&self, key: &IndexKey) -> Classification {
		match self.dir.apply(self.ordering.compare(&key.fields, &self.end)) {
			cmp::Ordering::Greater => return Classification::Exhausted,
			cmp::Ordering::Equal if !self.end_inclusive => return Classification::Exhausted,
			_ => (),
		}
		match self.dir.apply(self.ordering.compare(&key.fields, &self.start)) {
			cmp::Ordering::Less => Classification::Skip(SeekKey::at(self.start.clone())),
			_ => Classification::InBounds,
		}
	}
}

/// Checks keys against a [`FieldRangeVector`].
///
/// Each call compares the key field by field against that field's
/// intervals, in the order the scan visits them. The first field which
/// falls outside its intervals determines where the scan continues.
#[derive(Clone, Debug)]
pub struct IntervalsIterator {
	vector: FieldRangeVector,
	ordering: Ordering,
	dir: Direction,
	/// Intervals of the first field before this position have been passed.
	hint: usize,
	limit: u64,
	matched: u64,
}

/// Where a field value sits relative to a field's intervals.
enum Located {
	Inside(usize),
	Before(usize),
	Past,
}

impl IntervalsIterator {
	/// Fields the vector leaves out are unrestricted, so that every seek
	/// target spans the whole key pattern.
	pub fn new(vector: FieldRangeVector, ordering: Ordering, dir: Direction, limit: u64) -> Self {
		let vector = vector.padded(ordering.len());
		// A key limit only applies to a single compound interval
		let limit = if vector.is_single_interval() {
			limit
		} else {
			0
		};
		IntervalsIterator {
			vector,
			ordering,
			dir,
			hint: 0,
			limit,
			matched: 0,
		}
	}

	fn locate(&self, field: usize, v: &Value, from: usize) -> Located {
		let dir = self.ordering.effective(field, self.dir);
		let range = &self.vector.ranges()[field];
		let mut k = from;
		while let Some(interval) = range.nth(k, dir) {
			if interval.is_before(v, dir) {
				return Located::Before(k);
			}
			if !interval.is_after(v, dir) {
				return Located::Inside(k);
			}
			k += 1;
		}
		Located::Past
	}

	/// The smallest key in scan order which starts with `prefix`, continues
	/// with interval `k` of field `i`, and continues with the first interval
	/// of every later field.
	fn target(&self, prefix: &[Value], i: usize, k: usize) -> Vec<Value> {
		let mut key = prefix.to_vec();
		let mut field = i;
		let mut nth = k;
		while field < self.vector.len() {
			let dir = self.ordering.effective(field, self.dir);
			let Some(interval) = self.vector.ranges()[field].nth(nth, dir) else {
				break;
			};
			let (start, inclusive) = interval.first(dir);
			key.push(start.clone());
			field += 1;
			nth = 0;
			if !inclusive {
				// The bound itself is excluded, so skip every key sharing it
				self.fill_highest(&mut key, field);
				break;
			}
		}
		key
	}

	fn lead(&self, prefix: &[Value], i: usize) -> Vec<Value> {
		self.target(prefix, i, 0)
	}

	/// The last key the scan could visit.
	fn tail(&self) -> Vec<Value> {
		(0..self.vector.len())
			.filter_map(|i| {
				let dir = self.ordering.effective(i, self.dir);
				let range = &self.vector.ranges()[i];
				let last = range.intervals().len().checked_sub(1)?;
				range.nth(last, dir).map(|interval| interval.last(dir).0.clone())
			})
			.collect()
	}

	fn fill_highest(&self, key: &mut Vec<Value>, from: usize) {
		for field in from..self.vector.len() {
			key.push(self.ordering.effective(field, self.dir).highest());
		}
	}

	fn advance(&mut self, key: &IndexKey) -> Classification {
		if self.limit > 0 && self.matched >= self.limit {
			return Classification::Exhausted;
		}
		let fields = self.vector.len().min(key.fields.len());
		for i in 0..fields {
			let from = if i == 0 {
				self.hint
			} else {
				0
			};
			match self.locate(i, &key.fields[i], from) {
				Located::Inside(k) => {
					if i == 0 {
						self.hint = k;
					}
				}
				Located::Before(k) => {
					if i == 0 {
						self.hint = k;
					}
					return Classification::Skip(SeekKey::at(self.target(&key.fields[..i], i, k)));
				}
				Located::Past if i == 0 => return Classification::Exhausted,
				Located::Past => {
					// Every remaining key with this prefix is out of bounds
					let mut next = key.fields[..i].to_vec();
					self.fill_highest(&mut next, i);
					return Classification::Skip(SeekKey::at(next));
				}
			}
		}
		self.matched += 1;
		Classification::InBounds
	}
}
