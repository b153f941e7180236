//! The key bounds a cursor restricts its output to.
//!
//! Bounds are computed from a query predicate by the planner. A cursor only
//! consumes them, through a [`BoundsIterator`](crate::idx::iterator::BoundsIterator).
use std::cmp;

use serde_json::json;

use crate::key::{Direction, Value};

/// An interval over the values of a single field, with `start <= end`
/// in ascending value order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interval {
	pub start: Value,
	pub start_inclusive: bool,
	pub end: Value,
	pub end_inclusive: bool,
}

impl Interval {
	pub fn new(start: Value, start_inclusive: bool, end: Value, end_inclusive: bool) -> Self {
		Interval {
			start,
			start_inclusive,
			end,
			end_inclusive,
		}
	}

	/// The interval containing only `v`.
	pub fn point(v: impl Into<Value>) -> Self {
		let v = v.into();
		Interval::new(v.clone(), true, v, true)
	}

	/// The interval `[start, end]`.
	pub fn closed(start: impl Into<Value>, end: impl Into<Value>) -> Self {
		Interval::new(start.into(), true, end.into(), true)
	}

	/// The interval `(start, end)`.
	pub fn open(start: impl Into<Value>, end: impl Into<Value>) -> Self {
		Interval::new(start.into(), false, end.into(), false)
	}

	/// The interval covering every value.
	pub fn all() -> Self {
		Interval::new(Value::MinKey, true, Value::MaxKey, true)
	}

	/// Check if no value can lie within this interval.
	pub fn is_empty(&self) -> bool {
		match self.start.cmp(&self.end) {
			cmp::Ordering::Greater => true,
			cmp::Ordering::Equal => !(self.start_inclusive && self.end_inclusive),
			cmp::Ordering::Less => false,
		}
	}

	/// The bound at which a scan visiting values in direction `dir` enters
	/// this interval, and whether that bound is inclusive.
	pub fn first(&self, dir: Direction) -> (&Value, bool) {
		match dir {
			Direction::Forward => (&self.start, self.start_inclusive),
			Direction::Backward => (&self.end, self.end_inclusive),
		}
	}

	/// The bound at which a scan visiting values in direction `dir` leaves
	/// this interval, and whether that bound is inclusive.
	pub fn last(&self, dir: Direction) -> (&Value, bool) {
		match dir {
			Direction::Forward => (&self.end, self.end_inclusive),
			Direction::Backward => (&self.start, self.start_inclusive),
		}
	}

	/// Check if `v` is visited before this interval is entered.
	pub fn is_before(&self, v: &Value, dir: Direction) -> bool {
		let (bound, inclusive) = self.first(dir);
		match dir.apply(v.cmp(bound)) {
			cmp::Ordering::Less => true,
			cmp::Ordering::Equal => !inclusive,
			cmp::Ordering::Greater => false,
		}
	}

	/// Check if `v` is visited after this interval has been left.
	pub fn is_after(&self, v: &Value, dir: Direction) -> bool {
		let (bound, inclusive) = self.last(dir);
		match dir.apply(v.cmp(bound)) {
			cmp::Ordering::Greater => true,
			cmp::Ordering::Equal => !inclusive,
			cmp::Ordering::Less => false,
		}
	}

	pub fn contains(&self, v: &Value) -> bool {
		!self.is_before(v, Direction::Forward) && !self.is_after(v, Direction::Forward)
	}

	/// Render this interval as `[start, end]` when both bounds are
	/// inclusive, or as a document naming the excluded bounds otherwise.
	pub fn explain(&self) -> serde_json::Value {
		if self.start_inclusive && self.end_inclusive {
			json!([self.start, self.end])
		} else {
			json!({
				"start": self.start,
				"startInclusive": self.start_inclusive,
				"end": self.end,
				"endInclusive": self.end_inclusive,
			})
		}
	}
}

/// The sorted, disjoint intervals allowed for one index field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldRange {
	intervals: Vec<Interval>,
}

impl FieldRange {
	/// Normalise a set of intervals: empty intervals are dropped, and the
	/// rest are sorted with overlapping or touching intervals merged.
	pub fn new(intervals: Vec<Interval>) -> Self {
		let mut intervals: Vec<Interval> = intervals.into_iter().filter(|i| !i.is_empty()).collect();
		intervals.sort_by(|a, b| {
			a.start.cmp(&b.start).then_with(|| b.start_inclusive.cmp(&a.start_inclusive))
		});
		let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
		for next in intervals {
			if let Some(last) = merged.last_mut() {
				let joins = match last.end.cmp(&next.start) {
					cmp::Ordering::Greater => true,
					cmp::Ordering::Equal => last.end_inclusive || next.start_inclusive,
					cmp::Ordering::Less => false,
				};
				if joins {
					match last.end.cmp(&next.end) {
						cmp::Ordering::Less => {
							last.end = next.end;
							last.end_inclusive = next.end_inclusive;
						}
						cmp::Ordering::Equal => last.end_inclusive |= next.end_inclusive,
						cmp::Ordering::Greater => (),
					}
					continue;
				}
			}
			merged.push(next);
		}
		FieldRange {
			intervals: merged,
		}
	}

	pub fn point(v: impl Into<Value>) -> Self {
		FieldRange::new(vec![Interval::point(v)])
	}

	pub fn all() -> Self {
		FieldRange::new(vec![Interval::all()])
	}

	pub fn intervals(&self) -> &[Interval] {
		&self.intervals
	}

	pub fn is_empty(&self) -> bool {
		self.intervals.is_empty()
	}

	/// The `k`-th interval in the order a scan in direction `dir` visits them.
	pub fn nth(&self, k: usize, dir: Direction) -> Option<&Interval> {
		match dir {
			Direction::Forward => self.intervals.get(k),
			Direction::Backward => {
				self.intervals.len().checked_sub(k + 1).and_then(|i| self.intervals.get(i))
			}
		}
	}
}

/// One [`FieldRange`] for each field of an index. The key space selected
/// is the cartesian product of the per-field ranges.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldRangeVector {
	ranges: Vec<FieldRange>,
}

impl FieldRangeVector {
	pub fn new(ranges: Vec<FieldRange>) -> Self {
		FieldRangeVector {
			ranges,
		}
	}

	pub fn ranges(&self) -> &[FieldRange] {
		&self.ranges
	}

	/// Extend these bounds to `fields` fields, leaving the added fields
	/// unrestricted.
	pub fn padded(mut self, fields: usize) -> Self {
		while self.ranges.len() < fields {
			self.ranges.push(FieldRange::all());
		}
		self
	}

	pub fn len(&self) -> usize {
		self.ranges.len()
	}

	/// Check if no key can satisfy these bounds.
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty() || self.ranges.iter().any(FieldRange::is_empty)
	}

	/// Check if these bounds describe a single compound interval.
	pub fn is_single_interval(&self) -> bool {
		self.ranges.iter().all(|r| r.intervals.len() == 1)
	}

	/// The number of compound intervals described by these bounds.
	pub fn size(&self) -> usize {
		self.ranges.iter().map(|r| r.intervals.len()).product()
	}

	/// Render these bounds as an explain document.
	pub fn explain(&self) -> serde_json::Value {
		serde_json::Value::Array(
			self.ranges
				.iter()
				.map(|r| {
					serde_json::Value::Array(
						r.intervals.iter().map(Interval::explain).collect(),
					)
				})
				.collect(),
		)
	}
}

/// A contiguous key range, expressed in scan order: `start` is where the
/// scan begins, so for a backward scan it is the high key. The start key
/// is always inclusive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
	pub start: Vec<Value>,
	pub end: Vec<Value>,
	pub end_inclusive: bool,
}

impl KeyRange {
	pub fn new(start: Vec<Value>, end: Vec<Value>, end_inclusive: bool) -> Self {
		KeyRange {
			start,
			end,
			end_inclusive,
		}
	}
}

/// The bounds a cursor is asked to scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Bounds {
	/// Every key equal to a single key prefix.
	Point(Vec<Value>),
	/// A single start/end key pair.
	Range(KeyRange),
	/// A multi-interval vector, optionally limited to a number of keys
	/// when it describes a single interval. A limit of 0 is unlimited.
	Intervals {
		vector: FieldRangeVector,
		single_interval_limit: u64,
	},
	/// The whole index.
	Full,
}

impl Bounds {
	/// Multi-interval bounds with no key limit.
	pub fn intervals(ranges: Vec<FieldRange>) -> Self {
		Bounds::Intervals {
			vector: FieldRangeVector::new(ranges),
			single_interval_limit: 0,
		}
	}

	/// Render these bounds as an explain document.
	pub fn explain(&self) -> serde_json::Value {
		match self {
			Bounds::Point(key) => json!({ "start": key, "end": key }),
			Bounds::Range(range) => json!({
				"start": range.start,
				"end": range.end,
				"endInclusive": range.end_inclusive,
			}),
			Bounds::Intervals {
				vector,
				..
			} => vector.explain(),
			Bounds::Full => json!({ "start": [Value::MinKey], "end": [Value::MaxKey] }),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_intervals() {
		assert!(Interval::closed(5, 4).is_empty());
		assert!(Interval::open(5, 5).is_empty());
		assert!(!Interval::point(5).is_empty());
		assert!(!Interval::all().is_empty());
	}

	#[test]
	fn interval_position_along_direction() {
		let i = Interval::new(Value::Int(3), false, Value::Int(7), true);
		assert!(i.is_before(&Value::Int(3), Direction::Forward));
		assert!(!i.is_before(&Value::Int(4), Direction::Forward));
		assert!(i.is_after(&Value::Int(8), Direction::Forward));
		assert!(!i.is_after(&Value::Int(7), Direction::Forward));
		assert!(i.is_before(&Value::Int(8), Direction::Backward));
		assert!(i.is_after(&Value::Int(3), Direction::Backward));
		assert!(i.contains(&Value::Int(7)));
		assert!(!i.contains(&Value::Int(3)));
	}

	#[test]
	fn field_range_merges_and_sorts() {
		let range = FieldRange::new(vec![
			Interval::closed(7, 9),
			Interval::closed(1, 3),
			Interval::new(Value::Int(3), false, Value::Int(4), true),
			Interval::closed(20, 10),
		]);
		assert_eq!(range.intervals(), &[Interval::closed(1, 4), Interval::closed(7, 9)]);
	}

	#[test]
	fn field_range_keeps_open_gaps() {
		let range = FieldRange::new(vec![
			Interval::new(Value::Int(1), true, Value::Int(3), false),
			Interval::new(Value::Int(3), false, Value::Int(5), true),
		]);
		assert_eq!(range.intervals().len(), 2);
	}

	#[test]
	fn nth_follows_direction() {
		let range = FieldRange::new(vec![Interval::point(1), Interval::point(2), Interval::point(3)]);
		assert_eq!(range.nth(0, Direction::Backward), Some(&Interval::point(3)));
		assert_eq!(range.nth(2, Direction::Backward), Some(&Interval::point(1)));
		assert_eq!(range.nth(3, Direction::Backward), None);
		assert_eq!(range.nth(1, Direction::Forward), Some(&Interval::point(2)));
	}

	#[test]
	fn vector_shape() {
		let v = FieldRangeVector::new(vec![
			FieldRange::new(vec![Interval::point(1), Interval::point(2)]),
			FieldRange::all(),
		]);
		assert!(!v.is_empty());
		assert!(!v.is_single_interval());
		assert_eq!(v.size(), 2);
		let empty = FieldRangeVector::new(vec![FieldRange::all(), FieldRange::new(vec![])]);
		assert!(empty.is_empty());
	}

	#[test]
	fn explain_intervals() {
		let b = Bounds::intervals(vec![FieldRange::new(vec![
			Interval::closed(1, 3),
			Interval::closed(7, 9),
		])]);
		assert_eq!(b.explain(), json!([[[1, 3], [7, 9]]]));
	}

	#[test]
	fn explain_keeps_excluded_bounds() {
		let b = Bounds::intervals(vec![
			FieldRange::new(vec![Interval::new(Value::Int(1), true, Value::Int(3), false)]),
			FieldRange::all(),
		]);
		assert_eq!(
			b.explain(),
			json!([
				[{"start": 1, "startInclusive": true, "end": 3, "endInclusive": false}],
				[[{"$minKey": 1}, {"$maxKey": 1}]],
			])
		);
	}
}
