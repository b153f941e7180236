use std::cmp;
use std::fmt::{self, Display};

use serde::Serialize;

use crate::key::{IndexKey, Value};

/// The direction of a scan, or of a single field within an index key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	#[default]
	Forward,
	Backward,
}

impl Direction {
	/// Combine a field direction with a scan direction.
	///
	/// Scanning a descending field backwards visits its values in
	/// ascending order.
	pub fn combine(self, other: Direction) -> Self {
		if self == other {
			Direction::Forward
		} else {
			Direction::Backward
		}
	}

	/// Orient a comparison result along this direction.
	pub fn apply(self, ord: cmp::Ordering) -> cmp::Ordering {
		match self {
			Direction::Forward => ord,
			Direction::Backward => ord.reverse(),
		}
	}

	pub fn is_forward(self) -> bool {
		self == Direction::Forward
	}

	/// The sentinel which sorts before every value along this direction.
	pub fn lowest(self) -> Value {
		match self {
			Direction::Forward => Value::MinKey,
			Direction::Backward => Value::MaxKey,
		}
	}

	/// The sentinel which sorts after every value along this direction.
	pub fn highest(self) -> Value {
		match self {
			Direction::Forward => Value::MaxKey,
			Direction::Backward => Value::MinKey,
		}
	}
}

impl Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Direction::Forward => f.write_str("forward"),
			Direction::Backward => f.write_str("backward"),
		}
	}
}

/// The key pattern of an index: one ascending or descending
/// direction for each indexed field.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize)]
pub struct Ordering(Vec<Direction>);

impl Ordering {
	pub fn new(fields: Vec<Direction>) -> Self {
		Ordering(fields)
	}

	/// An ordering with `n` ascending fields.
	pub fn ascending(n: usize) -> Self {
		Ordering(vec![Direction::Forward; n])
	}

	/// The number of indexed fields.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The direction of field `i`. Fields past the end of the pattern
	/// are treated as ascending.
	pub fn field(&self, i: usize) -> Direction {
		self.0.get(i).copied().unwrap_or_default()
	}

	/// The order in which values of field `i` are visited by a scan in
	/// direction `dir`.
	pub fn effective(&self, i: usize, dir: Direction) -> Direction {
		self.field(i).combine(dir)
	}

	/// Compare two field tuples field by field. When one tuple is a prefix
	/// of the other, the shorter tuple sorts first.
	pub fn compare(&self, a: &[Value], b: &[Value]) -> cmp::Ordering {
		for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
			match self.field(i).apply(x.cmp(y)) {
				cmp::Ordering::Equal => continue,
				ord => return ord,
			}
		}
		a.len().cmp(&b.len())
	}

	/// Compare two index keys by their fields, then by primary key.
	pub fn compare_keys(&self, a: &IndexKey, b: &IndexKey) -> cmp::Ordering {
		self.compare(&a.fields, &b.fields).then_with(|| a.pk.cmp(&b.pk))
	}
}
