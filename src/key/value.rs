use std::cmp;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use serde::ser::{Serialize, SerializeMap, Serializer};

/// 2^63 is exactly representable, which bounds the floats that can
/// be compared against an `i64` by truncation.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// A single indexed field value.
///
/// Values of different types compare in a fixed canonical order:
/// `MinKey < Null < numbers < String < Bytes < Bool < MaxKey`.
/// Integers and floats compare numerically with one another, and `NaN`
/// sorts before every other number.
#[derive(Clone, Debug)]
pub enum Value {
	/// Sorts before every other value. Only used in seek targets and bounds.
	MinKey,
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	/// Sorts after every other value. Only used in seek targets and bounds.
	MaxKey,
}

impl Value {
	/// The position of this value's type in the canonical type order.
	fn rank(&self) -> u8 {
		match self {
			Value::MinKey => 0,
			Value::Null => 1,
			Value::Int(_) | Value::Float(_) => 2,
			Value::String(_) => 3,
			Value::Bytes(_) => 4,
			Value::Bool(_) => 5,
			Value::MaxKey => 6,
		}
	}

	/// An approximation of the number of bytes this value occupies once
	/// buffered, used to decide when a row buffer is full.
	pub fn size(&self) -> usize {
		1 + match self {
			Value::MinKey | Value::MaxKey | Value::Null => 0,
			Value::Bool(_) => 1,
			Value::Int(_) | Value::Float(_) => 8,
			Value::String(v) => v.len(),
			Value::Bytes(v) => v.len(),
		}
	}
}

fn cmp_floats(a: f64, b: f64) -> cmp::Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => cmp::Ordering::Equal,
		(true, false) => cmp::Ordering::Less,
		(false, true) => cmp::Ordering::Greater,
		(false, false) => a.partial_cmp(&b).unwrap_or(cmp::Ordering::Equal),
	}
}

fn cmp_int_float(a: i64, b: f64) -> cmp::Ordering {
	if b.is_nan() {
		return cmp::Ordering::Greater;
	}
	if b >= TWO_POW_63 {
		return cmp::Ordering::Less;
	}
	if b < -TWO_POW_63 {
		return cmp::Ordering::Greater;
	}
	let trunc = b.trunc();
	match a.cmp(&(trunc as i64)) {
		cmp::Ordering::Equal if b > trunc => cmp::Ordering::Less,
		cmp::Ordering::Equal if b < trunc => cmp::Ordering::Greater,
		other => other,
	}
}

impl Ord for Value {
	fn cmp(&self, other: &Self) -> cmp::Ordering {
		match (self, other) {
			(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
			(Value::Int(a), Value::Int(b)) => a.cmp(b),
			(Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
			(Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
			(Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
			(Value::String(a), Value::String(b)) => a.cmp(b),
			(Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
			(a, b) => a.rank().cmp(&b.rank()),
		}
	}
}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == cmp::Ordering::Equal
	}
}

impl Eq for Value {}

impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.rank().hash(state);
		match self {
			Value::MinKey | Value::MaxKey | Value::Null => (),
			Value::Bool(v) => v.hash(state),
			Value::Int(v) => v.hash(state),
			// Integral floats must hash like the integer they are equal to
			Value::Float(v) if v.is_nan() => u8::MAX.hash(state),
			Value::Float(v) if v.fract() == 0.0 && *v >= -TWO_POW_63 && *v < TWO_POW_63 => {
				(*v as i64).hash(state)
			}
			Value::Float(v) => v.to_bits().hash(state),
			Value::String(v) => v.hash(state),
			Value::Bytes(v) => v.hash(state),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Value::MinKey => f.write_str("MinKey"),
			Value::Null => f.write_str("null"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v:?}"),
			Value::String(v) => write!(f, "{v:?}"),
			Value::Bytes(v) => {
				f.write_str("0x")?;
				v.iter().try_for_each(|b| write!(f, "{b:02x}"))
			}
			Value::MaxKey => f.write_str("MaxKey"),
		}
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::MinKey => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry("$minKey", &1)?;
				map.end()
			}
			Value::MaxKey => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry("$maxKey", &1)?;
				map.end()
			}
			Value::Null => serializer.serialize_unit(),
			Value::Bool(v) => serializer.serialize_bool(*v),
			Value::Int(v) => serializer.serialize_i64(*v),
			Value::Float(v) => serializer.serialize_f64(*v),
			Value::String(v) => serializer.serialize_str(v),
			Value::Bytes(v) => serializer.serialize_bytes(v),
		}
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Bytes(v)
	}
}
