//! Stores index keys and the reposition targets used to seek an engine cursor.
use std::cmp;
use std::fmt::{self, Display};

use serde::Serialize;

use crate::key::{Direction, Ordering, Value};

/// An index entry key: the indexed field values with the primary key of the
/// document appended, so that every key in an index is unique.
///
/// For the primary index the fields hold the primary key itself.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct IndexKey {
	pub fields: Vec<Value>,
	pub pk: Value,
}

impl IndexKey {
	pub fn new(fields: Vec<Value>, pk: Value) -> Self {
		IndexKey {
			fields,
			pk,
		}
	}

	/// A key of the primary index, where the key is the primary key.
	pub fn primary(pk: Value) -> Self {
		IndexKey {
			fields: vec![pk.clone()],
			pk,
		}
	}

	/// An approximation of the buffered size of this key in bytes.
	pub fn size(&self) -> usize {
		self.fields.iter().map(Value::size).sum::<usize>() + self.pk.size()
	}
}

impl Display for IndexKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("{")?;
		for (i, v) in self.fields.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{v}")?;
		}
		write!(f, "}} @ {}", self.pk)
	}
}

/// A target for repositioning an engine cursor.
///
/// When `pk` is `None` the target sits before every primary key sharing
/// the target fields in the direction of the scan. An exclusive target
/// lands strictly after the exact position it describes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SeekKey {
	pub fields: Vec<Value>,
	pub pk: Option<Value>,
	pub inclusive: bool,
}

impl SeekKey {
	/// Seek to the first key whose fields are at or past `fields`.
	pub fn at(fields: Vec<Value>) -> Self {
		SeekKey {
			fields,
			pk: None,
			inclusive: true,
		}
	}

	/// Seek to an exact key, including it.
	pub fn to(key: &IndexKey) -> Self {
		SeekKey {
			fields: key.fields.clone(),
			pk: Some(key.pk.clone()),
			inclusive: true,
		}
	}

	/// Seek to the key following an exact key.
	pub fn after(key: &IndexKey) -> Self {
		SeekKey {
			fields: key.fields.clone(),
			pk: Some(key.pk.clone()),
			inclusive: false,
		}
	}

	/// Check whether `key` lies at or past this target when scanning in
	/// direction `dir`. Along the scan direction this predicate is false for
	/// a run of keys and then true for every following key.
	pub fn admits(&self, key: &IndexKey, ordering: &Ordering, dir: Direction) -> bool {
		match dir.apply(ordering.compare(&key.fields, &self.fields)) {
			cmp::Ordering::Greater => true,
			cmp::Ordering::Less => false,
			cmp::Ordering::Equal => match &self.pk {
				None => self.inclusive,
				Some(pk) => match dir.apply(key.pk.cmp(pk)) {
					cmp::Ordering::Greater => true,
					cmp::Ordering::Less => false,
					cmp::Ordering::Equal => self.inclusive,
				},
			},
		}
	}
}

impl Display for SeekKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(if self.inclusive {
			">= ["
		} else {
			"> ["
		})?;
		for (i, v) in self.fields.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{v}")?;
		}
		f.write_str("]")?;
		if let Some(pk) = &self.pk {
			write!(f, " @ {pk}")?;
		}
		Ok(())
	}
}
