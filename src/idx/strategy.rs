use serde::Serialize;

use crate::cnf::{INITIAL_FETCH_SIZE, MAX_FETCH_SIZE};
use crate::idx::iterator::BoundsIterator;

/// Whether a cursor reads documents or only keys.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MaterializationMode {
	/// Keys and documents are available for every row.
	#[default]
	Full,
	/// Only keys are fetched. Documents are never read.
	CountOnly,
}

/// The kind of scan a cursor runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanKind {
	/// A scan restricted to key bounds, possibly skipping between intervals.
	IndexBounded,
	/// A scan of every key in the index.
	FullScan,
	/// A scan which counts keys without materializing documents.
	CountOnly,
}

/// Decides how many rows each bulk fetch requests from the engine.
///
/// The first fetch requests `initial` rows, and each following fetch
/// requests twice as many as the one before, up to `max`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchPolicy {
	/// The upper bound on a single fetch
	max: u32,
	/// The size of the next fetch
	next: u32,
}

impl Default for FetchPolicy {
	fn default() -> Self {
		FetchPolicy::new(*INITIAL_FETCH_SIZE, *MAX_FETCH_SIZE)
	}
}

impl FetchPolicy {
	pub fn new(initial: u32, max: u32) -> Self {
		let max = max.max(1);
		FetchPolicy {
			max,
			next: initial.clamp(1, max),
		}
	}

	/// A policy which always requests the same number of rows.
	pub fn fixed(size: u32) -> Self {
		FetchPolicy::new(size, size)
	}

	/// The row limit for the next fetch. Each call grows the following one.
	pub fn next_hint(&mut self) -> u32 {
		let hint = self.next;
		self.next = self.next.saturating_mul(2).min(self.max);
		hint
	}

	/// The row limit the next fetch will request.
	pub fn peek(&self) -> u32 {
		self.next
	}
}

/// Everything that varies between the kinds of scan a cursor can run.
#[derive(Debug)]
pub struct ScanStrategy {
	pub(crate) kind: ScanKind,
	pub(crate) bounds: BoundsIterator,
	pub(crate) fetch: FetchPolicy,
	pub(crate) mode: MaterializationMode,
}

impl ScanStrategy {
	pub fn new(
		kind: ScanKind,
		bounds: BoundsIterator,
		fetch: FetchPolicy,
		mode: MaterializationMode,
	) -> Self {
		ScanStrategy {
			kind,
			bounds,
			fetch,
			mode,
		}
	}

	pub fn kind(&self) -> ScanKind {
		self.kind
	}

	pub fn mode(&self) -> MaterializationMode {
		self.mode
	}

	/// Check if fetches should deliver documents along with keys.
	pub fn wants_values(&self) -> bool {
		self.mode == MaterializationMode::Full
	}
}
