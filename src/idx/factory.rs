//! Builds index cursors from a scan request.
use std::sync::Arc;

use crate::ctx::Context;
use crate::err::{Error, Result};
use crate::idx::bounds::{Bounds, KeyRange};
use crate::idx::cursor::IndexCursor;
use crate::idx::iterator::{BoundsIterator, FullIterator, IntervalsIterator, RangeIterator};
use crate::idx::strategy::{FetchPolicy, MaterializationMode, ScanKind, ScanStrategy};
use crate::key::Direction;
use crate::kvs::{IndexHandle, IndexKind};

const TARGET: &str = "idxcursor::idx::factory";

/// A request for a cursor over an index.
#[derive(Clone, Debug)]
pub struct CursorConfig {
	/// The keys to scan
	pub bounds: Bounds,
	/// The scan direction
	pub direction: Direction,
	/// Whether documents or only keys are read
	pub mode: MaterializationMode,
	/// Whether the cursor waits for new rows at the end of the scan
	pub tailable: bool,
	/// Whether the scanned range is locked up front
	pub prelock: bool,
	/// Whether delivered rows are locked for a later write
	pub for_update: bool,
	/// Overrides the configured fetch sizes
	pub fetch: Option<FetchPolicy>,
}

impl CursorConfig {
	pub fn new(bounds: Bounds) -> Self {
		CursorConfig {
			bounds,
			direction: Direction::Forward,
			mode: MaterializationMode::Full,
			tailable: false,
			prelock: false,
			for_update: false,
			fetch: None,
		}
	}

	pub fn direction(mut self, direction: Direction) -> Self {
		self.direction = direction;
		self
	}

	pub fn reverse(self) -> Self {
		self.direction(Direction::Backward)
	}

	pub fn count_only(mut self) -> Self {
		self.mode = MaterializationMode::CountOnly;
		self
	}

	pub fn tailable(mut self) -> Self {
		self.tailable = true;
		self
	}

	pub fn prelock(mut self) -> Self {
		self.prelock = true;
		self
	}

	pub fn for_update(mut self) -> Self {
		self.for_update = true;
		self
	}

	pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
		self.fetch = Some(policy);
		self
	}
}

/// Open a cursor over `index`.
///
/// Bounds which can admit no key produce a cursor which is exhausted from
/// the start, without opening an engine cursor.
pub async fn make(
	ctx: &Context,
	index: Arc<dyn IndexHandle>,
	config: CursorConfig,
) -> Result<IndexCursor> {
	if let Some(reason) = ctx.done(true) {
		return Err(reason.into());
	}
	let multikey = index.kind() != IndexKind::Primary && index.is_multikey();
	if config.mode == MaterializationMode::CountOnly && multikey {
		return Err(Error::CountOnlyMultikey(index.name().to_owned()));
	}
	ensure!(
		!(config.prelock && config.tailable),
		Error::InvalidConfig("a prelocked cursor can not be tailable".to_owned())
	);
	ensure!(!config.tailable || config.direction.is_forward(), Error::TailableBackward);
	if let Bounds::Intervals {
		vector,
		..
	} = &config.bounds
	{
		ensure!(
			vector.len() <= index.ordering().len(),
			Error::InvalidConfig(format!(
				"bounds over {} fields do not fit the {} fields of index '{}'",
				vector.len(),
				index.ordering().len(),
				index.name()
			))
		);
	}
	let ordering = index.ordering().clone();
	let dir = config.direction;
	let bounds = match &config.bounds {
		Bounds::Full => BoundsIterator::Full(FullIterator::new(ordering, dir)),
		Bounds::Point(key) => BoundsIterator::Range(RangeIterator::new(
			KeyRange::new(key.clone(), key.clone(), true),
			ordering,
			dir,
		)),
		Bounds::Range(range) => BoundsIterator::Range(RangeIterator::new(range.clone(), ordering, dir)),
		Bounds::Intervals {
			vector,
			..
		} if vector.is_empty() => BoundsIterator::Empty,
		Bounds::Intervals {
			vector,
			single_interval_limit,
		} => BoundsIterator::Intervals(IntervalsIterator::new(
			vector.clone(),
			ordering,
			dir,
			*single_interval_limit,
		)),
	};
	let kind = match (&config.mode, &config.bounds) {
		(MaterializationMode::CountOnly, _) => ScanKind::CountOnly,
		(_, Bounds::Full) => ScanKind::FullScan,
		_ => ScanKind::IndexBounded,
	};
	let mut engine = if bounds.is_empty() {
		None
	} else {
		Some(index.cursor().await?)
	};
	if config.prelock {
		if let Some(engine) = engine.as_mut() {
			engine.prelock(&bounds.start(), &bounds.end()).await?;
		}
	}
	let fetch = config.fetch.unwrap_or_default();
	let strategy = ScanStrategy::new(kind, bounds, fetch, config.mode);
	let cursor = IndexCursor::new(index, engine, strategy, &config);
	debug!(target: TARGET, "{cursor}: opened {kind:?} scan over {}", config.bounds.explain());
	Ok(cursor)
}
