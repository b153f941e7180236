use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use trice::Instant;

use crate::ctx::canceller::Canceller;
use crate::ctx::reason::Reason;
use crate::err::{Error, Result};

pub type Context = Arc<MutableContext>;

/// The execution context of the operation which owns a cursor.
///
/// A cursor never owns its context. The context is threaded into every call
/// which may fetch from the engine, so that a long scan can be aborted
/// between fetch batches.
#[non_exhaustive]
pub struct MutableContext {
	// An optional parent context.
	parent: Option<Context>,
	// An optional deadline.
	deadline: Option<Instant>,
	// Whether or not this context is cancelled.
	cancelled: Arc<AtomicBool>,
}

impl Default for MutableContext {
	fn default() -> Self {
		MutableContext::background()
	}
}

impl Debug for MutableContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("parent", &self.parent)
			.field("deadline", &self.deadline)
			.field("cancelled", &self.cancelled)
			.finish()
	}
}

impl MutableContext {
	/// Creates a new empty background context.
	pub fn background() -> Self {
		Self {
			parent: None,
			deadline: None,
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Creates a new context from a frozen parent context.
	pub fn new(parent: &Context) -> Self {
		MutableContext {
			deadline: parent.deadline,
			cancelled: Arc::new(AtomicBool::new(false)),
			parent: Some(parent.clone()),
		}
	}

	/// Freezes this context, so that it can be shared with cursors.
	pub fn freeze(self) -> Context {
		Arc::new(self)
	}

	/// Add cancellation to the context. The value that is returned will cancel
	/// the context and it's children once called.
	pub fn add_cancel(&mut self) -> Canceller {
		let cancelled = self.cancelled.clone();
		Canceller::new(cancelled)
	}

	/// Add a deadline to the context. If the current deadline is sooner than
	/// the provided deadline, this method does nothing.
	pub fn add_deadline(&mut self, deadline: Instant) {
		match self.deadline {
			Some(current) if current < deadline => (),
			_ => self.deadline = Some(deadline),
		}
	}

	/// Add a timeout to the context. If the current timeout is sooner than
	/// the provided timeout, this method does nothing.
	pub fn add_timeout(&mut self, timeout: Duration) -> Result<()> {
		match Instant::now().checked_add(timeout) {
			Some(deadline) => {
				self.add_deadline(deadline);
				Ok(())
			}
			None => Err(Error::InvalidConfig(format!("timeout of {timeout:?} overflows"))),
		}
	}

	/// Check if the context is done. If it returns `None` the operation may
	/// proceed, otherwise the operation should be stopped.
	/// Reading the clock costs far more than reading the cancellation flag,
	/// so the deadline is only checked when `deep_check` is set.
	pub fn done(&self, deep_check: bool) -> Option<Reason> {
		match self.deadline {
			Some(deadline) if deep_check && deadline <= Instant::now() => Some(Reason::Timedout),
			_ if self.cancelled.load(Ordering::Relaxed) => Some(Reason::Canceled),
			_ => match &self.parent {
				Some(ctx) => ctx.done(deep_check),
				_ => None,
			},
		}
	}

	/// Check if the context is ok to continue.
	pub fn is_ok(&self, deep_check: bool) -> bool {
		self.done(deep_check).is_none()
	}

	/// Check if the context is not ok to continue.
	pub fn is_done(&self, deep_check: bool) -> bool {
		self.done(deep_check).is_some()
	}
}
