use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handle which cancels the context it was created from, along with any
/// child contexts.
#[derive(Clone, Debug, Default)]
pub struct Canceller {
	/// A reference to the cancelled value of a context
	cancelled: Arc<AtomicBool>,
}

impl Canceller {
	/// Create a new Canceller
	pub fn new(cancelled: Arc<AtomicBool>) -> Canceller {
		Canceller {
			cancelled,
		}
	}
	/// Cancel the context
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}
}
