use thiserror::Error;

use crate::err::Error as CursorError;

/// Why a context stopped an operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Reason {
	/// The deadline of the context, or of a parent, has passed
	#[error("the scan deadline has passed")]
	Timedout,
	/// The context, or a parent, was cancelled
	#[error("the scan was cancelled")]
	Canceled,
}

impl From<Reason> for CursorError {
	fn from(reason: Reason) -> Self {
		match reason {
			Reason::Timedout => CursorError::QueryTimedout,
			Reason::Canceled => CursorError::QueryCancelled,
		}
	}
}
