use thiserror::Error;

/// The result type returned by cursors and storage engines.
pub type Result<T> = std::result::Result<T, Error>;

/// An error originating from an index cursor or the engine beneath it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// The cursor encountered unreachable logic
	#[error("The cursor encountered unreachable logic: {0}")]
	Unreachable(String),

	/// There was a problem with the underlying datastore
	#[error("There was a problem with the underlying datastore: {0}")]
	Ds(String),

	/// The index changed incompatibly with the snapshot of an open cursor
	#[error(
		"Failed to continue the scan because the index was modified concurrently. This transaction can be retried"
	)]
	TxRetryable,

	/// The query timedout
	#[error("The query was not executed because it exceeded the timeout")]
	QueryTimedout,

	/// The query did not execute, because the transaction was cancelled
	#[error("The query was not executed due to a cancelled transaction")]
	QueryCancelled,

	/// The cursor was read before it was positioned on a row
	#[error("The cursor is not positioned on a row")]
	CursorUnpositioned,

	/// A document was requested from a cursor which only counts keys
	#[error("A count-only cursor does not materialize documents")]
	CountOnlyDocument,

	/// A count-only cursor was requested over a multikey index
	#[error("Unable to count keys of the multikey index '{0}' without deduplicating documents")]
	CountOnlyMultikey(String),

	/// Tailing was requested on a cursor which does not scan forwards
	#[error("Only forward cursors can be made tailable")]
	TailableBackward,

	/// The cursor configuration was not valid
	#[error("Invalid cursor configuration: {0}")]
	InvalidConfig(String),
}

impl Error {
	/// Check if this error is a retryable snapshot conflict.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::TxRetryable)
	}

	/// Check if this error was caused by the operation being interrupted.
	pub fn is_interrupted(&self) -> bool {
		matches!(self, Error::QueryCancelled | Error::QueryTimedout)
	}
}
