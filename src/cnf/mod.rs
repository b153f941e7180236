use std::sync::LazyLock;

/// The number of rows requested by the first bulk fetch of a cursor.
pub static INITIAL_FETCH_SIZE: LazyLock<u32> =
	lazy_env_parse!("IDXCURSOR_INITIAL_FETCH_SIZE", u32, 16);

/// The maximum number of rows requested by a single bulk fetch.
pub static MAX_FETCH_SIZE: LazyLock<u32> = lazy_env_parse!("IDXCURSOR_MAX_FETCH_SIZE", u32, 1000);

/// The preferred size in bytes of a cursor row buffer (defaults to 128 KiB).
pub static ROW_BUFFER_PREFERRED_SIZE: LazyLock<usize> =
	lazy_env_parse!("IDXCURSOR_ROW_BUFFER_SIZE", usize, 128 * 1024);

/// How many fetch batches pass between deadline checks.
/// Cancellation flags are checked on every batch.
pub static INTERRUPT_CHECK_BATCHES: LazyLock<u64> =
	lazy_env_parse!("IDXCURSOR_INTERRUPT_CHECK_BATCHES", u64, 8);
