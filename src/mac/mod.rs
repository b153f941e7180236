/// Parses a configuration value from an environment variable into a
/// lazily-initialised static.
///
/// When the variable is missing, or cannot be parsed into the requested
/// type, the provided default (or the type default) is used instead.
macro_rules! lazy_env_parse {
	// With no default specified
	($key:expr_2021, $t:ty) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or_default()
		})
	};
	// With a closure for the default value
	($key:expr_2021, $t:ty, || $default:expr_2021) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or_else(|| $default)
		})
	};
	// With a static expression for the default value
	($key:expr_2021, $t:ty, $default:expr_2021) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or($default)
		})
	};
}

/// Returns early with the given error if the condition does not hold.
macro_rules! ensure {
	($cond:expr, $err:expr $(,)?) => {
		if !$cond {
			return Err($err);
		}
	};
}
