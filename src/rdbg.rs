// (c) Roel Kluin, 2023, GPL v3

/// eprintln, but only in debug builds. The location is prefixed.
#[macro_export]
macro_rules! dbg_print {
	($($arg:tt)*) => ({
		if cfg!(debug_assertions) {
			eprintln!("[{}:{}] {}", file!(), line!(), format_args!($($arg)*));
		}
	})
}

#[macro_export]
macro_rules! dbg_assert {
	($($arg:tt)*) => ({
		if cfg!(debug_assertions) {
			assert!($($arg)*);
		}
	})
}

#[macro_export]
macro_rules! dbg_assert_eq {
	($($arg:tt)*) => ({
		if cfg!(debug_assertions) {
			assert_eq!($($arg)*);
		}
	})
}
