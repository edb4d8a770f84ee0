//! Display-level diagnostics for the command-line tool.
//!
//! A crate-wide atomic verbosity level gates all terminal messaging:
//! 0 = silent, 1 = errors only, 2 = normal (per-file results), 3 = verbose.

use std::sync::atomic::{AtomicU32, Ordering};

/// Current display level; default 2 (normal).
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(2);

/// Returns the current display level.
#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the display level.
#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stderr when the current display level is at least `$level`.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::cli::display::display_level() >= $level {
            eprintln!($($arg)*);
        }
    };
}
