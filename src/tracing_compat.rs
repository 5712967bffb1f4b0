//! Logging facade.
//!
//! Scope and manager events go through these macros. With the
//! `tracing-integration` feature (on by default) they are the `tracing`
//! crate's macros; without it they expand to nothing, so a build without
//! the feature carries no logging cost at all.
//!
//! Events emitted by this crate:
//!
//! | level   | event |
//! |---------|-------|
//! | `trace` | scope created, disposed, begun; current value replaced |
//! | `debug` | manager created; current promoted to an ancestor, on disposal or on read |
//! | `warn`  | a scope begun by one manager installed into another |

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn, Level};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

/// Verbosity levels, mirrored when `tracing` is not compiled in.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(u8);

#[cfg(not(feature = "tracing-integration"))]
impl Level {
    /// Trace level.
    pub const TRACE: Self = Self(0);
    /// Debug level.
    pub const DEBUG: Self = Self(1);
    /// Info level.
    pub const INFO: Self = Self(2);
    /// Warn level.
    pub const WARN: Self = Self(3);
    /// Error level.
    pub const ERROR: Self = Self(4);
}
