//! Error types.
//!
//! Scope operations themselves never fail: they act on in-process
//! references and the only misuse (relying on a scope after disposing it)
//! is absorbed by promotion to the nearest live ancestor. The fallible
//! surface is configuration, covered by [`ConfigError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling a [`ManagerConfig`](crate::ManagerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set to an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Description of the accepted values.
        expected: &'static str,
    },

    /// A config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file could not be parsed.
    #[error("failed to parse config: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// A field holds a value that fails validation.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
