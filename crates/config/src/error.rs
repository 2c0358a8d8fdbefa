//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking, matching
//! the other crates in the workspace.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// One of the providers could not be read or extracted.
    #[display("unable to load configuration")]
    Load,
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// The configuration was readable but semantically wrong.
    #[display("invalid configuration value: {_0}")]
    Invalid(#[error(not(source))] &'static str),
    #[display("could not determine a data directory for default paths")]
    NoHomeDirectory,
}
