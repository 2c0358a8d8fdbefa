//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use crate::models::{CategoryId, MangaId};
use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// A failed mutation never leaves a partial record behind.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The storage medium is unavailable, or a read/write failed.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The configuration could not produce a usable database location.
    #[display("invalid store configuration")]
    Config,
    #[display("could not start the store runtime")]
    Runtime,
    #[display("store operation timed out")]
    Timeout,
    /// A manga referenced by an operation does not exist.
    #[display("manga not found: {_0}")]
    MangaNotFound(#[error(not(source))] MangaId),
    /// A category referenced by an operation does not exist.
    #[display("category not found: {_0}")]
    CategoryNotFound(#[error(not(source))] CategoryId),
    /// Input rejected before it reached the database.
    #[display("invalid input: {_0}")]
    Validation(#[error(not(source))] &'static str),
    /// A stored row could not be mapped back into a model.
    #[display("invalid store data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Timeout)
    }

    /// Returns `true` if the operation referenced a record that doesn't exist.
    pub fn is_referential(&self) -> bool {
        matches!(self, Self::MangaNotFound(_) | Self::CategoryNotFound(_))
    }
}
