//! Error types for the three stages.

use std::io;

/// Result of signature and delta generation.
pub type Result<T> = std::result::Result<T, Error>;

/// Result of delta application. `E` is the error type of the operation
/// stream feeding the applier.
pub type ApplyResult<T, E> = std::result::Result<T, ApplyError<E>>;

/// Error produced while generating a signature or a delta.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error produced while applying a delta.
///
/// Every variant carries `progress`: the number of bytes already written to
/// the output sink when the error surfaced. Output written before the error
/// is not rolled back; a caller that wants to resume can seek the sink to
/// `progress` and replay the remaining operations through a fresh apply.
#[derive(thiserror::Error, Debug)]
pub enum ApplyError<E> {
    /// Reading the base or writing the output failed.
    #[error("I/O error at output offset {progress}: {source}")]
    Io { source: io::Error, progress: u64 },
    /// The operation stream itself yielded an error.
    #[error("operation stream failed at output offset {progress}")]
    OpStream { source: E, progress: u64 },
    /// An operation referenced a block the base does not have.
    #[error("block {index} is out of range of the base (output offset {progress})")]
    MissingBlock { index: u64, progress: u64 },
    /// An operation violated the delta invariants.
    #[error("malformed operation at output offset {progress}: {reason}")]
    Malformed { reason: &'static str, progress: u64 },
}
