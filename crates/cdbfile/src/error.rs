use std::io;
use thiserror::Error;

/// Errors raised while building or reading a table.
///
/// A key that is simply absent is **not** an error: lookups return
/// `Ok(None)` and counts return `Ok(0)` in that case.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The file violates the on-disk format (bad directory entry, record
    /// overrunning the data section, ...).
    #[error("corrupt table: {reason}")]
    Corrupt { reason: &'static str },
    /// The handle was finalized or closed and can no longer be used.
    #[error("table is closed")]
    Closed,
    /// The table outgrew its 32-bit offsets (4 GiB of directory + data).
    #[error("table exceeds the 4 GiB format limit")]
    Full,
}

impl Error {
    pub(crate) fn corrupt(reason: &'static str) -> Self {
        Error::Corrupt { reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
