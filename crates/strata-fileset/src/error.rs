//! Fileset error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("truncated file: {0}")]
    Truncated(String),

    #[error("corrupt info file: {0}")]
    CorruptInfoFile(String),

    #[error("corrupt entry {index}: {reason}")]
    CorruptEntry { index: u64, reason: String },

    #[error("entry too large: {0}")]
    EntryTooLarge(String),

    #[error("read past the last entry")]
    ReadPastEnd,

    #[error("reader is not open")]
    NotOpen,
}
