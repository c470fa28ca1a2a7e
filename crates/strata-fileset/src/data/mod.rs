//! Data fileset writer and reader.
//!
//! ## Data file format
//!
//! ```text
//! ┌───────────┬──────────┐
//! │ Magic     │ Version  │
//! │ "SDAT"    │ (2 bytes)│
//! ├───────────┴──────────┴──────────────────────────────────────┐
//! │ Entry 1                                                     │
//! │ ┌────────────┬──────────┬──────────────────────────────┐   │
//! │ │ Body len   │ CRC32    │ Body                         │   │
//! │ │ (4 bytes)  │ (4 bytes)│                              │   │
//! │ └────────────┴──────────┴──────────────────────────────┘   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Entry 2 …                                                   │
//! └─────────────────────────────────────────────────────────────┘
//!
//! Body:
//! ┌─────────┬────┬───────────┬──────────────────────┬──────────┬──────┐
//! │ Id len  │ Id │ Tag count │ Tags (len-prefixed   │ Data len │ Data │
//! │ (2)     │    │ (2)       │ name/value pairs)    │ (4)      │      │
//! └─────────┴────┴───────────┴──────────────────────┴──────────┴──────┘
//! ```
//!
//! The *metadata span* of a body runs from the id length through the last
//! tag byte; the digest file's metadata digest is the CRC32 of every entry's
//! metadata span in order, which is what `validate_metadata` recomputes.
//!
//! ## Digest file format
//!
//! ```text
//! ┌───────────┬──────────┬─────────────┬─────────────┐
//! │ Magic     │ Version  │ Data digest │ Meta digest │
//! │ "SDIG"    │ (2 bytes)│ (4 bytes)   │ (4 bytes)   │
//! └───────────┴──────────┴─────────────┴─────────────┘
//! ```
//!
//! The data digest is the CRC32 of the complete data file, header included.
//!
//! Entries are iterated strictly forward. Readers load the whole data file
//! into `Bytes` on open and parse in memory, so per-entry reads are
//! zero-copy slices.

mod reader;
mod writer;

pub use reader::DataFileSetReader;
pub use writer::{DataFileSetWriter, DataWriterOptions};

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;

pub(crate) const DATA_MAGIC: &[u8; 4] = b"SDAT";
pub(crate) const DATA_VERSION: u16 = 1;
pub(crate) const DATA_HEADER_SIZE: usize = 6;

pub(crate) const DIGEST_MAGIC: &[u8; 4] = b"SDIG";
pub(crate) const DIGEST_VERSION: u16 = 1;

/// Write a file via a temp sibling and rename, fsyncing before the rename.
pub(crate) async fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
