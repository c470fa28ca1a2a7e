//! Info files and their enumerators.
//!
//! The info file is the small metadata record that makes a fileset
//! discoverable: block start, block size, covered shards, volume index and
//! entry count. It is written last during a flush, so its presence marks a
//! complete fileset.
//!
//! ## Envelope
//!
//! ```text
//! ┌───────────┬──────────┬─────────────┬──────────────┬──────────┐
//! │ Magic     │ Version  │ Payload len │ JSON payload │ CRC32    │
//! │ "SIFO"    │ (2 bytes)│ (4 bytes)   │ (N bytes)    │ (4 bytes)│
//! └───────────┴──────────┴─────────────┴──────────────┴──────────┘
//! ```
//!
//! The CRC covers the payload only. Enumeration never fails on a corrupt
//! file: each file yields its own `Result` so callers can log and skip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use strata_core::{NamespaceId, ShardId, TimeRange, UnixNanos};

use crate::error::{Error, Result};
use crate::layout::{self, FileKind, FilesetOptions};

pub(crate) const INFO_MAGIC: &[u8; 4] = b"SIFO";
pub(crate) const INFO_VERSION: u16 = 1;

/// Durable per-fileset metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoFile {
    pub block_start: UnixNanos,
    /// Width of the block in nanoseconds.
    pub block_size: u64,
    /// Shards covered. One entry for data filesets, the covered set for
    /// index filesets.
    pub shards: Vec<ShardId>,
    pub volume_index: u32,
    pub entry_count: u64,
}

impl InfoFile {
    pub fn block_range(&self) -> TimeRange {
        TimeRange::new(
            self.block_start,
            self.block_start + Duration::from_nanos(self.block_size),
        )
    }
}

/// Serialize an info file into its on-disk envelope.
pub fn encode_info_file(info: &InfoFile) -> Result<Bytes> {
    let payload = serde_json::to_vec(info)
        .map_err(|e| Error::CorruptInfoFile(format!("encode failed: {e}")))?;
    let mut buf = BytesMut::with_capacity(14 + payload.len());
    buf.put_slice(INFO_MAGIC);
    buf.put_u16(INFO_VERSION);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    buf.put_u32(crc32fast::hash(&payload));
    Ok(buf.freeze())
}

/// Parse an info file from its on-disk envelope.
pub fn decode_info_file(data: &[u8]) -> Result<InfoFile> {
    if data.len() < 14 {
        return Err(Error::CorruptInfoFile("shorter than envelope".to_string()));
    }
    let mut cursor = data;
    let mut magic = [0u8; 4];
    cursor.copy_to_slice(&mut magic);
    if &magic != INFO_MAGIC {
        return Err(Error::CorruptInfoFile("bad magic".to_string()));
    }
    let version = cursor.get_u16();
    if version != INFO_VERSION {
        return Err(Error::CorruptInfoFile(format!(
            "unsupported version {version}"
        )));
    }
    let payload_len = cursor.get_u32() as usize;
    if cursor.remaining() < payload_len + 4 {
        return Err(Error::CorruptInfoFile("truncated payload".to_string()));
    }
    let payload = &cursor[..payload_len];
    cursor.advance(payload_len);
    let stored_crc = cursor.get_u32();
    if crc32fast::hash(payload) != stored_crc {
        return Err(Error::CorruptInfoFile("payload CRC mismatch".to_string()));
    }
    serde_json::from_slice(payload)
        .map_err(|e| Error::CorruptInfoFile(format!("decode failed: {e}")))
}

pub async fn read_info_file(path: &Path) -> Result<InfoFile> {
    let data = tokio::fs::read(path).await?;
    decode_info_file(&data)
}

/// One entry of an info-file enumeration.
#[derive(Debug)]
pub struct InfoFileResult {
    pub block_start: UnixNanos,
    pub volume: u32,
    pub path: PathBuf,
    pub result: Result<InfoFile>,
}

/// Identifier of an index fileset within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexFilesetId {
    pub block_start: UnixNanos,
    pub volume: u32,
}

/// One entry of an index info-file enumeration.
#[derive(Debug)]
pub struct IndexInfoFileResult {
    pub id: IndexFilesetId,
    pub path: PathBuf,
    pub result: Result<InfoFile>,
}

/// List every data info file of a shard, corrupt ones included.
///
/// A missing shard directory yields an empty list. Results are ordered by
/// `(block_start, volume)`.
pub async fn read_info_files(
    opts: &FilesetOptions,
    ns: &NamespaceId,
    shard: ShardId,
) -> Vec<InfoFileResult> {
    let dir = opts.data_shard_dir(ns, shard);
    let mut out = Vec::new();
    for (block_start, volume, path) in list_info_paths(&dir).await {
        let result = read_info_file(&path).await;
        out.push(InfoFileResult {
            block_start,
            volume,
            path,
            result,
        });
    }
    out
}

/// List every index info file of a namespace, corrupt ones included.
pub async fn read_index_info_files(
    opts: &FilesetOptions,
    ns: &NamespaceId,
) -> Vec<IndexInfoFileResult> {
    let dir = opts.index_namespace_dir(ns);
    let mut out = Vec::new();
    for (block_start, volume, path) in list_info_paths(&dir).await {
        let result = read_info_file(&path).await;
        out.push(IndexInfoFileResult {
            id: IndexFilesetId {
                block_start,
                volume,
            },
            path,
            result,
        });
    }
    out
}

async fn list_info_paths(dir: &Path) -> Vec<(UnixNanos, u32, PathBuf)> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((block_start, volume)) = layout::parse_info_file_name(name) {
            found.push((block_start, volume, entry.path()));
        }
    }
    found.sort_by_key(|&(start, volume, _)| (start, volume));
    found
}

/// Write an info file atomically (temp file, then rename).
pub async fn write_info_file(dir: &Path, info: &InfoFile) -> Result<()> {
    let encoded = encode_info_file(info)?;
    let path = layout::fileset_path(dir, info.block_start, info.volume_index, FileKind::Info);
    crate::data::write_file_atomic(&path, &encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_info() -> InfoFile {
        InfoFile {
            block_start: UnixNanos::from_secs(7200),
            block_size: 7_200_000_000_000,
            shards: vec![0, 1],
            volume_index: 0,
            entry_count: 10,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let info = sample_info();
        let encoded = encode_info_file(&info).unwrap();
        let decoded = decode_info_file(&encoded).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut encoded = encode_info_file(&sample_info()).unwrap().to_vec();
        encoded[0] = b'X';
        assert!(matches!(
            decode_info_file(&encoded),
            Err(Error::CorruptInfoFile(_))
        ));
    }

    #[test]
    fn test_decode_rejects_flipped_payload_byte() {
        let mut encoded = encode_info_file(&sample_info()).unwrap().to_vec();
        let mid = encoded.len() / 2;
        encoded[mid] ^= 0xFF;
        assert!(matches!(
            decode_info_file(&encoded),
            Err(Error::CorruptInfoFile(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let encoded = encode_info_file(&sample_info()).unwrap();
        for len in [0, 5, 13, encoded.len() - 1] {
            assert!(
                matches!(
                    decode_info_file(&encoded[..len]),
                    Err(Error::CorruptInfoFile(_))
                ),
                "length {len} should be corrupt"
            );
        }
    }

    #[test]
    fn test_block_range() {
        let info = sample_info();
        let range = info.block_range();
        assert_eq!(range.start, UnixNanos::from_secs(7200));
        assert_eq!(range.end, UnixNanos::from_secs(14_400));
    }

    #[tokio::test]
    async fn test_enumerate_mixed_corrupt_dir() {
        let tmp = TempDir::new().unwrap();
        let opts = FilesetOptions::new(tmp.path());
        let ns = NamespaceId::from("ns");
        let dir = opts.data_shard_dir(&ns, 0);
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let good = InfoFile {
            shards: vec![0],
            ..sample_info()
        };
        write_info_file(&dir, &good).await.unwrap();

        // A second volume with garbage contents.
        let bad_path = layout::fileset_path(&dir, good.block_start, 1, FileKind::Info);
        tokio::fs::write(&bad_path, b"not an info file").await.unwrap();

        // An unrelated file that is not part of any fileset.
        tokio::fs::write(dir.join("notes.txt"), b"hi").await.unwrap();

        let results = read_info_files(&opts, &ns, 0).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert_eq!(results[0].volume, 0);
        assert!(results[1].result.is_err());
        assert_eq!(results[1].volume, 1);
    }

    #[tokio::test]
    async fn test_enumerate_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let opts = FilesetOptions::new(tmp.path());
        let results = read_info_files(&opts, &NamespaceId::from("nope"), 9).await;
        assert!(results.is_empty());
    }
}
