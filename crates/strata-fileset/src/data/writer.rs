//! Data fileset writer.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use strata_core::{NamespaceId, SeriesId, ShardId, Tags, UnixNanos};
use tracing::debug;

use super::{DATA_HEADER_SIZE, DATA_MAGIC, DATA_VERSION, DIGEST_MAGIC, DIGEST_VERSION};
use crate::error::{Error, Result};
use crate::info::{self, InfoFile};
use crate::layout::{fileset_path, FileKind, FilesetOptions};

/// Identity and geometry of the fileset being written.
#[derive(Debug, Clone)]
pub struct DataWriterOptions {
    pub namespace: NamespaceId,
    pub shard: ShardId,
    pub block_start: UnixNanos,
    pub block_size: Duration,
    pub volume: u32,
}

/// Writes one data fileset: data file, digest file, then info file last.
///
/// Entries accumulate in memory; `finish` publishes all three files through
/// temp-and-rename so a crash mid-flush never leaves a readable but
/// incomplete fileset (readers require the info file, which lands last).
pub struct DataFileSetWriter {
    fs: FilesetOptions,
    opts: DataWriterOptions,
    buf: BytesMut,
    meta_hasher: crc32fast::Hasher,
    entry_count: u64,
}

impl DataFileSetWriter {
    pub fn new(fs: FilesetOptions, opts: DataWriterOptions) -> Self {
        let mut buf = BytesMut::new();
        buf.put_slice(DATA_MAGIC);
        buf.put_u16(DATA_VERSION);
        debug_assert_eq!(buf.len(), DATA_HEADER_SIZE);
        Self {
            fs,
            opts,
            buf,
            meta_hasher: crc32fast::Hasher::new(),
            entry_count: 0,
        }
    }

    /// Append one series entry.
    pub fn write(&mut self, id: &SeriesId, tags: &Tags, data: &[u8]) -> Result<()> {
        if id.len() > u16::MAX as usize {
            return Err(Error::EntryTooLarge(format!("id is {} bytes", id.len())));
        }
        if tags.len() > u16::MAX as usize {
            return Err(Error::EntryTooLarge(format!("{} tags", tags.len())));
        }
        if data.len() > u32::MAX as usize {
            return Err(Error::EntryTooLarge(format!("data is {} bytes", data.len())));
        }

        let mut body = BytesMut::new();
        body.put_u16(id.len() as u16);
        body.put_slice(id.as_bytes());
        body.put_u16(tags.len() as u16);
        for tag in tags.iter() {
            if tag.name.len() > u16::MAX as usize || tag.value.len() > u16::MAX as usize {
                return Err(Error::EntryTooLarge("tag name or value".to_string()));
            }
            body.put_u16(tag.name.len() as u16);
            body.put_slice(&tag.name);
            body.put_u16(tag.value.len() as u16);
            body.put_slice(&tag.value);
        }
        let meta_len = body.len();
        body.put_u32(data.len() as u32);
        body.put_slice(data);

        self.meta_hasher.update(&body[..meta_len]);
        self.buf.put_u32(body.len() as u32);
        self.buf.put_u32(crc32fast::hash(&body));
        self.buf.put_slice(&body);
        self.entry_count += 1;
        Ok(())
    }

    pub fn entries(&self) -> u64 {
        self.entry_count
    }

    /// Publish the fileset to disk.
    pub async fn finish(self) -> Result<()> {
        let dir = self.fs.data_shard_dir(&self.opts.namespace, self.opts.shard);

        let data_path = fileset_path(&dir, self.opts.block_start, self.opts.volume, FileKind::Data);
        super::write_file_atomic(&data_path, &self.buf).await?;

        let mut digest = BytesMut::with_capacity(14);
        digest.put_slice(DIGEST_MAGIC);
        digest.put_u16(DIGEST_VERSION);
        digest.put_u32(crc32fast::hash(&self.buf));
        digest.put_u32(self.meta_hasher.finalize());
        let digest_path =
            fileset_path(&dir, self.opts.block_start, self.opts.volume, FileKind::Digest);
        super::write_file_atomic(&digest_path, &digest).await?;

        let info = InfoFile {
            block_start: self.opts.block_start,
            block_size: self.opts.block_size.as_nanos() as u64,
            shards: vec![self.opts.shard],
            volume_index: self.opts.volume,
            entry_count: self.entry_count,
        };
        info::write_info_file(&dir, &info).await?;

        debug!(
            namespace = %self.opts.namespace,
            shard = self.opts.shard,
            block_start = %self.opts.block_start,
            volume = self.opts.volume,
            entries = self.entry_count,
            "data fileset written"
        );
        Ok(())
    }
}
