//! Streaming data fileset reader.

use std::time::Duration;

use bytes::{Buf, Bytes};
use strata_core::{NamespaceId, SeriesId, ShardId, Tag, Tags, TimeRange, UnixNanos};

use super::{DATA_HEADER_SIZE, DATA_MAGIC, DATA_VERSION, DIGEST_MAGIC, DIGEST_VERSION};
use crate::error::{Error, Result};
use crate::info::InfoFile;
use crate::layout::{fileset_path, FileKind, FilesetOptions};

/// Forward-ordered reader over one data fileset.
///
/// A reader is reusable: `open` loads a fileset, `close` returns the reader
/// to its idle state, and the same reader can then `open` a different
/// fileset. The bootstrap reader pool relies on exactly this lifecycle.
///
/// `read` hands out zero-copy slices of the loaded file, so entry payloads
/// stay valid after the reader moves on or closes.
pub struct DataFileSetReader {
    fs: FilesetOptions,
    state: Option<OpenState>,
}

struct OpenState {
    info: InfoFile,
    data: Bytes,
    pos: usize,
    entries_read: u64,
    data_digest: u32,
    meta_digest: u32,
}

struct Entry {
    id: Bytes,
    tags: Tags,
    data: Bytes,
    /// Byte range of the metadata span within the data file.
    meta_span: (usize, usize),
    next_pos: usize,
}

impl DataFileSetReader {
    pub fn new(fs: FilesetOptions) -> Self {
        Self { fs, state: None }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Open the data fileset at `(ns, shard, block_start, volume)`.
    pub async fn open(
        &mut self,
        ns: &NamespaceId,
        shard: ShardId,
        block_start: UnixNanos,
        volume: u32,
    ) -> Result<()> {
        let dir = self.fs.data_shard_dir(ns, shard);

        let info_path = fileset_path(&dir, block_start, volume, FileKind::Info);
        let info = crate::info::read_info_file(&info_path).await?;

        let data_path = fileset_path(&dir, block_start, volume, FileKind::Data);
        let data = Bytes::from(tokio::fs::read(&data_path).await?);
        if data.len() < DATA_HEADER_SIZE {
            return Err(Error::Truncated("data file shorter than header".to_string()));
        }
        if &data[..4] != DATA_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != DATA_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let digest_path = fileset_path(&dir, block_start, volume, FileKind::Digest);
        let digest = tokio::fs::read(&digest_path).await?;
        let (data_digest, meta_digest) = decode_digest(&digest)?;

        self.state = Some(OpenState {
            info,
            data,
            pos: DATA_HEADER_SIZE,
            entries_read: 0,
            data_digest,
            meta_digest,
        });
        Ok(())
    }

    /// The block interval this fileset covers.
    pub fn range(&self) -> Result<TimeRange> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        Ok(state.info.block_range())
    }

    pub fn block_start(&self) -> Result<UnixNanos> {
        Ok(self.range()?.start)
    }

    pub fn block_size(&self) -> Result<Duration> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        Ok(Duration::from_nanos(state.info.block_size))
    }

    pub fn entries(&self) -> Result<u64> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        Ok(state.info.entry_count)
    }

    /// Read the next entry: identifier, tags, and the block payload.
    pub fn read(&mut self) -> Result<(SeriesId, Tags, Bytes)> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;
        let entry = state.next_entry()?;
        Ok((SeriesId::new(entry.id), entry.tags, entry.data))
    }

    /// Read only the next entry's metadata, skipping the payload.
    pub fn read_metadata(&mut self) -> Result<(SeriesId, Tags)> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;
        let entry = state.next_entry()?;
        Ok((SeriesId::new(entry.id), entry.tags))
    }

    /// Check the whole-file digest against the digest file.
    pub fn validate(&self) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        if crc32fast::hash(&state.data) != state.data_digest {
            return Err(Error::ChecksumMismatch);
        }
        Ok(())
    }

    /// Check the metadata digest (ids and tags of every entry) against the
    /// digest file.
    pub fn validate_metadata(&self) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        let mut hasher = crc32fast::Hasher::new();
        let mut pos = DATA_HEADER_SIZE;
        for index in 0..state.info.entry_count {
            let entry = parse_entry_at(&state.data, pos, index)?;
            hasher.update(&state.data[entry.meta_span.0..entry.meta_span.1]);
            pos = entry.next_pos;
        }
        if hasher.finalize() != state.meta_digest {
            return Err(Error::ChecksumMismatch);
        }
        Ok(())
    }

    /// Release the loaded fileset, returning the reader to its idle state.
    pub fn close(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}

impl OpenState {
    fn next_entry(&mut self) -> Result<Entry> {
        if self.entries_read >= self.info.entry_count {
            return Err(Error::ReadPastEnd);
        }
        let entry = parse_entry_at(&self.data, self.pos, self.entries_read)?;
        self.pos = entry.next_pos;
        self.entries_read += 1;
        Ok(entry)
    }
}

fn decode_digest(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < 14 {
        return Err(Error::Truncated("digest file".to_string()));
    }
    let mut cursor = data;
    let mut magic = [0u8; 4];
    cursor.copy_to_slice(&mut magic);
    if &magic != DIGEST_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = cursor.get_u16();
    if version != DIGEST_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok((cursor.get_u32(), cursor.get_u32()))
}

fn parse_entry_at(data: &Bytes, pos: usize, index: u64) -> Result<Entry> {
    let corrupt = |reason: &str| Error::CorruptEntry {
        index,
        reason: reason.to_string(),
    };

    if data.len() < pos + 8 {
        return Err(corrupt("truncated frame header"));
    }
    let body_len =
        u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
    let stored_crc =
        u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    let body_start = pos + 8;
    if data.len() < body_start + body_len {
        return Err(corrupt("truncated body"));
    }
    let body = &data[body_start..body_start + body_len];
    if crc32fast::hash(body) != stored_crc {
        return Err(corrupt("checksum mismatch"));
    }

    let mut cursor = body;
    let take = |cursor: &mut &[u8], n: usize| -> Result<usize> {
        if cursor.remaining() < n {
            return Err(corrupt("truncated field"));
        }
        let offset = body_len - cursor.remaining();
        cursor.advance(n);
        Ok(body_start + offset)
    };

    if cursor.remaining() < 2 {
        return Err(corrupt("missing id length"));
    }
    let id_len = cursor.get_u16() as usize;
    let id_start = take(&mut cursor, id_len)?;
    let id = data.slice(id_start..id_start + id_len);

    if cursor.remaining() < 2 {
        return Err(corrupt("missing tag count"));
    }
    let tag_count = cursor.get_u16() as usize;
    let mut tags = Tags::new();
    for _ in 0..tag_count {
        if cursor.remaining() < 2 {
            return Err(corrupt("missing tag name length"));
        }
        let name_len = cursor.get_u16() as usize;
        let name_start = take(&mut cursor, name_len)?;
        if cursor.remaining() < 2 {
            return Err(corrupt("missing tag value length"));
        }
        let value_len = cursor.get_u16() as usize;
        let value_start = take(&mut cursor, value_len)?;
        tags.push(Tag::new(
            data.slice(name_start..name_start + name_len),
            data.slice(value_start..value_start + value_len),
        ));
    }
    let meta_end = body_start + (body_len - cursor.remaining());

    if cursor.remaining() < 4 {
        return Err(corrupt("missing data length"));
    }
    let data_len = cursor.get_u32() as usize;
    let data_start = take(&mut cursor, data_len)?;
    if cursor.has_remaining() {
        return Err(corrupt("trailing bytes in body"));
    }

    Ok(Entry {
        id,
        tags,
        data: data.slice(data_start..data_start + data_len),
        meta_span: (body_start, meta_end),
        next_pos: body_start + body_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataFileSetWriter, DataWriterOptions};
    use tempfile::TempDir;

    const BLOCK: Duration = Duration::from_secs(7200);

    fn writer_opts(shard: ShardId, block_start: UnixNanos) -> DataWriterOptions {
        DataWriterOptions {
            namespace: NamespaceId::from("ns"),
            shard,
            block_start,
            block_size: BLOCK,
            volume: 0,
        }
    }

    async fn write_fixture(fs: &FilesetOptions, entries: usize) {
        let mut w = DataFileSetWriter::new(fs.clone(), writer_opts(0, UnixNanos::from_secs(0)));
        for i in 0..entries {
            let id = SeriesId::from(format!("series-{i}").as_str());
            let tags = Tags::from_pairs([("host", "a"), ("idx", "x")]);
            w.write(&id, &tags, format!("payload-{i}").as_bytes()).unwrap();
        }
        w.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let fs = FilesetOptions::new(tmp.path());
        write_fixture(&fs, 3).await;

        let mut r = DataFileSetReader::new(fs);
        r.open(&NamespaceId::from("ns"), 0, UnixNanos::from_secs(0), 0)
            .await
            .unwrap();
        assert_eq!(r.entries().unwrap(), 3);
        assert_eq!(
            r.range().unwrap(),
            TimeRange::new(UnixNanos::from_secs(0), UnixNanos::from_secs(7200))
        );

        for i in 0..3 {
            let (id, tags, data) = r.read().unwrap();
            assert_eq!(id.to_string(), format!("series-{i}"));
            assert_eq!(tags.len(), 2);
            assert_eq!(data, Bytes::from(format!("payload-{i}")));
        }
        assert!(matches!(r.read(), Err(Error::ReadPastEnd)));
        r.validate().unwrap();
        r.validate_metadata().unwrap();
        r.close().unwrap();
        assert!(!r.is_open());
    }

    #[tokio::test]
    async fn test_read_metadata_only() {
        let tmp = TempDir::new().unwrap();
        let fs = FilesetOptions::new(tmp.path());
        write_fixture(&fs, 2).await;

        let mut r = DataFileSetReader::new(fs);
        r.open(&NamespaceId::from("ns"), 0, UnixNanos::from_secs(0), 0)
            .await
            .unwrap();
        let (id, tags) = r.read_metadata().unwrap();
        assert_eq!(id.to_string(), "series-0");
        assert_eq!(tags.len(), 2);
        let (id, _) = r.read_metadata().unwrap();
        assert_eq!(id.to_string(), "series-1");
        r.validate_metadata().unwrap();
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let tmp = TempDir::new().unwrap();
        let fs = FilesetOptions::new(tmp.path());
        write_fixture(&fs, 1).await;

        let mut r = DataFileSetReader::new(fs);
        for _ in 0..2 {
            r.open(&NamespaceId::from("ns"), 0, UnixNanos::from_secs(0), 0)
                .await
                .unwrap();
            let (id, _, _) = r.read().unwrap();
            assert_eq!(id.to_string(), "series-0");
            r.close().unwrap();
        }
    }

    #[tokio::test]
    async fn test_corrupt_entry_detected() {
        let tmp = TempDir::new().unwrap();
        let fs = FilesetOptions::new(tmp.path());
        write_fixture(&fs, 2).await;

        let dir = fs.data_shard_dir(&NamespaceId::from("ns"), 0);
        let data_path = fileset_path(&dir, UnixNanos::from_secs(0), 0, FileKind::Data);
        let mut raw = tokio::fs::read(&data_path).await.unwrap();
        // Flip a byte inside the first entry's body.
        raw[DATA_HEADER_SIZE + 8] ^= 0xFF;
        tokio::fs::write(&data_path, &raw).await.unwrap();

        let mut r = DataFileSetReader::new(fs);
        r.open(&NamespaceId::from("ns"), 0, UnixNanos::from_secs(0), 0)
            .await
            .unwrap();
        assert!(matches!(
            r.read(),
            Err(Error::CorruptEntry { index: 0, .. })
        ));
        assert!(r.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_fileset_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let fs = FilesetOptions::new(tmp.path());
        let mut r = DataFileSetReader::new(fs);
        let err = r
            .open(&NamespaceId::from("ns"), 0, UnixNanos::from_secs(0), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_not_open_errors() {
        let r = DataFileSetReader::new(FilesetOptions::default());
        assert!(matches!(r.range(), Err(Error::NotOpen)));
        assert!(matches!(r.entries(), Err(Error::NotOpen)));
        assert!(matches!(r.validate(), Err(Error::NotOpen)));
    }
}
