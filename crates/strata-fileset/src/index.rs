//! Index fileset write and read.
//!
//! An index fileset holds one serialized inverted-index segment for one
//! index block, plus an info file naming the shard set the segment covers.
//!
//! ## Segment file format
//!
//! ```text
//! ┌───────────┬──────────┬───────────┬───────────────┬──────────┐
//! │ Magic     │ Version  │ Doc count │ Documents     │ CRC32    │
//! │ "SSEG"    │ (2 bytes)│ (4 bytes) │               │ (4 bytes)│
//! └───────────┴──────────┴───────────┴───────────────┴──────────┘
//!
//! Document:
//! ┌─────────┬────┬─────────────┬────────────────────────────────┐
//! │ Id len  │ Id │ Field count │ Fields (len-prefixed           │
//! │ (2)     │    │ (2)         │ name/value pairs)              │
//! └─────────┴────┴─────────────┴────────────────────────────────┘
//! ```
//!
//! The CRC covers the documents region.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use strata_core::NamespaceId;
use strata_index::{Document, Field, Segment};

use crate::error::{Error, Result};
use crate::info::{self, IndexFilesetId, InfoFile};
use crate::layout::{fileset_path, FileKind, FilesetOptions};

pub(crate) const SEGMENT_MAGIC: &[u8; 4] = b"SSEG";
pub(crate) const SEGMENT_VERSION: u16 = 1;

/// Serialize a segment into its on-disk form.
pub fn encode_segment(segment: &Segment) -> Result<Bytes> {
    let mut docs = BytesMut::new();
    for doc in segment.docs() {
        if doc.id.len() > u16::MAX as usize || doc.fields.len() > u16::MAX as usize {
            return Err(Error::EntryTooLarge("document".to_string()));
        }
        docs.put_u16(doc.id.len() as u16);
        docs.put_slice(&doc.id);
        docs.put_u16(doc.fields.len() as u16);
        for field in &doc.fields {
            if field.name.len() > u16::MAX as usize || field.value.len() > u16::MAX as usize {
                return Err(Error::EntryTooLarge("document field".to_string()));
            }
            docs.put_u16(field.name.len() as u16);
            docs.put_slice(&field.name);
            docs.put_u16(field.value.len() as u16);
            docs.put_slice(&field.value);
        }
    }

    let mut buf = BytesMut::with_capacity(14 + docs.len());
    buf.put_slice(SEGMENT_MAGIC);
    buf.put_u16(SEGMENT_VERSION);
    buf.put_u32(segment.num_docs() as u32);
    buf.put_u32(crc32fast::hash(&docs));
    buf.put_slice(&docs);
    Ok(buf.freeze())
}

/// Parse a segment from its on-disk form.
pub fn decode_segment(data: &Bytes) -> Result<Segment> {
    if data.len() < 14 {
        return Err(Error::Truncated("segment file".to_string()));
    }
    let mut cursor = &data[..];
    let mut magic = [0u8; 4];
    cursor.copy_to_slice(&mut magic);
    if &magic != SEGMENT_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = cursor.get_u16();
    if version != SEGMENT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let doc_count = cursor.get_u32() as usize;
    let stored_crc = cursor.get_u32();
    if crc32fast::hash(cursor) != stored_crc {
        return Err(Error::ChecksumMismatch);
    }

    let mut docs = Vec::with_capacity(doc_count);
    for index in 0..doc_count {
        let corrupt = |reason: &str| Error::CorruptEntry {
            index: index as u64,
            reason: reason.to_string(),
        };
        let mut slice_at = |cursor: &mut &[u8], n: usize| -> Result<Bytes> {
            if cursor.remaining() < n {
                return Err(corrupt("truncated field"));
            }
            let start = data.len() - cursor.remaining();
            cursor.advance(n);
            Ok(data.slice(start..start + n))
        };

        if cursor.remaining() < 2 {
            return Err(corrupt("missing id length"));
        }
        let id_len = cursor.get_u16() as usize;
        let id = slice_at(&mut cursor, id_len)?;
        if cursor.remaining() < 2 {
            return Err(corrupt("missing field count"));
        }
        let field_count = cursor.get_u16() as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            if cursor.remaining() < 2 {
                return Err(corrupt("missing field name length"));
            }
            let name_len = cursor.get_u16() as usize;
            let name = slice_at(&mut cursor, name_len)?;
            if cursor.remaining() < 2 {
                return Err(corrupt("missing field value length"));
            }
            let value_len = cursor.get_u16() as usize;
            let value = slice_at(&mut cursor, value_len)?;
            fields.push(Field { name, value });
        }
        docs.push(Document { id, fields });
    }
    if cursor.has_remaining() {
        return Err(Error::Truncated("trailing bytes after documents".to_string()));
    }
    Ok(Segment::new(docs))
}

/// Write an index fileset: segment file first, info file last.
pub async fn write_index_fileset(
    fs: &FilesetOptions,
    ns: &NamespaceId,
    info: &InfoFile,
    segment: &Segment,
) -> Result<()> {
    let dir = fs.index_namespace_dir(ns);
    let encoded = encode_segment(segment)?;
    let segment_path = fileset_path(&dir, info.block_start, info.volume_index, FileKind::Segment);
    crate::data::write_file_atomic(&segment_path, &encoded).await?;
    info::write_info_file(&dir, info).await
}

/// Read the segments of a persisted index fileset.
pub async fn read_index_segments(
    fs: &FilesetOptions,
    ns: &NamespaceId,
    id: IndexFilesetId,
) -> Result<Vec<Segment>> {
    let dir = fs.index_namespace_dir(ns);
    let segment_path = fileset_path(&dir, id.block_start, id.volume, FileKind::Segment);
    let data = Bytes::from(tokio::fs::read(&segment_path).await?);
    Ok(vec![decode_segment(&data)?])
}
