//! Append-only documents builder for one index block.

use std::collections::HashSet;

use bytes::Bytes;

use crate::doc::Document;
use crate::segment::Segment;

/// Accumulates the documents of a single index block.
///
/// Inserting the same series id twice keeps the first document; bootstrap
/// sees one document per series per data fileset, and the same series can
/// legitimately appear in multiple filesets of one index block.
///
/// Not internally synchronized. The bootstrap engine serializes all inserts
/// for one builder behind its run-result lock.
#[derive(Debug, Default)]
pub struct DocumentsBuilder {
    docs: Vec<Document>,
    seen: HashSet<Bytes>,
}

impl DocumentsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a batch of documents, draining `batch`.
    pub fn insert_batch(&mut self, batch: &mut Vec<Document>) {
        for doc in batch.drain(..) {
            if self.seen.insert(doc.id.clone()) {
                self.docs.push(doc);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Seal into an immutable segment, consuming the builder's contents.
    pub fn seal(&mut self) -> Segment {
        self.seen.clear();
        let mut docs = std::mem::take(&mut self.docs);
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Segment::new(docs)
    }
}
