//! Bootstrap result accumulators.
//!
//! A [`RunResult`] collects everything one `(namespace, run type)` invocation
//! produces: fulfilled and unfulfilled coverage for both the data and index
//! sides, and the per-block index state (documents builder while building,
//! segments once sealed or read back from disk).
//!
//! `RunResult` carries no lock of its own; the driver shares one behind an
//! `RwLock` and workers take the write side for the few aggregate mutations
//! they make (builder creation, batch flush, fulfilled/unfulfilled
//! accounting).

use std::collections::BTreeMap;

use strata_core::{
    IndexOptions, NamespaceId, NamespaceMetadata, ShardTimeRanges, TimeRange, UnixNanos,
};
use strata_index::{DocumentsBuilder, Segment};

use crate::error::{Error, Result};

/// Data-side outcome of a run.
#[derive(Debug, Default)]
pub struct DataBootstrapResult {
    pub fulfilled: ShardTimeRanges,
    pub unfulfilled: ShardTimeRanges,
}

/// Index state for one index block start.
#[derive(Debug, Default)]
pub struct IndexBlock {
    /// Mutable builder while the block is being rebuilt from data filesets.
    /// `None` once sealed (or when the block was read from a persisted
    /// fileset and never needed building).
    pub builder: Option<DocumentsBuilder>,

    /// Sealed or read-back segments of this block.
    pub segments: Vec<Segment>,

    /// Shard ranges this block's contents cover.
    pub fulfilled: ShardTimeRanges,

    /// Whether a durable index fileset backs this block.
    pub persisted: bool,
}

impl IndexBlock {
    /// A block read back from a persisted index fileset.
    pub fn from_persisted(segments: Vec<Segment>, fulfilled: ShardTimeRanges) -> Self {
        Self {
            builder: None,
            segments,
            fulfilled,
            persisted: true,
        }
    }
}

/// Index blocks keyed by block start.
#[derive(Debug, Default)]
pub struct IndexResults {
    blocks: BTreeMap<UnixNanos, IndexBlock>,
}

impl IndexResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, start: UnixNanos) -> Option<&IndexBlock> {
        self.blocks.get(&start)
    }

    pub fn get_mut(&mut self, start: UnixNanos) -> Option<&mut IndexBlock> {
        self.blocks.get_mut(&start)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnixNanos, &IndexBlock)> {
        self.blocks.iter().map(|(s, b)| (*s, b))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (UnixNanos, &mut IndexBlock)> {
        self.blocks.iter_mut().map(|(s, b)| (*s, b))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The documents builder for `start`, created lazily on first use and
    /// never recreated within a run.
    pub fn get_or_add_documents_builder(&mut self, start: UnixNanos) -> &mut DocumentsBuilder {
        self.blocks
            .entry(start)
            .or_default()
            .builder
            .get_or_insert_with(DocumentsBuilder::new)
    }

    /// Record that `ranges` of the block at `start` are covered.
    ///
    /// The block must already exist, created through
    /// [`get_or_add_documents_builder`] or [`add_block`]; marking an absent
    /// block fulfilled means the caller attributed coverage to a block that
    /// was never built. Every range must fall inside
    /// `[start, start + index block size)`.
    ///
    /// [`get_or_add_documents_builder`]: IndexResults::get_or_add_documents_builder
    /// [`add_block`]: IndexResults::add_block
    pub fn mark_fulfilled(
        &mut self,
        start: UnixNanos,
        ranges: ShardTimeRanges,
        index_opts: &IndexOptions,
    ) -> Result<()> {
        let block_range = TimeRange::new(start, start + index_opts.block_size);
        for (_, shard_ranges) in ranges.iter() {
            for range in shard_ranges.iter() {
                if !range.contained_by(&block_range) {
                    return Err(Error::RangeOutsideBlock {
                        block_start: start,
                        range: *range,
                    });
                }
            }
        }
        let block = self
            .blocks
            .get_mut(&start)
            .ok_or(Error::BlockNotFound { block_start: start })?;
        block.fulfilled.add_ranges(&ranges);
        Ok(())
    }

    /// Merge a whole block in (fast-path reads and result merging).
    pub fn add_block(&mut self, start: UnixNanos, block: IndexBlock) {
        match self.blocks.entry(start) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(block);
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.segments.extend(block.segments);
                existing.fulfilled.add_ranges(&block.fulfilled);
                existing.persisted |= block.persisted;
                if existing.builder.is_none() {
                    existing.builder = block.builder;
                }
            }
        }
    }

    /// Union of every block's fulfilled ranges.
    pub fn fulfilled(&self) -> ShardTimeRanges {
        let mut out = ShardTimeRanges::new();
        for block in self.blocks.values() {
            out.add_ranges(&block.fulfilled);
        }
        out
    }
}

/// Index-side outcome of a run.
#[derive(Debug, Default)]
pub struct IndexBootstrapResult {
    pub results: IndexResults,
    pub unfulfilled: ShardTimeRanges,
}

impl IndexBootstrapResult {
    /// Union of fulfilled ranges across all index blocks.
    pub fn fulfilled(&self) -> ShardTimeRanges {
        self.results.fulfilled()
    }
}

/// Everything one `(namespace, run type)` invocation produced.
#[derive(Debug, Default)]
pub struct RunResult {
    pub data: DataBootstrapResult,
    pub index: IndexBootstrapResult,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine two results, e.g. the persisted-index fast path with the
    /// reader pipeline's output.
    pub fn merged(self, other: RunResult) -> RunResult {
        RunResult {
            data: merged_data_result(self.data, other.data),
            index: merged_index_result(self.index, other.index),
        }
    }
}

pub fn merged_data_result(a: DataBootstrapResult, b: DataBootstrapResult) -> DataBootstrapResult {
    let mut out = a;
    out.fulfilled.add_ranges(&b.fulfilled);
    out.unfulfilled.add_ranges(&b.unfulfilled);
    out
}

pub fn merged_index_result(
    a: IndexBootstrapResult,
    b: IndexBootstrapResult,
) -> IndexBootstrapResult {
    let mut out = a;
    out.unfulfilled.add_ranges(&b.unfulfilled);
    for (start, block) in b.results.blocks {
        out.results.add_block(start, block);
    }
    out
}

/// Final result for one namespace.
#[derive(Debug)]
pub struct NamespaceResult {
    pub metadata: NamespaceMetadata,
    pub data: DataBootstrapResult,
    pub index: Option<IndexBootstrapResult>,
}

/// Results of a full bootstrap, keyed by namespace.
#[derive(Debug, Default)]
pub struct NamespaceResults {
    results: BTreeMap<NamespaceId, NamespaceResult>,
}

impl NamespaceResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NamespaceId, result: NamespaceResult) {
        self.results.insert(id, result);
    }

    pub fn get(&self, id: &NamespaceId) -> Option<&NamespaceResult> {
        self.results.get(id)
    }

    pub fn get_mut(&mut self, id: &NamespaceId) -> Option<&mut NamespaceResult> {
        self.results.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NamespaceId, &NamespaceResult)> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strata_core::TimeRanges;

    fn range(start_secs: i64, end_secs: i64) -> TimeRange {
        TimeRange::new(UnixNanos::from_secs(start_secs), UnixNanos::from_secs(end_secs))
    }

    fn index_opts() -> IndexOptions {
        IndexOptions {
            enabled: true,
            block_size: Duration::from_secs(7200),
        }
    }

    #[test]
    fn test_builder_created_lazily_once() {
        let mut results = IndexResults::new();
        let start = UnixNanos::from_secs(0);
        results.get_or_add_documents_builder(start);
        results
            .get_or_add_documents_builder(start)
            .insert_batch(&mut vec![]);
        assert_eq!(results.len(), 1);
        assert!(results.get(start).unwrap().builder.is_some());
    }

    #[test]
    fn test_mark_fulfilled_inside_block() {
        let mut results = IndexResults::new();
        let start = UnixNanos::from_secs(0);
        results.get_or_add_documents_builder(start);
        results
            .mark_fulfilled(start, ShardTimeRanges::single(0, range(0, 7200)), &index_opts())
            .unwrap();
        assert_eq!(
            results.fulfilled(),
            ShardTimeRanges::single(0, range(0, 7200))
        );
    }

    #[test]
    fn test_mark_fulfilled_outside_block_rejected() {
        let mut results = IndexResults::new();
        let start = UnixNanos::from_secs(0);
        results.get_or_add_documents_builder(start);
        let err = results
            .mark_fulfilled(
                start,
                ShardTimeRanges::single(0, range(0, 7201)),
                &index_opts(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::RangeOutsideBlock { .. }));
        assert!(results.fulfilled().is_empty());
    }

    #[test]
    fn test_mark_fulfilled_absent_block_rejected() {
        let mut results = IndexResults::new();
        let err = results
            .mark_fulfilled(
                UnixNanos::from_secs(0),
                ShardTimeRanges::single(0, range(0, 7200)),
                &index_opts(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::BlockNotFound { .. }));
        assert!(results.is_empty());
    }

    #[test]
    fn test_add_block_merges() {
        let mut results = IndexResults::new();
        let start = UnixNanos::from_secs(0);
        results.add_block(
            start,
            IndexBlock::from_persisted(vec![], ShardTimeRanges::single(0, range(0, 3600))),
        );
        results.add_block(
            start,
            IndexBlock::from_persisted(vec![], ShardTimeRanges::single(1, range(0, 7200))),
        );
        let block = results.get(start).unwrap();
        assert!(block.persisted);
        let mut expect = ShardTimeRanges::single(0, range(0, 3600));
        expect.add_range(1, range(0, 7200));
        assert_eq!(block.fulfilled, expect);
    }

    #[test]
    fn test_merged_results() {
        let mut a = RunResult::new();
        a.data.fulfilled.add_range(0, range(0, 3600));
        a.index.unfulfilled.add_range(0, range(0, 3600));

        let mut b = RunResult::new();
        b.data.fulfilled.add_range(0, range(3600, 7200));
        b.index
            .results
            .add_block(UnixNanos::from_secs(0), IndexBlock::default());

        let merged = a.merged(b);
        assert_eq!(
            merged.data.fulfilled.get(0).unwrap(),
            &TimeRanges::from_range(range(0, 7200))
        );
        assert_eq!(merged.index.results.len(), 1);
        assert_eq!(
            merged.index.unfulfilled,
            ShardTimeRanges::single(0, range(0, 3600))
        );
    }
}
