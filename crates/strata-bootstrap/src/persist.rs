//! The index persist sidecar.
//!
//! Once a worker fully fulfills an index time window and the run allows
//! persistence, the window's sealed segments are flushed to durable index
//! filesets so the next bootstrap takes the persisted-blocks fast path
//! instead of rebuilding from data filesets.

use std::sync::Arc;

use strata_core::{NamespaceMetadata, ShardId, ShardTimeRanges, TimeRange, UnixNanos};
use strata_index::Segment;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;
use crate::metrics;
use crate::result::RunResult;
use strata_fileset::PersistManager;

/// Flush every fully-built index block overlapping `requested` to a durable
/// index fileset.
///
/// The caller guarantees the window completed with nothing remaining, so no
/// partial block is ever handed to the persist manager. Sealed segments are
/// kept on the block regardless of the flush outcome; a flush failure only
/// loses the durability shortcut, not the in-memory index.
pub async fn persist_bootstrap_index_segment(
    md: &NamespaceMetadata,
    requested: &ShardTimeRanges,
    run_result: &Arc<RwLock<RunResult>>,
    persist_manager: &PersistManager,
) -> Result<()> {
    let index_block_size = md.options.index.block_size;

    let mut to_persist: Vec<(UnixNanos, Vec<ShardId>, Segment)> = Vec::new();
    {
        let mut guard = run_result.write().await;
        for (start, block) in guard.index.results.iter_mut() {
            if block.persisted {
                continue;
            }
            let block_range = TimeRange::new(start, start + index_block_size);
            let overlaps = requested
                .iter()
                .any(|(_, ranges)| ranges.overlaps_range(&block_range));
            if !overlaps {
                continue;
            }
            let Some(builder) = block.builder.as_mut() else {
                continue;
            };
            let segment = builder.seal();
            block.builder = None;
            block.segments.push(segment.clone());
            let shards: Vec<ShardId> = block.fulfilled.shards().collect();
            to_persist.push((start, shards, segment));
        }
    }

    for (start, shards, segment) in to_persist {
        persist_manager
            .flush_index_segment(&md.id, start, index_block_size, shards, &segment)
            .await?;
        if let Some(block) = run_result.write().await.index.results.get_mut(start) {
            block.persisted = true;
        }
        metrics::PERSISTED_INDEX_BLOCKS_WRITE.inc();
        info!(
            namespace = %md.id,
            block_start = %start,
            "bootstrapped index segment persisted"
        );
    }

    Ok(())
}
