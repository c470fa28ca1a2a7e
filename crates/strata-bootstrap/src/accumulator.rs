//! The data accumulator seam and an in-memory implementation.
//!
//! Bootstrap hands hydrated series blocks to a [`DataAccumulator`] in two
//! steps, mirroring the database's own write path: first check out the
//! series (which registers id and tags and pins the series' slot), then load
//! the block through the returned [`SeriesRef`]. The accumulator provides
//! its own serialization; bootstrap workers call it concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use strata_core::{SeriesId, ShardId, Tags, UnixNanos};

use crate::error::{Error, Result};

/// Whether a loaded block accepts further appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    /// The block is still open for writes within its interval.
    Warm,
    /// The block is immutable.
    Cold,
}

/// One hydrated series block.
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub start: UnixNanos,
    pub block_size: Duration,
    pub data: Bytes,
}

/// Checked-out handle to one series within one shard.
pub trait SeriesRef: Send {
    fn load_block(&self, block: DataBlock, write_type: WriteType) -> Result<()>;
}

/// Destination of bootstrapped series blocks.
pub trait DataAccumulator: Send + Sync {
    /// Check out a series, creating it if unknown. The returned handle keeps
    /// the series' shard slot reachable without re-looking it up per block.
    fn checkout_series(
        &self,
        shard: ShardId,
        id: SeriesId,
        tags: &Tags,
    ) -> Result<Box<dyn SeriesRef>>;
}

type ShardSeries = HashMap<SeriesId, SeriesEntry>;

#[derive(Debug, Default)]
struct SeriesEntry {
    tags: Tags,
    blocks: Vec<DataBlock>,
}

/// Sharded in-memory accumulator: the block cache the database boots into
/// under the cache-all policy, and the double used throughout the tests.
#[derive(Default)]
pub struct MemoryAccumulator {
    shards: RwLock<HashMap<ShardId, Arc<Mutex<ShardSeries>>>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of blocks loaded across all series.
    pub fn blocks_loaded(&self) -> usize {
        let shards = match self.shards.read() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        shards
            .values()
            .map(|shard| {
                shard
                    .lock()
                    .map(|series| series.values().map(|s| s.blocks.len()).sum::<usize>())
                    .unwrap_or(0)
            })
            .sum()
    }

    /// Number of distinct series seen on a shard.
    pub fn series_count(&self, shard: ShardId) -> usize {
        let shards = match self.shards.read() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        shards
            .get(&shard)
            .and_then(|s| s.lock().ok().map(|series| series.len()))
            .unwrap_or(0)
    }

    /// Blocks loaded for one series, ordered by load time.
    pub fn blocks_for(&self, shard: ShardId, id: &SeriesId) -> Vec<DataBlock> {
        let shards = match self.shards.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };
        shards
            .get(&shard)
            .and_then(|s| {
                s.lock()
                    .ok()
                    .map(|series| series.get(id).map(|e| e.blocks.clone()).unwrap_or_default())
            })
            .unwrap_or_default()
    }

    fn shard(&self, shard: ShardId) -> Result<Arc<Mutex<ShardSeries>>> {
        {
            let shards = self
                .shards
                .read()
                .map_err(|_| Error::SeriesCheckout("shard map lock poisoned".to_string()))?;
            if let Some(existing) = shards.get(&shard) {
                return Ok(Arc::clone(existing));
            }
        }
        let mut shards = self
            .shards
            .write()
            .map_err(|_| Error::SeriesCheckout("shard map lock poisoned".to_string()))?;
        Ok(Arc::clone(shards.entry(shard).or_default()))
    }
}

impl DataAccumulator for MemoryAccumulator {
    fn checkout_series(
        &self,
        shard: ShardId,
        id: SeriesId,
        tags: &Tags,
    ) -> Result<Box<dyn SeriesRef>> {
        let shard_series = self.shard(shard)?;
        {
            let mut series = shard_series
                .lock()
                .map_err(|_| Error::SeriesCheckout("shard lock poisoned".to_string()))?;
            series.entry(id.clone()).or_insert_with(|| SeriesEntry {
                tags: tags.clone(),
                blocks: Vec::new(),
            });
        }
        Ok(Box::new(MemorySeriesRef {
            shard: shard_series,
            id,
        }))
    }
}

struct MemorySeriesRef {
    shard: Arc<Mutex<ShardSeries>>,
    id: SeriesId,
}

impl SeriesRef for MemorySeriesRef {
    fn load_block(&self, block: DataBlock, _write_type: WriteType) -> Result<()> {
        let mut series = self
            .shard
            .lock()
            .map_err(|_| Error::LoadBlock("shard lock poisoned".to_string()))?;
        let entry = series
            .get_mut(&self.id)
            .ok_or_else(|| Error::LoadBlock(format!("series {} not checked out", self.id)))?;
        entry.blocks.push(block);
        Ok(())
    }
}
