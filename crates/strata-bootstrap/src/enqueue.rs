//! The reader enqueuer: the producer side of the bootstrap pipeline.
//!
//! [`enqueue_readers`] walks the requested shard time ranges in ascending
//! block-start order, opens the filesets that cover each time window through
//! a shared [`ReaderPool`], and sends one [`TimeWindowReaders`] per window
//! into the readers channel. The channel has capacity one, so the producer
//! blocks until a worker takes the previous window — open filesets never
//! pile up beyond worker demand.
//!
//! Open failures are logged and the affected (shard, block) simply has no
//! reader in the window; its range stays in the window's requested ranges
//! and therefore surfaces as unfulfilled downstream. The producer never
//! aborts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use strata_core::{NamespaceMetadata, ShardId, ShardTimeRanges, TimeRange, TimeRanges, UnixNanos};
use strata_fileset::{info, DataFileSetReader, FilesetOptions, InfoFile};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// One unit of work for the worker pool: the union of requested ranges for
/// a single time window, plus the opened readers per shard.
///
/// A shard can appear in `ranges` with no entry in `readers` — that is how
/// "no fileset on disk" and "fileset failed to open" flow through to the
/// unfulfilled accounting.
pub struct TimeWindowReaders {
    pub ranges: ShardTimeRanges,
    pub readers: BTreeMap<ShardId, Vec<DataFileSetReader>>,
}

/// Mailbox of idle readers with a cold-allocation fallback.
///
/// Readers returned to the pool have been cleanly closed; the pool has no
/// notion of a dirty reader.
pub struct ReaderPool {
    idle: Mutex<Vec<DataFileSetReader>>,
    alloc: Box<dyn Fn() -> DataFileSetReader + Send + Sync>,
}

impl ReaderPool {
    pub fn new(alloc: impl Fn() -> DataFileSetReader + Send + Sync + 'static) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            alloc: Box::new(alloc),
        }
    }

    /// Take an idle reader, allocating if the mailbox is empty.
    pub async fn get(&self) -> DataFileSetReader {
        if let Some(reader) = self.idle.lock().await.pop() {
            return reader;
        }
        (self.alloc)()
    }

    /// Return a cleanly closed reader.
    pub async fn put(&self, reader: DataFileSetReader) {
        self.idle.lock().await.push(reader);
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

/// Walk `ranges` in ascending block-start order and send one
/// [`TimeWindowReaders`] per window on `tx`. Closes the channel (by
/// dropping `tx`) once every window is enqueued.
pub async fn enqueue_readers(
    md: Arc<NamespaceMetadata>,
    fs: FilesetOptions,
    ranges: ShardTimeRanges,
    pool: Arc<ReaderPool>,
    tx: mpsc::Sender<TimeWindowReaders>,
    block_size: Duration,
) {
    // Enumerate each shard's filesets once up front, keeping the highest
    // volume per block start.
    let mut filesets: BTreeMap<ShardId, BTreeMap<UnixNanos, InfoFile>> = BTreeMap::new();
    for (shard, _) in ranges.iter() {
        let mut by_start: BTreeMap<UnixNanos, InfoFile> = BTreeMap::new();
        for entry in info::read_info_files(&fs, &md.id, shard).await {
            match entry.result {
                Ok(file) => {
                    by_start.insert(file.block_start, file);
                }
                Err(err) => {
                    warn!(
                        namespace = %md.id,
                        shard = shard,
                        path = %entry.path.display(),
                        error = %err,
                        "skipping corrupt info file while enqueueing readers"
                    );
                }
            }
        }
        filesets.insert(shard, by_start);
    }

    let Some(span) = requested_span(&ranges) else {
        return;
    };
    let mut window_start = span.start.truncate_to(block_size);
    while window_start < span.end {
        let window = TimeRange::new(window_start, window_start + block_size);
        window_start = window.end;

        let mut window_ranges = ShardTimeRanges::new();
        for (shard, shard_ranges) in ranges.iter() {
            let mut intersected = TimeRanges::new();
            for r in shard_ranges.iter() {
                if let Some(part) = r.intersect(&window) {
                    intersected.add_range(part);
                }
            }
            if !intersected.is_empty() {
                window_ranges.insert(shard, intersected);
            }
        }
        if window_ranges.is_empty() {
            continue;
        }

        let mut readers: BTreeMap<ShardId, Vec<DataFileSetReader>> = BTreeMap::new();
        for (shard, shard_ranges) in window_ranges.iter() {
            let Some(by_start) = filesets.get(&shard) else {
                continue;
            };
            for file in by_start.values() {
                let block_range = file.block_range();
                if !block_range.overlaps(&window) || !shard_ranges.overlaps_range(&block_range) {
                    continue;
                }
                let mut reader = pool.get().await;
                match reader
                    .open(&md.id, shard, file.block_start, file.volume_index)
                    .await
                {
                    Ok(()) => {
                        readers.entry(shard).or_default().push(reader);
                    }
                    Err(err) => {
                        warn!(
                            namespace = %md.id,
                            shard = shard,
                            block_start = %file.block_start,
                            volume = file.volume_index,
                            error = %err,
                            "unable to open fileset, leaving range unfulfilled"
                        );
                        pool.put(reader).await;
                    }
                }
            }
        }

        debug!(
            namespace = %md.id,
            window = %window,
            shards = readers.len(),
            "enqueueing time window readers"
        );
        if tx
            .send(TimeWindowReaders {
                ranges: window_ranges,
                readers,
            })
            .await
            .is_err()
        {
            // Consumer went away; nothing left to produce for.
            return;
        }
    }
}

fn requested_span(ranges: &ShardTimeRanges) -> Option<TimeRange> {
    let mut span: Option<TimeRange> = None;
    for (_, shard_ranges) in ranges.iter() {
        for r in shard_ranges.iter() {
            span = Some(match span {
                None => *r,
                Some(s) => TimeRange::new(s.start.min(r.start), s.end.max(r.end)),
            });
        }
    }
    span
}
