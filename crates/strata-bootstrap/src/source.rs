//! The filesystem bootstrapper: availability oracle, driver, entry loader
//! and fast paths.
//!
//! [`FilesystemBootstrapper::read`] is the top-level entrypoint. It executes
//! all data runs across all namespaces first, then all index runs, so the
//! two phases stay independently observable. Each run wires up the
//! producer/consumer pipeline: an enqueue task opens filesets into
//! [`TimeWindowReaders`] units, and a bounded worker pool drains them into a
//! shared [`RunResult`].
//!
//! Two fast paths avoid opening data filesets at all:
//!
//! - Data runs under any cache policy other than cache-all report the
//!   availability the info files promise, leaving hydration to read time.
//! - Index runs first read back already-persisted index filesets and
//!   subtract their coverage from the work plan.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use strata_core::{
    NamespaceId, NamespaceMetadata, SeriesCachePolicy, ShardId, ShardTimeRanges, TimeRange,
    TimeRanges, UnixNanos,
};
use strata_fileset::{info as fileset_info, DataFileSetReader, FilesetType};
use strata_fileset::{index as fileset_index, PersistManager};
use strata_index::Document;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{debug, error, info, warn, Instrument};

use crate::accumulator::{DataAccumulator, DataBlock, WriteType};
use crate::enqueue::{self, ReaderPool, TimeWindowReaders};
use crate::error::{Error, Result};
use crate::metrics;
use crate::options::{BootstrapOptions, RunOptions};
use crate::persist;
use crate::result::{IndexBlock, NamespaceResult, NamespaceResults, RunResult};

/// Which side of the store a run hydrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunType {
    Data,
    Index,
}

/// Ranges and options for one run of one namespace.
#[derive(Debug, Clone)]
pub struct NamespaceRunOptions {
    pub ranges: ShardTimeRanges,
    pub options: RunOptions,
}

/// One namespace's bootstrap request.
#[derive(Clone)]
pub struct Namespace {
    pub metadata: Arc<NamespaceMetadata>,
    pub accumulator: Arc<dyn DataAccumulator>,
    pub data_run: NamespaceRunOptions,
    pub index_run: NamespaceRunOptions,
}

pub type Namespaces = Vec<Namespace>;

/// Bootstraps namespaces from local durable fileset storage.
#[derive(Clone)]
pub struct FilesystemBootstrapper {
    opts: Arc<BootstrapOptions>,
    persist_manager: Arc<PersistManager>,
    data_processors: Arc<Semaphore>,
    index_processors: Arc<Semaphore>,
}

impl FilesystemBootstrapper {
    pub fn new(opts: BootstrapOptions) -> Self {
        metrics::init();
        let persist_manager = Arc::new(PersistManager::new(opts.fs.clone()));
        let data_processors = Arc::new(Semaphore::new(opts.data_processors.max(1)));
        let index_processors = Arc::new(Semaphore::new(opts.index_processors.max(1)));
        Self {
            opts: Arc::new(opts),
            persist_manager,
            data_processors,
            index_processors,
        }
    }

    /// What the on-disk data filesets could plausibly satisfy, without
    /// opening any of them.
    pub async fn available_data(
        &self,
        md: &NamespaceMetadata,
        ranges: &ShardTimeRanges,
    ) -> ShardTimeRanges {
        self.availability(md, ranges).await
    }

    /// Same availability scan for an index run; data filesets are the
    /// source either way.
    pub async fn available_index(
        &self,
        md: &NamespaceMetadata,
        ranges: &ShardTimeRanges,
    ) -> ShardTimeRanges {
        self.availability(md, ranges).await
    }

    /// Bootstrap every namespace: all data runs first, then all index runs.
    pub async fn read(&self, namespaces: Namespaces) -> Result<NamespaceResults> {
        let mut results = NamespaceResults::new();

        let started = Instant::now();
        info!("bootstrapping time series data start");
        for ns in &namespaces {
            let r = self
                .run(
                    RunType::Data,
                    &ns.metadata,
                    &ns.accumulator,
                    ns.data_run.ranges.clone(),
                    &ns.data_run.options,
                )
                .await?;
            results.insert(
                ns.metadata.id.clone(),
                NamespaceResult {
                    metadata: (*ns.metadata).clone(),
                    data: r.data,
                    index: None,
                },
            );
        }
        info!(took = ?started.elapsed(), "bootstrapping time series data success");

        let started = Instant::now();
        info!("bootstrapping index metadata start");
        for ns in &namespaces {
            if !ns.metadata.options.index.enabled {
                info!(
                    namespace = %ns.metadata.id,
                    "index disabled for namespace, skipping index bootstrap"
                );
                continue;
            }
            let r = self
                .run(
                    RunType::Index,
                    &ns.metadata,
                    &ns.accumulator,
                    ns.index_run.ranges.clone(),
                    &ns.index_run.options,
                )
                .await?;
            let entry = results
                .get_mut(&ns.metadata.id)
                .ok_or_else(|| Error::MissingNamespace(ns.metadata.id.clone()))?;
            entry.index = Some(r.index);
        }
        info!(took = ?started.elapsed(), "bootstrapping index metadata success");

        Ok(results)
    }

    async fn run(
        &self,
        run: RunType,
        md: &Arc<NamespaceMetadata>,
        accumulator: &Arc<dyn DataAccumulator>,
        ranges: ShardTimeRanges,
        run_opts: &RunOptions,
    ) -> Result<RunResult> {
        let span = tracing::info_span!("bootstrap_run", namespace = %md.id, run = ?run);
        self.run_inner(run, md, accumulator, ranges, run_opts)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run: RunType,
        md: &Arc<NamespaceMetadata>,
        accumulator: &Arc<dyn DataAccumulator>,
        mut ranges: ShardTimeRanges,
        run_opts: &RunOptions,
    ) -> Result<RunResult> {
        if ranges.is_empty() {
            return Ok(RunResult::new());
        }

        if run == RunType::Data && self.opts.series_cache_policy != SeriesCachePolicy::All {
            // Not caching every series in memory: report availability and
            // let reads hydrate lazily. No filesets are opened.
            return Ok(self.data_result_from_availability(md, &ranges).await);
        }

        let mut merged: Option<RunResult> = None;
        if run == RunType::Index {
            let fast = self.bootstrap_from_index_persisted_blocks(md, &ranges).await;
            ranges.subtract(&fast.fulfilled);
            if let Some(result) = fast.result {
                merged = Some(result);
            }
        }
        if ranges.is_empty() {
            // Fully satisfied by persisted index blocks.
            return Ok(merged.unwrap_or_default());
        }

        // The reader pool lives for exactly one run; readers are not worth
        // keeping allocated outside of bootstrap.
        let fs = self.opts.fs.clone();
        let pool = Arc::new(ReaderPool::new({
            let fs = fs.clone();
            move || DataFileSetReader::new(fs.clone())
        }));
        let (tx, rx) = mpsc::channel(1);
        let block_size = match run {
            RunType::Data => md.options.retention.block_size,
            RunType::Index => md.options.index.block_size,
        };
        tokio::spawn(enqueue::enqueue_readers(
            Arc::clone(md),
            fs,
            ranges,
            Arc::clone(&pool),
            tx,
            block_size,
        ));

        let reader_result = self
            .bootstrap_from_readers(run, md, accumulator, run_opts, pool, rx)
            .await;

        Ok(match merged {
            Some(m) => m.merged(reader_result),
            None => reader_result,
        })
    }

    async fn bootstrap_from_readers(
        &self,
        run: RunType,
        md: &Arc<NamespaceMetadata>,
        accumulator: &Arc<dyn DataAccumulator>,
        run_opts: &RunOptions,
        pool: Arc<ReaderPool>,
        mut rx: mpsc::Receiver<TimeWindowReaders>,
    ) -> RunResult {
        let run_result = Arc::new(RwLock::new(RunResult::new()));
        let processors = match run {
            RunType::Data => &self.data_processors,
            RunType::Index => &self.index_processors,
        };

        let mut workers = Vec::new();
        while let Some(window) = rx.recv().await {
            let permit = Arc::clone(processors)
                .acquire_owned()
                .await
                .expect("bootstrap worker semaphore never closes");
            let this = self.clone();
            let md = Arc::clone(md);
            let accumulator = Arc::clone(accumulator);
            let run_opts = *run_opts;
            let run_result = Arc::clone(&run_result);
            let pool = Arc::clone(&pool);
            workers.push(tokio::spawn(async move {
                this.load_shard_readers_into_result(
                    run,
                    md,
                    accumulator,
                    run_opts,
                    run_result,
                    window,
                    pool,
                )
                .await;
                drop(permit);
            }));
        }
        for worker in join_all(workers).await {
            if let Err(err) = worker {
                error!(error = %err, "bootstrap worker task failed");
            }
        }

        match Arc::try_unwrap(run_result) {
            Ok(lock) => lock.into_inner(),
            Err(_) => {
                // All workers joined above, so the result must be unique.
                error!("bootstrap run result still shared after workers completed");
                RunResult::new()
            }
        }
    }

    /// Process one time window's readers: the per-entry loader (C4).
    #[allow(clippy::too_many_arguments)]
    async fn load_shard_readers_into_result(
        &self,
        run: RunType,
        md: Arc<NamespaceMetadata>,
        accumulator: Arc<dyn DataAccumulator>,
        run_opts: RunOptions,
        run_result: Arc<RwLock<RunResult>>,
        window: TimeWindowReaders,
        pool: Arc<ReaderPool>,
    ) {
        let requested = window.ranges;
        let mut remaining = requested.clone();
        let mut times_with_errors: Vec<UnixNanos> = Vec::new();
        let mut batch: Vec<Document> = Vec::with_capacity(self.opts.index_batch_capacity);
        let mut used: Vec<DataFileSetReader> = Vec::new();

        for (shard, readers) in window.readers {
            for mut reader in readers {
                let time_range = match reader.range() {
                    Ok(range) => range,
                    Err(err) => {
                        error!(shard, error = %err, "reader arrived without an open fileset");
                        continue;
                    }
                };

                let outcome = self
                    .process_reader(run, &md, &accumulator, &run_result, shard, &mut reader, &mut batch)
                    .await;
                match outcome {
                    Ok(()) => {
                        if run == RunType::Data {
                            run_result
                                .write()
                                .await
                                .data
                                .fulfilled
                                .add_range(shard, time_range);
                        }
                        remaining.subtract(&ShardTimeRanges::single(shard, time_range));
                    }
                    Err(err) => {
                        error!(
                            namespace = %md.id,
                            shard,
                            block_start = %time_range.start,
                            error = %err,
                            "error processing fileset reader"
                        );
                        times_with_errors.push(time_range.start);
                        // Documents survive to the builder only when their
                        // reader completes cleanly.
                        batch.clear();
                    }
                }
                used.push(reader);
            }
        }

        let should_persist = run == RunType::Index
            && run_opts.persist.enabled
            && run_opts.persist.fileset_type == FilesetType::Flush
            && remaining.is_empty();
        if should_persist {
            if let Err(err) = persist::persist_bootstrap_index_segment(
                &md,
                &requested,
                &run_result,
                &self.persist_manager,
            )
            .await
            {
                // Unexpected once every input verified cleanly; the
                // in-memory segments remain usable either way.
                error!(
                    namespace = %md.id,
                    requested = %requested,
                    error = %err,
                    "persist of bootstrapped index segment failed (invariant violated)"
                );
            }
        }

        for mut reader in used {
            match reader.close() {
                Ok(()) => pool.put(reader).await,
                Err(err) => {
                    warn!(error = %err, "dropping reader that failed to close");
                }
            }
        }

        self.mark_errors_and_unfulfilled(&run_result, &requested, remaining, times_with_errors)
            .await;
    }

    /// Drive one reader to completion: entries, validation, fulfillment.
    #[allow(clippy::too_many_arguments)]
    async fn process_reader(
        &self,
        run: RunType,
        md: &NamespaceMetadata,
        accumulator: &Arc<dyn DataAccumulator>,
        run_result: &Arc<RwLock<RunResult>>,
        shard: ShardId,
        reader: &mut DataFileSetReader,
        batch: &mut Vec<Document>,
    ) -> Result<()> {
        let time_range = reader.range()?;
        // Readers cover data-block filesets; several of them fold into the
        // same index block when the index block size is a multiple of the
        // data block size.
        let index_block_start = time_range
            .start
            .truncate_to(md.options.index.block_size);

        if run == RunType::Index {
            // Created lazily, exactly once per index block.
            run_result
                .write()
                .await
                .index
                .results
                .get_or_add_documents_builder(index_block_start);
        }

        let num_entries = reader.entries()?;
        for _ in 0..num_entries {
            match run {
                RunType::Data => {
                    self.read_next_entry_and_record_block(md, accumulator, shard, reader)?
                }
                RunType::Index => {
                    self.read_next_entry_and_maybe_index(
                        reader,
                        batch,
                        run_result,
                        index_block_start,
                    )
                    .await?
                }
            }
        }

        if run == RunType::Index {
            flush_batch(run_result, index_block_start, batch).await;
        }

        match run {
            RunType::Data => {
                if self.opts.series_cache_policy == SeriesCachePolicy::All {
                    reader.validate().map_err(Error::ValidationFailed)?;
                } else {
                    return Err(Error::InvalidCachePolicy(self.opts.series_cache_policy));
                }
            }
            RunType::Index => reader.validate_metadata().map_err(Error::ValidationFailed)?,
        }

        if run == RunType::Index {
            run_result.write().await.index.results.mark_fulfilled(
                index_block_start,
                ShardTimeRanges::single(shard, time_range),
                &md.options.index,
            )?;
        }

        Ok(())
    }

    /// Data-run per-entry step: hydrate one series block into the
    /// accumulator as a warm write.
    fn read_next_entry_and_record_block(
        &self,
        md: &NamespaceMetadata,
        accumulator: &Arc<dyn DataAccumulator>,
        shard: ShardId,
        reader: &mut DataFileSetReader,
    ) -> Result<()> {
        if self.opts.series_cache_policy != SeriesCachePolicy::All {
            return Err(Error::InvalidCachePolicy(self.opts.series_cache_policy));
        }
        let block_start = reader.block_start()?;
        let (id, tags, data) = reader.read()?;
        let series = accumulator.checkout_series(shard, id, &tags)?;
        let block = DataBlock {
            start: block_start,
            block_size: md.options.retention.block_size,
            data,
        };
        series.load_block(block, WriteType::Warm)?;
        Ok(())
    }

    /// Index-run per-entry step: convert metadata to a document and batch
    /// it toward the block's builder.
    async fn read_next_entry_and_maybe_index(
        &self,
        reader: &mut DataFileSetReader,
        batch: &mut Vec<Document>,
        run_result: &Arc<RwLock<RunResult>>,
        index_block_start: UnixNanos,
    ) -> Result<()> {
        let (id, tags) = reader.read_metadata()?;
        let doc = Document::from_series(&id, &tags)?;
        batch.push(doc);
        if batch.len() >= self.opts.index_batch_capacity {
            flush_batch(run_result, index_block_start, batch).await;
        }
        Ok(())
    }

    async fn mark_errors_and_unfulfilled(
        &self,
        run_result: &Arc<RwLock<RunResult>>,
        requested: &ShardTimeRanges,
        remaining: ShardTimeRanges,
        times_with_errors: Vec<UnixNanos>,
    ) {
        if !times_with_errors.is_empty() {
            info!(
                requested = %requested,
                times_with_errors = ?times_with_errors,
                "encountered errors for range"
            );
        }
        if !remaining.is_empty() {
            // A failed window conservatively invalidates both sides:
            // partial success is not safely composable downstream.
            let mut guard = run_result.write().await;
            guard.data.unfulfilled.add_ranges(&remaining);
            guard.index.unfulfilled.add_ranges(&remaining);
        }
    }

    async fn availability(
        &self,
        md: &NamespaceMetadata,
        ranges: &ShardTimeRanges,
    ) -> ShardTimeRanges {
        let mut out = ShardTimeRanges::new();
        for (shard, target) in ranges.iter() {
            let avail = self.shard_availability(&md.id, shard, target).await;
            if !avail.is_empty() {
                out.insert(shard, avail);
            }
        }
        out
    }

    async fn shard_availability(
        &self,
        ns: &NamespaceId,
        shard: ShardId,
        target: &TimeRanges,
    ) -> TimeRanges {
        let mut out = TimeRanges::new();
        if target.is_empty() {
            return out;
        }
        for entry in fileset_info::read_info_files(&self.opts.fs, ns, shard).await {
            match entry.result {
                Err(err) => {
                    error!(
                        namespace = %ns,
                        shard,
                        path = %entry.path.display(),
                        error = %err,
                        "unable to read info file during availability scan"
                    );
                }
                Ok(file) => {
                    let block_range = file.block_range();
                    if target.overlaps_range(&block_range) {
                        out.add_range(block_range);
                    }
                }
            }
        }
        out
    }

    /// Data-run fast path when the cache policy does not require full
    /// hydration: availability becomes fulfilled, the rest unfulfilled.
    async fn data_result_from_availability(
        &self,
        md: &NamespaceMetadata,
        ranges: &ShardTimeRanges,
    ) -> RunResult {
        let mut result = RunResult::new();
        for (shard, target) in ranges.iter() {
            if target.is_empty() {
                continue;
            }
            let availability = self.shard_availability(&md.id, shard, target).await;
            let remaining = target.remove_ranges(&availability);
            let fulfilled = target.remove_ranges(&remaining);
            if !fulfilled.is_empty() {
                result.data.fulfilled.insert(shard, fulfilled);
            }
            if !remaining.is_empty() {
                result.data.unfulfilled.insert(shard, remaining);
            }
        }
        debug!(
            namespace = %md.id,
            fulfilled = %result.data.fulfilled,
            unfulfilled = %result.data.unfulfilled,
            "data bootstrap resolved from availability"
        );
        result
    }

    /// Index-run fast path: read back persisted index filesets and report
    /// the coverage they already provide.
    async fn bootstrap_from_index_persisted_blocks(
        &self,
        md: &NamespaceMetadata,
        ranges: &ShardTimeRanges,
    ) -> PersistedBlocksResult {
        let mut out = PersistedBlocksResult {
            fulfilled: ShardTimeRanges::new(),
            result: None,
        };
        let index_block_size = md.options.index.block_size;

        for entry in fileset_info::read_index_info_files(&self.opts.fs, &md.id).await {
            let file = match entry.result {
                Ok(file) => file,
                Err(err) => {
                    error!(
                        namespace = %md.id,
                        path = %entry.path.display(),
                        requested = %ranges,
                        error = %err,
                        "unable to read index info file"
                    );
                    continue;
                }
            };

            let block_range =
                TimeRange::new(file.block_start, file.block_start + index_block_size);
            let mut will_fulfill = ShardTimeRanges::new();
            for shard in &file.shards {
                let Some(shard_ranges) = ranges.get(*shard) else {
                    continue;
                };
                for r in shard_ranges.iter() {
                    if let Some(intersection) = r.intersect(&block_range) {
                        will_fulfill.add_range(*shard, intersection);
                    }
                }
            }
            if will_fulfill.is_empty() {
                continue;
            }

            let segments =
                match fileset_index::read_index_segments(&self.opts.fs, &md.id, entry.id).await {
                    Ok(segments) => segments,
                    Err(err) => {
                        error!(
                            namespace = %md.id,
                            block_start = %file.block_start,
                            volume = entry.id.volume,
                            error = %err,
                            "unable to read segments from index fileset"
                        );
                        continue;
                    }
                };

            metrics::PERSISTED_INDEX_BLOCKS_READ.inc();

            let result = out.result.get_or_insert_with(RunResult::new);
            result.index.results.add_block(
                file.block_start,
                IndexBlock::from_persisted(segments, will_fulfill.clone()),
            );
            out.fulfilled.add_ranges(&will_fulfill);
        }
        out
    }
}

struct PersistedBlocksResult {
    fulfilled: ShardTimeRanges,
    result: Option<RunResult>,
}

pub(crate) async fn flush_batch(
    run_result: &Arc<RwLock<RunResult>>,
    index_block_start: UnixNanos,
    batch: &mut Vec<Document>,
) {
    if batch.is_empty() {
        return;
    }
    let mut guard = run_result.write().await;
    guard
        .index
        .results
        .get_or_add_documents_builder(index_block_start)
        .insert_batch(batch);
}
