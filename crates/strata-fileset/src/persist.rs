//! The persist manager: serialized, atomic index fileset flushes.
//!
//! Bootstrap workers that finish an index block hand their sealed segment to
//! the shared persist manager. The manager serializes flushes behind one
//! lock so no two workers interleave writes for the same namespace and
//! block start, and publishes each file through a temp-and-rename so a
//! crash never leaves a readable half-written fileset.
//!
//! Flushes are idempotent at the fileset-identifier level: re-flushing the
//! same `(namespace, block_start)` replaces the previous volume-0 fileset
//! wholesale.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_core::{NamespaceId, ShardId, UnixNanos};
use strata_index::Segment;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::index;
use crate::info::{IndexFilesetId, InfoFile};
use crate::layout::FilesetOptions;

/// The flavor of fileset a persist produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilesetType {
    /// A durable flushed fileset, discoverable by future bootstraps.
    Flush,
    /// A point-in-time snapshot; not consulted by bootstrap.
    Snapshot,
}

/// Handle to a successfully persisted index fileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedIndexFileset {
    pub id: IndexFilesetId,
}

/// Shared manager for index fileset flushes.
pub struct PersistManager {
    fs: FilesetOptions,
    lock: Mutex<()>,
}

impl PersistManager {
    pub fn new(fs: FilesetOptions) -> Self {
        Self {
            fs,
            lock: Mutex::new(()),
        }
    }

    /// Flush one index block's segment to a durable index fileset.
    pub async fn flush_index_segment(
        &self,
        ns: &NamespaceId,
        block_start: UnixNanos,
        block_size: Duration,
        shards: Vec<ShardId>,
        segment: &Segment,
    ) -> Result<PersistedIndexFileset> {
        let _guard = self.lock.lock().await;

        let id = IndexFilesetId {
            block_start,
            volume: 0,
        };
        let info = InfoFile {
            block_start,
            block_size: block_size.as_nanos() as u64,
            shards,
            volume_index: id.volume,
            entry_count: segment.num_docs() as u64,
        };
        index::write_index_fileset(&self.fs, ns, &info, segment).await?;

        info!(
            namespace = %ns,
            block_start = %block_start,
            docs = segment.num_docs(),
            "index fileset persisted"
        );
        Ok(PersistedIndexFileset { id })
    }
}
