//! Bootstrap error types.
//!
//! Most failures the engine encounters are recoverable and never surface
//! through these types at all: corrupt info files, unopenable filesets and
//! failed index persists are logged and accounted as unfulfilled coverage.
//! The variants here describe per-entry and per-reader failures that abort
//! one reader's loop, plus the few programming-contract violations the
//! public API can report.

use strata_core::{NamespaceId, SeriesCachePolicy, TimeRange, UnixNanos};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("fileset error: {0}")]
    Fileset(#[from] strata_fileset::Error),

    #[error("index error: {0}")]
    Index(#[from] strata_index::Error),

    #[error("invalid series cache policy: {0}")]
    InvalidCachePolicy(SeriesCachePolicy),

    #[error("unable to checkout series: {0}")]
    SeriesCheckout(String),

    #[error("unable to load block: {0}")]
    LoadBlock(String),

    #[error("data validation failed: {0}")]
    ValidationFailed(#[source] strata_fileset::Error),

    #[error("no index block starting at {block_start}")]
    BlockNotFound { block_start: UnixNanos },

    #[error("range {range} outside index block starting at {block_start}")]
    RangeOutsideBlock {
        block_start: UnixNanos,
        range: TimeRange,
    },

    #[error("missing expected result for namespace: {0}")]
    MissingNamespace(NamespaceId),
}
