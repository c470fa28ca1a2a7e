//! Core types for strata, a sharded, time-partitioned time-series database.
//!
//! This crate holds the domain primitives every other strata crate builds on:
//!
//! - [`UnixNanos`] and [`TimeRange`]: nanosecond timestamps and half-open
//!   time intervals
//! - [`TimeRanges`] and [`ShardTimeRanges`]: ordered, non-overlapping range
//!   sets, per shard
//! - [`SeriesId`], [`Tag`], [`Tags`]: series identity (zero-copy via `Bytes`)
//! - [`NamespaceMetadata`] and its option types: retention and index
//!   configuration per namespace
//! - [`SeriesCachePolicy`]: how much series data is held in memory
//!
//! No I/O happens here. Everything is plain data with value semantics.

pub mod ident;
pub mod namespace;
pub mod policy;
pub mod ranges;
pub mod time;

pub use ident::{SeriesId, Tag, Tags};
pub use namespace::{IndexOptions, NamespaceId, NamespaceMetadata, NamespaceOptions, RetentionOptions};
pub use policy::SeriesCachePolicy;
pub use ranges::{ShardTimeRanges, TimeRanges};
pub use time::{TimeRange, UnixNanos};

/// Shard identifier within a namespace.
pub type ShardId = u32;
