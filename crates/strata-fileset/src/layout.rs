//! Path and file-name scheme for filesets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{NamespaceId, ShardId, UnixNanos};

/// Filesystem configuration shared by everything that touches filesets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesetOptions {
    /// Root directory under which all fileset directories live.
    #[serde(default = "default_file_path_prefix")]
    pub file_path_prefix: PathBuf,
}

impl Default for FilesetOptions {
    fn default() -> Self {
        Self {
            file_path_prefix: default_file_path_prefix(),
        }
    }
}

fn default_file_path_prefix() -> PathBuf {
    PathBuf::from("./data")
}

impl FilesetOptions {
    pub fn new(file_path_prefix: impl Into<PathBuf>) -> Self {
        Self {
            file_path_prefix: file_path_prefix.into(),
        }
    }

    /// Directory holding one shard's data filesets.
    pub fn data_shard_dir(&self, ns: &NamespaceId, shard: ShardId) -> PathBuf {
        self.file_path_prefix
            .join("data")
            .join(ns.as_str())
            .join(shard.to_string())
    }

    /// Directory holding a namespace's index filesets.
    pub fn index_namespace_dir(&self, ns: &NamespaceId) -> PathBuf {
        self.file_path_prefix.join("index").join(ns.as_str())
    }
}

/// The file kinds a fileset is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Info,
    Data,
    Digest,
    Segment,
}

impl FileKind {
    fn suffix(self) -> &'static str {
        match self {
            FileKind::Info => "info",
            FileKind::Data => "data",
            FileKind::Digest => "digest",
            FileKind::Segment => "segment",
        }
    }
}

/// File name for one component of a fileset: `fileset-<start>-<volume>-<kind>.db`.
pub fn fileset_file_name(block_start: UnixNanos, volume: u32, kind: FileKind) -> String {
    format!(
        "fileset-{}-{}-{}.db",
        block_start.nanos(),
        volume,
        kind.suffix()
    )
}

pub fn fileset_path(dir: &Path, block_start: UnixNanos, volume: u32, kind: FileKind) -> PathBuf {
    dir.join(fileset_file_name(block_start, volume, kind))
}

/// Parse `(block_start, volume)` out of an info-file name.
///
/// Returns `None` for anything that is not a `fileset-…-info.db` name.
pub fn parse_info_file_name(name: &str) -> Option<(UnixNanos, u32)> {
    let rest = name.strip_prefix("fileset-")?.strip_suffix("-info.db")?;
    let (start, volume) = rest.rsplit_once('-')?;
    let start: i64 = start.parse().ok()?;
    let volume: u32 = volume.parse().ok()?;
    Some((UnixNanos::from_nanos(start), volume))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_roundtrip() {
        let start = UnixNanos::from_nanos(7_200_000_000_000);
        let name = fileset_file_name(start, 3, FileKind::Info);
        assert_eq!(name, "fileset-7200000000000-3-info.db");
        assert_eq!(parse_info_file_name(&name), Some((start, 3)));
    }

    #[test]
    fn test_parse_rejects_other_kinds() {
        assert_eq!(parse_info_file_name("fileset-0-0-data.db"), None);
        assert_eq!(parse_info_file_name("fileset-0-0-digest.db"), None);
        assert_eq!(parse_info_file_name("garbage.db"), None);
        assert_eq!(parse_info_file_name("fileset-x-0-info.db"), None);
    }

    #[test]
    fn test_dirs() {
        let opts = FilesetOptions::new("/var/lib/strata");
        let ns = NamespaceId::from("metrics");
        assert_eq!(
            opts.data_shard_dir(&ns, 7),
            PathBuf::from("/var/lib/strata/data/metrics/7")
        );
        assert_eq!(
            opts.index_namespace_dir(&ns),
            PathBuf::from("/var/lib/strata/index/metrics")
        );
    }
}
