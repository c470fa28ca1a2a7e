//! Bootstrap configuration.

use serde::{Deserialize, Serialize};
use strata_core::SeriesCachePolicy;
use strata_fileset::{FilesetOptions, FilesetType};

/// Static configuration of the filesystem bootstrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapOptions {
    /// Filesystem layout shared with the rest of the database.
    #[serde(default)]
    pub fs: FilesetOptions,

    /// Bound on concurrently processed data time windows.
    #[serde(default = "default_data_processors")]
    pub data_processors: usize,

    /// Bound on concurrently processed index time windows. Independent of
    /// the data bound so a slow index run cannot starve data throughput.
    #[serde(default = "default_index_processors")]
    pub index_processors: usize,

    /// Documents buffered per worker before a batch is flushed into the
    /// block's documents builder.
    #[serde(default = "default_index_batch_capacity")]
    pub index_batch_capacity: usize,

    /// Series cache policy of the database. Data runs only hydrate blocks
    /// under [`SeriesCachePolicy::All`]; otherwise bootstrap reports
    /// availability without opening data filesets.
    #[serde(default)]
    pub series_cache_policy: SeriesCachePolicy,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            fs: FilesetOptions::default(),
            data_processors: default_data_processors(),
            index_processors: default_index_processors(),
            index_batch_capacity: default_index_batch_capacity(),
            series_cache_policy: SeriesCachePolicy::default(),
        }
    }
}

fn default_data_processors() -> usize {
    4
}

fn default_index_processors() -> usize {
    2
}

fn default_index_batch_capacity() -> usize {
    256
}

/// Whether and how a run may persist what it builds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PersistConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Persisting only happens for flush filesets; snapshot runs rebuild in
    /// memory without writing.
    #[serde(default = "default_fileset_type")]
    pub fileset_type: FilesetType,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fileset_type: default_fileset_type(),
        }
    }
}

fn default_fileset_type() -> FilesetType {
    FilesetType::Flush
}

/// Per-invocation options of a single bootstrap run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub persist: PersistConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = BootstrapOptions::default();
        assert_eq!(opts.data_processors, 4);
        assert_eq!(opts.index_processors, 2);
        assert_eq!(opts.index_batch_capacity, 256);
        assert_eq!(opts.series_cache_policy, SeriesCachePolicy::All);
    }

    #[test]
    fn test_run_options_default_does_not_persist() {
        let opts = RunOptions::default();
        assert!(!opts.persist.enabled);
        assert_eq!(opts.persist.fileset_type, FilesetType::Flush);
    }
}
