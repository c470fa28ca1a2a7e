//! Namespace metadata and per-namespace options.
//!
//! A namespace is the unit of retention and index configuration. The
//! bootstrap engine consults [`RetentionOptions::block_size`] to size data
//! time windows and [`IndexOptions`] to decide whether, and at what block
//! size, an inverted index is bootstrapped.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NamespaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Retention configuration for a namespace's data blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionOptions {
    /// Width of one data block.
    #[serde(default = "default_block_size", with = "duration_nanos")]
    pub block_size: Duration,
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
        }
    }
}

/// Inverted-index configuration for a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Whether the namespace maintains an inverted index at all.
    #[serde(default)]
    pub enabled: bool,

    /// Width of one index block. May be a multiple of the data block size.
    #[serde(default = "default_block_size", with = "duration_nanos")]
    pub block_size: Duration,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            block_size: default_block_size(),
        }
    }
}

fn default_block_size() -> Duration {
    Duration::from_secs(2 * 60 * 60) // 2h
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_nanos() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

/// All per-namespace options the bootstrap engine consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceOptions {
    #[serde(default)]
    pub retention: RetentionOptions,

    #[serde(default)]
    pub index: IndexOptions,
}

/// A namespace's identity plus its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceMetadata {
    pub id: NamespaceId,
    pub options: NamespaceOptions,
}

impl NamespaceMetadata {
    pub fn new(id: impl Into<NamespaceId>, options: NamespaceOptions) -> Self {
        Self {
            id: id.into(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = NamespaceOptions::default();
        assert_eq!(opts.retention.block_size, Duration::from_secs(7200));
        assert!(!opts.index.enabled);
        assert_eq!(opts.index.block_size, Duration::from_secs(7200));
    }

    #[test]
    fn test_serde_roundtrip() {
        let md = NamespaceMetadata::new(
            "metrics",
            NamespaceOptions {
                retention: RetentionOptions {
                    block_size: Duration::from_secs(3600),
                },
                index: IndexOptions {
                    enabled: true,
                    block_size: Duration::from_secs(7200),
                },
            },
        );
        let json = serde_json::to_string(&md).unwrap();
        let back: NamespaceMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id.as_str(), "metrics");
        assert!(back.options.index.enabled);
        assert_eq!(back.options.retention.block_size, Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let md: NamespaceMetadata = serde_json::from_str(r#"{"id":"ns","options":{}}"#).unwrap();
        assert_eq!(md.options.retention.block_size, Duration::from_secs(7200));
        assert!(!md.options.index.enabled);
    }
}
