//! Series cache policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much series data the database keeps resident in memory.
///
/// Bootstrap only hydrates data blocks when the policy is [`All`]; any other
/// policy defers block loads to read time, so bootstrap reports availability
/// instead of opening filesets.
///
/// [`All`]: SeriesCachePolicy::All
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesCachePolicy {
    /// Every series block is held in memory.
    All,
    /// Only recently read blocks are held in memory.
    RecentlyRead,
}

impl Default for SeriesCachePolicy {
    fn default() -> Self {
        SeriesCachePolicy::All
    }
}

impl fmt::Display for SeriesCachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesCachePolicy::All => f.write_str("all"),
            SeriesCachePolicy::RecentlyRead => f.write_str("recently_read"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SeriesCachePolicy::All.to_string(), "all");
        assert_eq!(SeriesCachePolicy::RecentlyRead.to_string(), "recently_read");
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&SeriesCachePolicy::RecentlyRead).unwrap();
        assert_eq!(json, "\"recently_read\"");
        let back: SeriesCachePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SeriesCachePolicy::RecentlyRead);
    }
}
