//! Series identity: identifiers and tag sets.
//!
//! Identifiers and tag names/values are `bytes::Bytes` so that readers can
//! hand out slices of a loaded fileset without copying, and so that the same
//! identifier can be shared between the block cache and the index builder.

use std::fmt;

use bytes::Bytes;

/// Unique identifier of a time series within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesId(Bytes);

impl SeriesId {
    pub fn new(id: impl Into<Bytes>) -> Self {
        Self(id.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for SeriesId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// One tag of a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub name: Bytes,
    pub value: Bytes,
}

impl Tag {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The ordered tag set of a series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(n, v)| {
                    Tag::new(
                        Bytes::copy_from_slice(n.as_bytes()),
                        Bytes::copy_from_slice(v.as_bytes()),
                    )
                })
                .collect(),
        )
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_id_display_lossy() {
        let id = SeriesId::from("cpu.user");
        assert_eq!(format!("{}", id), "cpu.user");
    }

    #[test]
    fn test_series_id_empty() {
        let id = SeriesId::new(Bytes::new());
        assert!(id.is_empty());
        assert_eq!(id.len(), 0);
    }

    #[test]
    fn test_tags_from_pairs_preserves_order() {
        let tags = Tags::from_pairs([("host", "a"), ("dc", "nyc")]);
        let names: Vec<_> = tags.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec![Bytes::from("host"), Bytes::from("dc")]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_tags_shared_bytes_are_equal() {
        let a = Tags::from_pairs([("host", "a")]);
        let b = Tags::from_pairs([("host", "a")]);
        assert_eq!(a, b);
    }
}
