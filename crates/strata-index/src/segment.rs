//! Sealed, immutable index segments.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::doc::Document;

/// An immutable inverted-index segment over a set of documents.
///
/// Sealing builds an exact-match postings map from `(field name, value)` to
/// the matching document ids. Segments are cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Segment {
    docs: Arc<Vec<Document>>,
    postings: Arc<HashMap<(Bytes, Bytes), Vec<u32>>>,
}

impl Segment {
    pub fn new(docs: Vec<Document>) -> Self {
        let mut postings: HashMap<(Bytes, Bytes), Vec<u32>> = HashMap::new();
        for (i, doc) in docs.iter().enumerate() {
            for field in &doc.fields {
                postings
                    .entry((field.name.clone(), field.value.clone()))
                    .or_default()
                    .push(i as u32);
            }
        }
        Self {
            docs: Arc::new(docs),
            postings: Arc::new(postings),
        }
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    /// Ids of every document carrying the exact `(name, value)` field.
    pub fn match_exact(&self, name: &[u8], value: &[u8]) -> Vec<Bytes> {
        let key = (Bytes::copy_from_slice(name), Bytes::copy_from_slice(value));
        match self.postings.get(&key) {
            Some(ids) => ids.iter().map(|&i| self.docs[i as usize].id.clone()).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Field;

    fn doc(id: &str, fields: &[(&str, &str)]) -> Document {
        Document {
            id: Bytes::copy_from_slice(id.as_bytes()),
            fields: fields
                .iter()
                .map(|&(n, v)| {
                    Field::new(
                        Bytes::copy_from_slice(n.as_bytes()),
                        Bytes::copy_from_slice(v.as_bytes()),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_match_exact() {
        let seg = Segment::new(vec![
            doc("a", &[("host", "1"), ("dc", "nyc")]),
            doc("b", &[("host", "2"), ("dc", "nyc")]),
        ]);
        assert_eq!(seg.match_exact(b"host", b"1"), vec![Bytes::from("a")]);
        assert_eq!(
            seg.match_exact(b"dc", b"nyc"),
            vec![Bytes::from("a"), Bytes::from("b")]
        );
        assert!(seg.match_exact(b"dc", b"sfo").is_empty());
        assert!(seg.match_exact(b"rack", b"1").is_empty());
    }

    #[test]
    fn test_empty_segment() {
        let seg = Segment::new(vec![]);
        assert_eq!(seg.num_docs(), 0);
        assert!(seg.match_exact(b"a", b"b").is_empty());
    }

    #[test]
    fn test_clone_shares_docs() {
        let seg = Segment::new(vec![doc("a", &[])]);
        let clone = seg.clone();
        assert_eq!(clone.num_docs(), 1);
        assert_eq!(seg.docs()[0].id, clone.docs()[0].id);
    }
}
