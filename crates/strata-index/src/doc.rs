//! Index documents.
//!
//! A document is the indexed form of one series: its identifier plus its
//! tags as sorted `(name, value)` fields. Conversion from the storage-side
//! types validates the same constraints the storage codec enforces: a
//! non-empty id and unique field names.

use bytes::Bytes;
use strata_core::{SeriesId, Tags};

use crate::{Error, Result};

/// One field of an index document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Field {
    pub name: Bytes,
    pub value: Bytes,
}

impl Field {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The indexed form of one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Bytes,
    pub fields: Vec<Field>,
}

impl Document {
    /// Build a document from a series identifier and its tags.
    ///
    /// Fields are sorted by name so equal tag sets produce equal documents
    /// regardless of input order.
    pub fn from_series(id: &SeriesId, tags: &Tags) -> Result<Document> {
        if id.is_empty() {
            return Err(Error::EmptyDocumentId);
        }
        let mut fields: Vec<Field> = tags
            .iter()
            .map(|t| Field {
                name: t.name.clone(),
                value: t.value.clone(),
            })
            .collect();
        fields.sort();
        for pair in fields.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::DuplicateField(
                    String::from_utf8_lossy(&pair[0].name).into_owned(),
                ));
            }
        }
        Ok(Document {
            id: id.as_bytes().clone(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Tags;

    #[test]
    fn test_from_series_sorts_fields() {
        let id = SeriesId::from("cpu");
        let tags = Tags::from_pairs([("zone", "b"), ("app", "db")]);
        let doc = Document::from_series(&id, &tags).unwrap();
        assert_eq!(doc.fields[0].name, Bytes::from("app"));
        assert_eq!(doc.fields[1].name, Bytes::from("zone"));
    }

    #[test]
    fn test_from_series_empty_id_rejected() {
        let id = SeriesId::new(Bytes::new());
        let err = Document::from_series(&id, &Tags::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyDocumentId));
    }

    #[test]
    fn test_from_series_duplicate_field_rejected() {
        let id = SeriesId::from("cpu");
        let tags = Tags::from_pairs([("host", "a"), ("host", "b")]);
        let err = Document::from_series(&id, &tags).unwrap_err();
        assert!(matches!(err, Error::DuplicateField(name) if name == "host"));
    }

    #[test]
    fn test_from_series_input_order_irrelevant() {
        let id = SeriesId::from("cpu");
        let a = Document::from_series(&id, &Tags::from_pairs([("a", "1"), ("b", "2")])).unwrap();
        let b = Document::from_series(&id, &Tags::from_pairs([("b", "2"), ("a", "1")])).unwrap();
        assert_eq!(a, b);
    }
}
