//! In-memory inverted-index building blocks for strata.
//!
//! An index block maps tag predicates to series identifiers. While a block is
//! being bootstrapped or written to, documents accumulate in a
//! [`DocumentsBuilder`]; once complete the builder seals into an immutable
//! [`Segment`] that answers exact-match field queries and can be serialized
//! to an index fileset.
//!
//! The builder is deliberately a plain single-writer structure: callers that
//! share one (the bootstrap engine shares one per index block across worker
//! tasks) serialize access with their own lock.

pub mod builder;
pub mod doc;
pub mod segment;

pub use builder::DocumentsBuilder;
pub use doc::{Document, Field};
pub use segment::Segment;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("document has an empty id")]
    EmptyDocumentId,

    #[error("duplicate field name in document: {0}")]
    DuplicateField(String),
}
