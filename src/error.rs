//! Error types for index maintenance and search
//!
//! One error enum covers everything a caller of the public API can see.
//! Per-entry indexing failures are not errors at this level; they are
//! collected as values in the cycle report (see `indexing::errors`).

use thiserror::Error;

/// Errors returned by the search and index-maintenance API
#[derive(Error, Debug)]
pub enum SearchError {
    /// The user query could not be parsed
    #[error("Invalid query: {0}")]
    QueryParse(String),

    /// A writer is already open on the primary index by the same owner,
    /// or by another process holding the index lock
    #[error("Index writer already open for {0}")]
    WriterAlreadyOpen(String),

    /// An operation needing the primary index was requested with no
    /// configured index directories
    #[error("No index directories configured")]
    NoIndexDirectories,

    /// An index directory holds an index whose schema is not ours
    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    /// Error raised by the index backend
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the document store collaborator
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A blocking search task did not complete
    #[error("Search task failed: {0}")]
    Task(String),
}

impl SearchError {
    /// Create a query parse error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryParse(msg.into())
    }

    /// Usage errors point at programming or deployment mistakes.
    /// They are reported to the caller and never retried.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::WriterAlreadyOpen(_) | Self::NoIndexDirectories | Self::SchemaMismatch { .. }
        )
    }
}

impl From<tantivy::query::QueryParserError> for SearchError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        Self::QueryParse(err.to_string())
    }
}

/// Errors reported by a `DocumentStore` or `FieldExtractor`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The document, translation, object or attachment no longer exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// Text extraction failed for the given unit
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Generic backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors() {
        assert!(SearchError::WriterAlreadyOpen("/tmp/index".to_string()).is_usage_error());
        assert!(SearchError::NoIndexDirectories.is_usage_error());
        assert!(!SearchError::query("bad").is_usage_error());
        assert!(!SearchError::Store(StoreError::not_found("Main.WebHome")).is_usage_error());
    }

    #[test]
    fn test_error_messages() {
        let err = SearchError::query("empty query");
        assert_eq!(err.to_string(), "Invalid query: empty query");

        let err: SearchError = StoreError::not_found("xwiki:Main.WebHome").into();
        assert!(err.to_string().contains("Not found: xwiki:Main.WebHome"));
    }
}
