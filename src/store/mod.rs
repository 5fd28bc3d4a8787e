//! Document store collaborator
//!
//! The index core never owns documents. It resolves queued entries through
//! a `DocumentStore` and turns the resolved content into searchable text
//! through a `FieldExtractor`; both are injected at construction.

pub mod extract;
pub mod memory;

pub use extract::{ExtractedFields, FieldExtractor, PlainTextExtractor};
pub use memory::InMemoryStore;

use crate::error::StoreError;
use crate::model::{DocumentReference, WikiDocument};

/// Read access to the wiki document store
pub trait DocumentStore: Send + Sync {
    /// Fetch the current state of a document translation
    ///
    /// `language` is `None` for the default translation. Fails with
    /// `StoreError::NotFound` when the document (or translation) has been
    /// deleted or renamed since it was queued.
    fn resolve(
        &self,
        reference: &DocumentReference,
        language: Option<&str>,
    ) -> Result<WikiDocument, StoreError>;

    /// Every document reference in the store, used by full rebuilds
    fn references(&self) -> Result<Vec<DocumentReference>, StoreError>;

    /// Non-default translation languages of a document
    fn translations(&self, reference: &DocumentReference) -> Result<Vec<String>, StoreError>;

    /// Flush the underlying connection; called once when the updater exits
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
