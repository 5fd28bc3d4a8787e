//! In-memory document store
//!
//! Used by tests and by embedders that keep documents in process.

use super::DocumentStore;
use crate::error::StoreError;
use crate::model::{DEFAULT_LANGUAGE, DocumentReference, WikiDocument};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

type Key = (DocumentReference, String);

/// Thread-safe map of document translations
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<BTreeMap<Key, WikiDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(reference: &DocumentReference, language: Option<&str>) -> Key {
        (
            reference.clone(),
            language.unwrap_or(DEFAULT_LANGUAGE).to_string(),
        )
    }

    /// Insert or replace a document translation
    pub fn put(&self, doc: WikiDocument) {
        let key = Self::key(&doc.reference, doc.language.as_deref());
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, doc);
    }

    /// Remove a document translation, returning it if present
    pub fn remove(&self, reference: &DocumentReference, language: Option<&str>) -> Option<WikiDocument> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::key(reference, language))
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for InMemoryStore {
    fn resolve(
        &self,
        reference: &DocumentReference,
        language: Option<&str>,
    ) -> Result<WikiDocument, StoreError> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::key(reference, language))
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found(format!(
                    "{} ({})",
                    reference,
                    language.unwrap_or(DEFAULT_LANGUAGE)
                ))
            })
    }

    fn references(&self) -> Result<Vec<DocumentReference>, StoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let mut references: Vec<DocumentReference> =
            documents.keys().map(|(reference, _)| reference.clone()).collect();
        references.dedup();
        Ok(references)
    }

    fn translations(&self, reference: &DocumentReference) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents
            .keys()
            .filter(|(r, language)| r == reference && language != DEFAULT_LANGUAGE)
            .map(|(_, language)| language.clone())
            .collect())
    }
}
