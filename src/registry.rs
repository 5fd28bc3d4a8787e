//! Registry of field names seen at indexing time
//!
//! `MULTI` queries search every field the updater has ever written. The
//! registry is an explicit shared object handed to both the updater and
//! the query builder, so tests can use isolated registries.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe, grow-only set of field names
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Arc<RwLock<BTreeSet<String>>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record field names; returns how many were new
    pub fn record<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        names
            .into_iter()
            .filter(|name| fields.insert(name.as_ref().to_string()))
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Sorted copy of the current field names
    pub fn snapshot(&self) -> Vec<String> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
