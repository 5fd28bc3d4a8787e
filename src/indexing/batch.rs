//! Per-cycle batch of work drained from the queue

use crate::model::IndexEntry;
use std::collections::BTreeMap;

/// Work collected during DRAINING, owned by one cycle and then discarded
#[derive(Debug, Default)]
pub struct IndexingBatch {
    /// Entries to (re)index keyed by id; the last one drained wins
    to_index: BTreeMap<String, IndexEntry>,
    /// Record handles of prior on-disk records: id term -> live records it matched
    to_delete: BTreeMap<String, u64>,
    drained: usize,
}

impl IndexingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a drained entry, replacing any earlier entry with the same id
    ///
    /// Returns true if the entry replaced an earlier one.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        self.drained += 1;
        self.to_index.insert(entry.id(), entry).is_some()
    }

    /// Whether an id has already been looked up in this cycle
    pub fn is_pending(&self, id: &str) -> bool {
        self.to_index.contains_key(id)
    }

    /// Record the stale records found for an id
    pub fn mark_stale(&mut self, id: &str, live_records: u64) {
        if live_records > 0 {
            *self.to_delete.entry(id.to_string()).or_insert(0) += live_records;
        }
    }

    /// Number of entries drained, duplicates included
    pub fn drained(&self) -> usize {
        self.drained
    }

    /// Number of drained entries collapsed into an earlier one
    pub fn duplicates(&self) -> usize {
        self.drained - self.to_index.len()
    }

    /// Number of stale on-disk records found
    pub fn stale_records(&self) -> u64 {
        self.to_delete.values().sum()
    }

    pub fn to_index(&self) -> impl Iterator<Item = &IndexEntry> {
        self.to_index.values()
    }

    pub fn to_delete(&self) -> impl Iterator<Item = (&str, u64)> {
        self.to_delete.iter().map(|(id, count)| (id.as_str(), *count))
    }

    pub fn index_len(&self) -> usize {
        self.to_index.len()
    }

    pub fn delete_len(&self) -> usize {
        self.to_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_index.is_empty() && self.to_delete.is_empty()
    }
}
