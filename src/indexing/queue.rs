//! Update queue feeding the index updater
//!
//! An unbounded FIFO shared by any number of producers and the single
//! updater thread. Duplicates are kept on insert and collapsed when the
//! updater drains the queue.

use crate::model::IndexEntry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Thread-safe FIFO of index entries
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    entries: Arc<Mutex<VecDeque<IndexEntry>>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the back
    pub fn enqueue(&self, entry: IndexEntry) {
        tracing::trace!("Queued {}", entry);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(entry);
    }

    /// Append several entries, keeping their order; returns how many
    pub fn enqueue_all<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        let mut queue = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = queue.len();
        queue.extend(entries);
        queue.len() - before
    }

    /// Pop the oldest entry
    pub fn pop(&self) -> Option<IndexEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
