//! Index rebuilds
//!
//! A full rebuild truncates the primary index and queues every unit of the
//! document store. A scoped run can limit itself to some wikis, keep the
//! existing records and skip units that are already indexed. The updater
//! thread does the actual indexing in both cases.

use super::updater::IndexUpdater;
use crate::error::{Result, StoreError};
use crate::model::{DocumentReference, IndexEntry};
use crate::store::DocumentStore;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Drives rebuilds; concurrent requests run one after the other
pub struct IndexRebuilder {
    updater: Arc<IndexUpdater>,
    running: Mutex<()>,
}

impl IndexRebuilder {
    pub fn new(updater: Arc<IndexUpdater>) -> Self {
        Self {
            updater,
            running: Mutex::new(()),
        }
    }

    /// Clear the index and schedule the whole store
    ///
    /// Returns the number of entries scheduled, or -1 on error. Safe to
    /// call from best-effort administrative triggers.
    pub fn rebuild_index(&self) -> i64 {
        self.start_index(&[], true, false)
    }

    /// Schedule the documents of `wikis` (all wikis when empty)
    ///
    /// With `clear`, the records of those wikis are removed first. With
    /// `only_new`, units that already have a record are left alone.
    /// Returns the number of entries scheduled, or -1 on error.
    pub fn start_index(&self, wikis: &[String], clear: bool, only_new: bool) -> i64 {
        match self.try_index(wikis, clear, only_new) {
            Ok(count) => {
                tracing::info!("Index rebuild scheduled {} entries", count);
                count as i64
            }
            Err(e) => {
                tracing::error!("Index rebuild failed: {}", e);
                -1
            }
        }
    }

    /// Run `rebuild_index` on a background thread
    pub fn start_rebuild(self: &Arc<Self>) -> std::io::Result<JoinHandle<i64>> {
        let rebuilder = Arc::clone(self);
        thread::Builder::new()
            .name("index-rebuilder".to_string())
            .spawn(move || rebuilder.rebuild_index())
    }

    fn try_index(&self, wikis: &[String], clear: bool, only_new: bool) -> Result<usize> {
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        tracing::info!(
            "Starting index rebuild (wikis {:?}, clear {}, only new {})",
            wikis,
            clear,
            only_new
        );
        if clear {
            if wikis.is_empty() {
                self.updater.clear_index()?;
            } else {
                self.updater.clear_wikis(wikis)?;
            }
        }

        let primary = self.updater.primary();
        let searcher = if only_new {
            Some(primary.reader()?.searcher())
        } else {
            None
        };

        let store = self.updater.store();
        let mut scheduled = 0;
        for reference in store.references()? {
            if !wikis.is_empty() && !wikis.contains(&reference.wiki) {
                continue;
            }
            let entries = match document_entries(store.as_ref(), &reference) {
                Ok(entries) => entries,
                // Deleted while we were walking the store
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!("Skipping vanished document {}", reference);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                if let Some(searcher) = &searcher {
                    if primary.live_records(searcher, &entry.id())? > 0 {
                        continue;
                    }
                }
                self.updater.enqueue(entry);
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }
}

/// Every translation, object class and attachment of one document
fn document_entries(
    store: &dyn DocumentStore,
    reference: &DocumentReference,
) -> std::result::Result<Vec<IndexEntry>, StoreError> {
    let document = store.resolve(reference, None)?;
    let mut entries = vec![IndexEntry::document(reference.clone(), None)];

    for language in store.translations(reference)? {
        entries.push(IndexEntry::document(reference.clone(), Some(language)));
    }
    for class_name in document.object_classes() {
        entries.push(IndexEntry::object(reference.clone(), class_name));
    }
    for attachment in &document.attachments {
        entries.push(IndexEntry::attachment(reference.clone(), attachment.filename.clone()));
    }
    Ok(entries)
}
