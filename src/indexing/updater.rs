//! Background index updater
//!
//! One dedicated thread runs the cycle
//! `IDLE -> DRAINING -> DELETING -> INDEXING -> IDLE`. Each phase is
//! guarded on its own: a phase that cannot open its reader or writer is
//! aborted and logged, a failing entry is skipped and reported, and the
//! loop only ends on an explicit stop.

use super::batch::IndexingBatch;
use super::errors::{EntryFailure, EntryStage};
use super::queue::UpdateQueue;
use super::record::{self, PreparedRecord};
use super::writer::{PrimaryIndex, WriteMode};
use crate::error::Result;
use crate::metrics::{CycleReport, PhaseTimer, UpdaterStats};
use crate::model::{ChangeEvent, DocumentReference, IndexEntry, WikiDocument};
use crate::registry::FieldRegistry;
use crate::search::SearcherPool;
use crate::store::{DocumentStore, FieldExtractor};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Keeps the primary index consistent with the document store
pub struct IndexUpdater {
    primary: Arc<PrimaryIndex>,
    queue: UpdateQueue,
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn FieldExtractor>,
    registry: FieldRegistry,
    pool: Option<Arc<SearcherPool>>,
    interval: Duration,

    stop: Mutex<bool>,
    wake: Condvar,
    /// Serializes cycles between the loop and direct callers
    cycle: Mutex<()>,
    active: AtomicUsize,
    stats: Mutex<UpdaterStats>,
}

impl IndexUpdater {
    pub fn new(
        primary: Arc<PrimaryIndex>,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn FieldExtractor>,
        registry: FieldRegistry,
        interval: Duration,
    ) -> Self {
        Self {
            primary,
            queue: UpdateQueue::new(),
            store,
            extractor,
            registry,
            pool: None,
            interval,
            stop: Mutex::new(false),
            wake: Condvar::new(),
            cycle: Mutex::new(()),
            active: AtomicUsize::new(0),
            stats: Mutex::new(UpdaterStats::default()),
        }
    }

    /// Refresh this pool after every cycle
    pub fn with_searcher_pool(mut self, pool: Arc<SearcherPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Start the dedicated indexing thread
    pub fn spawn(self: Arc<Self>) -> std::io::Result<UpdaterHandle> {
        let updater = Arc::clone(&self);
        let thread = thread::Builder::new()
            .name("index-updater".to_string())
            .spawn(move || updater.run())?;

        Ok(UpdaterHandle {
            updater: self,
            thread: Some(thread),
        })
    }

    /// Run the loop on the current thread until stopped
    pub fn run(&self) {
        tracing::info!(
            "Index updater started on {} (interval {:?})",
            self.primary.dir().display(),
            self.interval
        );

        loop {
            // IDLE
            if self.is_stopping() {
                break;
            }
            if self.queue.is_empty() {
                self.idle();
                continue;
            }
            if self.run_cycle().is_empty() {
                // Draining failed; retry after the interval
                self.idle();
            }
        }

        if let Err(e) = self.store.flush() {
            tracing::warn!("Failed to flush document store: {}", e);
        }
        tracing::info!("Index updater stopped");
    }

    /// Sleep for the interval; a stop request wakes us early
    fn idle(&self) {
        let stopped = self.stop.lock().unwrap_or_else(PoisonError::into_inner);
        let _stopped = self
            .wake
            .wait_timeout_while(stopped, self.interval, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Ask the loop to exit once the current phase is done
    pub fn request_stop(&self) {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one drain cycle now
    ///
    /// Waits for a cycle in progress on another thread to finish first.
    pub fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let timer = PhaseTimer::new();
        let mut report = CycleReport::new();

        let batch = self.drain(&mut report);
        if batch.is_empty() {
            report.total_duration = timer.elapsed();
            if !report.phase_errors.is_empty() || !report.failures.is_empty() {
                report.log_summary();
            }
            return report;
        }

        self.delete_stale(&batch, &mut report);
        self.index_batch(&batch, &mut report);
        self.active.store(0, Ordering::SeqCst);

        if let Some(pool) = &self.pool {
            pool.refresh();
        }

        report.total_duration = timer.elapsed();
        report.log_summary();
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&report);
        report
    }

    /// DRAINING: pop everything, collapse by id, find prior records
    fn drain(&self, report: &mut CycleReport) -> IndexingBatch {
        let timer = PhaseTimer::new();
        let mut batch = IndexingBatch::new();

        let searcher = match self.primary.reader() {
            Ok(reader) => reader.searcher(),
            Err(e) => {
                // Entries stay queued for the next cycle
                report.phase_errors.push(format!("drain: cannot open reader: {}", e));
                return batch;
            }
        };

        while let Some(entry) = self.queue.pop() {
            let id = entry.id();
            if !batch.is_pending(&id) {
                match self.primary.live_records(&searcher, &id) {
                    Ok(count) => batch.mark_stale(&id, count),
                    Err(e) => {
                        // Still indexed; the write replaces any prior record by id
                        let failure = EntryFailure::from_index(&id, EntryStage::Lookup, &e);
                        tracing::warn!("Skipping stale lookup of {}: {}", id, failure.message);
                        report.failures.push(failure);
                    }
                }
            }
            if batch.insert(entry) {
                tracing::debug!("Collapsed duplicate entry {}", id);
            }
        }

        report.drained = batch.drained();
        report.duplicates = batch.duplicates();
        report.stale_found = batch.stale_records();
        report.drain_duration = timer.elapsed();
        self.active.store(batch.index_len(), Ordering::SeqCst);
        batch
    }

    /// DELETING: remove the prior records found while draining
    fn delete_stale(&self, batch: &IndexingBatch, report: &mut CycleReport) {
        if batch.delete_len() == 0 {
            return;
        }
        let timer = PhaseTimer::new();
        if let Err(e) = self.try_delete_stale(batch, report) {
            report.deleted = 0;
            report.phase_errors.push(format!("delete: {}", e));
        }
        report.delete_duration = timer.elapsed();
    }

    fn try_delete_stale(&self, batch: &IndexingBatch, report: &mut CycleReport) -> Result<()> {
        // The session rolls back and releases the writer on every exit path
        let mut session = self.primary.open_writer(WriteMode::Append)?;
        let searcher = self.primary.reader()?.searcher();

        for (id, expected) in batch.to_delete() {
            let live = match self.primary.live_records(&searcher, id) {
                Ok(live) => live,
                Err(e) => {
                    let failure = EntryFailure::from_index(id, EntryStage::Delete, &e);
                    tracing::warn!("Skipping deletion of {}: {}", id, failure.message);
                    report.failures.push(failure);
                    continue;
                }
            };
            if live == 0 {
                tracing::debug!("Record {} already removed", id);
                report.already_removed += expected;
                continue;
            }
            session.delete_id(id);
            report.deleted += live;
        }

        session.commit()
    }

    /// INDEXING: re-resolve every entry and write fresh records
    fn index_batch(&self, batch: &IndexingBatch, report: &mut CycleReport) {
        let timer = PhaseTimer::new();
        let schema = self.primary.schema();
        let entries: Vec<&IndexEntry> = batch.to_index().collect();

        let prepared: Vec<std::result::Result<PreparedRecord, EntryFailure>> = entries
            .par_iter()
            .map(|entry| record::prepare(entry, self.store.as_ref(), self.extractor.as_ref(), schema))
            .collect();

        let mut records = Vec::with_capacity(prepared.len());
        for result in prepared {
            match result {
                Ok(record) => records.push(record),
                Err(failure) => {
                    tracing::warn!("Skipping {} ({}): {}", failure.id, failure.stage, failure.message);
                    report.failures.push(failure);
                }
            }
        }

        if !records.is_empty() {
            if let Err(e) = self.try_index(records, report) {
                report.indexed = 0;
                report.phase_errors.push(format!("index: {}", e));
            }
        }
        report.index_duration = timer.elapsed();
    }

    fn try_index(&self, records: Vec<PreparedRecord>, report: &mut CycleReport) -> Result<()> {
        let mut session = self.primary.open_writer(WriteMode::Append)?;
        let mut field_names = Vec::new();

        for record in records {
            // Applied in the same commit, so at most one record per id survives
            // even when DELETING was skipped or aborted
            session.delete_id(&record.id);
            match session.add(record.doc) {
                Ok(()) => {
                    tracing::debug!("Indexed {}", record.id);
                    report.indexed += 1;
                    field_names.extend(record.field_names);
                }
                Err(e) => {
                    let failure = EntryFailure::from_index(&record.id, EntryStage::Write, &e);
                    tracing::warn!("Skipping {}: {}", record.id, failure.message);
                    report.failures.push(failure);
                }
            }
        }

        session.commit()?;
        let new_fields = self.registry.record(field_names);
        if new_fields > 0 {
            tracing::debug!("Registered {} new searchable fields", new_fields);
        }
        Ok(())
    }

    pub fn enqueue(&self, entry: IndexEntry) {
        self.queue.enqueue(entry);
    }

    pub fn enqueue_document(&self, reference: DocumentReference, language: Option<String>) {
        self.enqueue(IndexEntry::document(reference, language));
    }

    pub fn enqueue_object(&self, reference: DocumentReference, class_name: impl Into<String>) {
        self.enqueue(IndexEntry::object(reference, class_name));
    }

    pub fn enqueue_attachment(&self, reference: DocumentReference, filename: impl Into<String>) {
        self.enqueue(IndexEntry::attachment(reference, filename));
    }

    /// Queue every attachment of a document; returns how many were queued
    pub fn enqueue_all_attachments_of(&self, document: &WikiDocument) -> usize {
        self.queue.enqueue_all(
            document
                .attachments
                .iter()
                .map(|a| IndexEntry::attachment(document.reference.clone(), a.filename.clone())),
        )
    }

    /// Queue the entry matching a change notification
    pub fn notify(&self, event: ChangeEvent) {
        self.enqueue(event.into_entry());
    }

    /// Remove every record from the primary index
    ///
    /// Blocks until an in-flight writer on another thread is released.
    pub fn clear_index(&self) -> Result<()> {
        self.primary.truncate()?;
        if let Some(pool) = &self.pool {
            pool.refresh();
        }
        Ok(())
    }

    /// Remove the records of the given wikis from the primary index
    pub fn clear_wikis(&self, wikis: &[String]) -> Result<()> {
        self.primary.delete_wikis(wikis)?;
        if let Some(pool) = &self.pool {
            pool.refresh();
        }
        Ok(())
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Entries of the cycle currently between DRAINING and the end of INDEXING
    pub fn active_batch_size(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn indexed_record_count(&self) -> Result<u64> {
        self.primary.record_count()
    }

    pub fn stats(&self) -> UpdaterStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn primary(&self) -> &Arc<PrimaryIndex> {
        &self.primary
    }
}

/// Owner of the running updater thread; stops and joins it on drop
pub struct UpdaterHandle {
    updater: Arc<IndexUpdater>,
    thread: Option<JoinHandle<()>>,
}

impl UpdaterHandle {
    pub fn updater(&self) -> &Arc<IndexUpdater> {
        &self.updater
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.updater.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Index updater thread panicked");
            }
        }
    }
}

impl Drop for UpdaterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::WriterConfig;
    use crate::store::{InMemoryStore, PlainTextExtractor};
    use std::time::Instant;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Arc<InMemoryStore>, IndexUpdater) {
        let writer_config = WriterConfig {
            memory_budget_mb: 15,
            num_threads: 1,
        };
        let primary = PrimaryIndex::open_or_create(dir.path(), Analyzer::Standard, writer_config).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let updater = IndexUpdater::new(
            Arc::new(primary),
            store.clone(),
            Arc::new(PlainTextExtractor),
            FieldRegistry::new(),
            Duration::from_secs(60),
        );
        (store, updater)
    }

    fn page(name: &str, title: &str) -> WikiDocument {
        let mut doc = WikiDocument::new(DocumentReference::new("xwiki", "Space", name));
        doc.title = title.to_string();
        doc
    }

    #[test]
    fn test_empty_cycle() {
        let dir = TempDir::new().unwrap();
        let (_store, updater) = setup(&dir);

        let report = updater.run_cycle();
        assert!(report.is_empty());
        assert_eq!(updater.stats().cycles, 0);
    }

    #[test]
    fn test_cycle_replaces_stale_record() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let doc = page("Page", "Hello");
        store.put(doc.clone());

        updater.enqueue_document(doc.reference.clone(), None);
        let report = updater.run_cycle();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.stale_found, 0);

        updater.enqueue_document(doc.reference.clone(), None);
        let report = updater.run_cycle();
        assert_eq!(report.stale_found, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.indexed, 1);
        assert_eq!(updater.indexed_record_count().unwrap(), 1);
        assert_eq!(updater.stats().cycles, 2);
    }

    #[test]
    fn test_attachments_of_document() {
        let dir = TempDir::new().unwrap();
        let (_store, updater) = setup(&dir);
        let mut doc = page("Page", "Files");
        for filename in ["a.txt", "b.txt"] {
            doc.attachments.push(crate::model::Attachment {
                filename: filename.to_string(),
                mime_type: "text/plain".to_string(),
                author: String::new(),
                date: 0,
                content: Vec::new(),
            });
        }

        assert_eq!(updater.enqueue_all_attachments_of(&doc), 2);
        assert_eq!(updater.queue_size(), 2);
    }

    #[test]
    fn test_deleted_document_is_removed() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let doc = page("Page", "Hello");
        store.put(doc.clone());

        updater.enqueue_document(doc.reference.clone(), None);
        updater.run_cycle();
        store.remove(&doc.reference, None);

        updater.notify(ChangeEvent::DocumentDeleted {
            reference: doc.reference.clone(),
            language: None,
        });
        let report = updater.run_cycle();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.indexed, 0);
        assert_eq!(report.permanent_failures(), 1);
        assert_eq!(updater.indexed_record_count().unwrap(), 0);
    }

    #[test]
    fn test_stop_wakes_idle_thread() {
        let dir = TempDir::new().unwrap();
        let (_store, updater) = setup(&dir);
        let handle = Arc::new(updater).spawn().unwrap();

        let start = Instant::now();
        handle.stop();
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_clear_index() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let doc = page("Page", "Hello");
        store.put(doc.clone());

        updater.enqueue_document(doc.reference, None);
        updater.run_cycle();
        updater.clear_index().unwrap();
        assert_eq!(updater.indexed_record_count().unwrap(), 0);
    }

    #[test]
    fn test_phase_error_leaves_updater_usable() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let updater = Arc::new(updater);
        let doc = page("Page", "Hello");
        store.put(doc.clone());

        updater.enqueue_document(doc.reference.clone(), None);
        {
            // Same thread holds the writer: INDEXING cannot open its own
            let _held = updater.primary().open_writer(WriteMode::Append).unwrap();
            let report = updater.run_cycle();
            assert_eq!(report.indexed, 0);
            assert!(report.phase_errors.iter().any(|e| e.starts_with("index:")));
        }
        assert_eq!(updater.stats().total_phase_errors, 1);
        assert_eq!(updater.indexed_record_count().unwrap(), 0);

        // The background loop keeps going after the failed cycle
        let handle = Arc::clone(&updater).spawn().unwrap();
        updater.enqueue_document(doc.reference.clone(), None);
        let deadline = Instant::now() + Duration::from_secs(10);
        while updater.indexed_record_count().unwrap() == 0 {
            assert!(Instant::now() < deadline, "update never applied");
            thread::sleep(Duration::from_millis(20));
        }
        handle.stop();
        assert_eq!(updater.stats().total_phase_errors, 1);
    }

    #[test]
    fn test_already_removed_records_are_counted() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let doc = page("Page", "Hello");
        store.put(doc.clone());
        updater.enqueue_document(doc.reference.clone(), None);
        updater.run_cycle();

        let entry = IndexEntry::document(doc.reference.clone(), None);
        let mut batch = IndexingBatch::new();
        batch.mark_stale(&entry.id(), 1);
        batch.insert(entry);

        // The prior record vanishes between DRAINING and DELETING
        updater.clear_index().unwrap();

        let mut report = CycleReport::new();
        updater.delete_stale(&batch, &mut report);
        assert_eq!(report.already_removed, 1);
        assert_eq!(report.deleted, 0);
        assert!(report.phase_errors.is_empty());
    }

    #[test]
    fn test_write_replaces_record_without_delete_phase() {
        let dir = TempDir::new().unwrap();
        let (store, updater) = setup(&dir);
        let doc = page("Page", "Hello");
        store.put(doc.clone());
        updater.enqueue_document(doc.reference.clone(), None);
        updater.run_cycle();

        // No stale handles collected, as when the lookup failed
        let mut batch = IndexingBatch::new();
        batch.insert(IndexEntry::document(doc.reference.clone(), None));
        let mut report = CycleReport::new();
        updater.index_batch(&batch, &mut report);

        assert_eq!(report.indexed, 1);
        assert_eq!(updater.indexed_record_count().unwrap(), 1);
    }
}
