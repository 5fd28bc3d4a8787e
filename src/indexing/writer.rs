//! Primary index and its single writer
//!
//! At most one writer is live on the primary directory. A thread that
//! opens a second writer while holding one gets `WriterAlreadyOpen`; other
//! threads wait on a condition variable until the writer is released.
//! Another process holding the index lock is reported the same way.

use crate::analyzer::Analyzer;
use crate::config::WriterConfig;
use crate::error::{Result, SearchError};
use crate::schema::WikiSchema;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use tantivy::collector::Count;
use tantivy::directory::error::LockError;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, TantivyError, Term};

/// How a writer session treats existing records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep existing records
    Append,
    /// Remove every record when the session commits
    Truncate,
}

/// Tracks which thread owns the writer
#[derive(Debug, Default)]
struct WriterGate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl WriterGate {
    fn acquire(&self, path: &Path) -> Result<GateGuard<'_>> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *owner {
                None => {
                    *owner = Some(me);
                    return Ok(GateGuard { gate: self });
                }
                Some(current) if current == me => {
                    return Err(SearchError::WriterAlreadyOpen(path.display().to_string()));
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release(&self) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.released.notify_all();
    }

    fn is_open(&self) -> bool {
        self.owner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Ownership of the gate; released when dropped
struct GateGuard<'a> {
    gate: &'a WriterGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// The writable primary partition
pub struct PrimaryIndex {
    dir: PathBuf,
    index: Index,
    schema: WikiSchema,
    writer_config: WriterConfig,
    gate: WriterGate,
    created: bool,
}

impl PrimaryIndex {
    /// Open the index in `dir`, creating directory and index if needed
    pub fn open_or_create(dir: &Path, analyzer: Analyzer, writer_config: WriterConfig) -> Result<Self> {
        let created = !dir.join("meta.json").exists();

        let index = if created {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Creating index in {}", dir.display());
            Index::create_in_dir(dir, WikiSchema::build().schema())?
        } else {
            Index::open_in_dir(dir)?
        };

        let schema = WikiSchema::for_index(&index.schema(), dir)?;
        analyzer.register(&index);

        Ok(Self {
            dir: dir.to_path_buf(),
            index,
            schema,
            writer_config,
            gate: WriterGate::default(),
            created,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn schema(&self) -> &WikiSchema {
        &self.schema
    }

    /// Whether this handle created a fresh, empty index
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Open the single writer
    ///
    /// Waits while another thread holds the writer. Fails with
    /// `WriterAlreadyOpen` if the calling thread already holds it or if
    /// another process owns the index lock.
    pub fn open_writer(&self, mode: WriteMode) -> Result<WriterSession<'_>> {
        // Dropped on every early return below, which frees the gate again
        let guard = self.gate.acquire(&self.dir)?;

        let writer: IndexWriter = self
            .index
            .writer_with_num_threads(self.writer_config.threads(), self.writer_config.total_budget_bytes())
            .map_err(|e| match e {
                TantivyError::LockFailure(LockError::LockBusy, _) => {
                    SearchError::WriterAlreadyOpen(self.dir.display().to_string())
                }
                other => other.into(),
            })?;

        let mut session = WriterSession {
            writer,
            schema: &self.schema,
            pending: false,
            _gate: guard,
        };

        if mode == WriteMode::Truncate {
            session.writer.delete_all_documents()?;
            session.pending = true;
        }

        tracing::debug!("Opened index writer on {} ({:?})", self.dir.display(), mode);
        Ok(session)
    }

    pub fn is_writer_open(&self) -> bool {
        self.gate.is_open()
    }

    /// Remove the records of the given wikis
    pub fn delete_wikis(&self, wikis: &[String]) -> Result<()> {
        let mut session = self.open_writer(WriteMode::Append)?;
        for wiki in wikis {
            session.writer.delete_term(Term::from_field_text(self.schema.wiki, wiki));
            session.pending = true;
        }
        session.commit()?;
        tracing::info!("Cleared wikis {:?} in {}", wikis, self.dir.display());
        Ok(())
    }

    /// Remove every record: open destructively and close right away
    pub fn truncate(&self) -> Result<()> {
        let mut session = self.open_writer(WriteMode::Truncate)?;
        session.commit()?;
        tracing::info!("Cleared index in {}", self.dir.display());
        Ok(())
    }

    /// Fresh reader that only moves when told to
    pub fn reader(&self) -> Result<IndexReader> {
        Ok(self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }

    /// Number of live records on disk
    pub fn record_count(&self) -> Result<u64> {
        Ok(self.reader()?.searcher().num_docs())
    }

    /// Live records carrying an IndexEntry id, as seen by `searcher`
    pub fn live_records(&self, searcher: &Searcher, id: &str) -> Result<u64> {
        let term = Term::from_field_text(self.schema.id, id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        Ok(searcher.search(&query, &Count)? as u64)
    }
}

/// A live writer; released (and uncommitted changes rolled back) on drop
///
/// Fields drop in declaration order: the Tantivy writer and its directory
/// lock go first, the gate last, so a woken waiter never sees a held lock.
pub struct WriterSession<'a> {
    writer: IndexWriter,
    schema: &'a WikiSchema,
    pending: bool,
    _gate: GateGuard<'a>,
}

impl WriterSession<'_> {
    /// Delete every record carrying this IndexEntry id
    pub fn delete_id(&mut self, id: &str) {
        let term = Term::from_field_text(self.schema.id, id);
        self.writer.delete_term(term);
        self.pending = true;
    }

    /// Append a record
    pub fn add(&mut self, doc: TantivyDocument) -> Result<()> {
        self.writer.add_document(doc)?;
        self.pending = true;
        Ok(())
    }

    /// Commit all pending changes
    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;
        self.pending = false;
        Ok(())
    }
}

impl Drop for WriterSession<'_> {
    fn drop(&mut self) {
        if self.pending {
            // Attempt to rollback any uncommitted changes before releasing the lock
            if let Err(e) = self.writer.rollback() {
                tracing::warn!("Failed to rollback index writer during drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tantivy::doc;
    use tempfile::TempDir;

    fn open(dir: &Path) -> PrimaryIndex {
        let writer_config = WriterConfig {
            memory_budget_mb: 15,
            num_threads: 1,
        };
        PrimaryIndex::open_or_create(dir, Analyzer::Standard, writer_config).unwrap()
    }

    fn add_record(session: &mut WriterSession<'_>, schema: &WikiSchema, id: &str) {
        session
            .add(doc!(schema.id => id, schema.title => "record"))
            .unwrap();
    }

    #[test]
    fn test_create_then_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");

        let primary = open(&path);
        assert!(primary.was_created());
        drop(primary);

        let primary = open(&path);
        assert!(!primary.was_created());
        assert_eq!(primary.record_count().unwrap(), 0);
    }

    #[test]
    fn test_second_writer_on_same_thread_fails() {
        let temp_dir = TempDir::new().unwrap();
        let primary = open(temp_dir.path());

        let _first = primary.open_writer(WriteMode::Append).unwrap();
        let second = primary.open_writer(WriteMode::Append);
        assert!(matches!(second, Err(SearchError::WriterAlreadyOpen(_))));
    }

    #[test]
    fn test_writer_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let primary = open(temp_dir.path());

        {
            let mut session = primary.open_writer(WriteMode::Append).unwrap();
            add_record(&mut session, primary.schema(), "a");
            session.commit().unwrap();
        }
        assert!(!primary.is_writer_open());

        // Uncommitted records are rolled back
        {
            let mut session = primary.open_writer(WriteMode::Append).unwrap();
            add_record(&mut session, primary.schema(), "b");
        }
        assert_eq!(primary.record_count().unwrap(), 1);
    }

    #[test]
    fn test_other_thread_waits_for_writer() {
        let temp_dir = TempDir::new().unwrap();
        let primary = Arc::new(open(temp_dir.path()));

        // The waiter must get the Tantivy lock as soon as the gate opens
        for _ in 0..5 {
            let session = primary.open_writer(WriteMode::Append).unwrap();
            let waiter = {
                let primary = Arc::clone(&primary);
                thread::spawn(move || primary.truncate())
            };

            thread::sleep(Duration::from_millis(50));
            assert!(!waiter.is_finished());
            drop(session);

            waiter.join().unwrap().unwrap();
            assert!(!primary.is_writer_open());
        }
    }

    #[test]
    fn test_delete_and_truncate() {
        let temp_dir = TempDir::new().unwrap();
        let primary = open(temp_dir.path());

        let mut session = primary.open_writer(WriteMode::Append).unwrap();
        add_record(&mut session, primary.schema(), "a");
        add_record(&mut session, primary.schema(), "b");
        session.commit().unwrap();
        session.delete_id("a");
        session.commit().unwrap();
        drop(session);
        assert_eq!(primary.record_count().unwrap(), 1);

        primary.truncate().unwrap();
        assert_eq!(primary.record_count().unwrap(), 0);
    }

    #[test]
    fn test_delete_wikis_and_live_records() {
        let temp_dir = TempDir::new().unwrap();
        let primary = open(temp_dir.path());
        let schema = primary.schema().clone();

        let mut session = primary.open_writer(WriteMode::Append).unwrap();
        for (id, wiki) in [("a", "wiki1"), ("b", "wiki2"), ("c", "wiki3")] {
            session
                .add(doc!(schema.id => id, schema.wiki => wiki, schema.title => "record"))
                .unwrap();
        }
        session.commit().unwrap();
        drop(session);

        primary
            .delete_wikis(&["wiki1".to_string(), "wiki3".to_string()])
            .unwrap();

        let searcher = primary.reader().unwrap().searcher();
        assert_eq!(primary.live_records(&searcher, "a").unwrap(), 0);
        assert_eq!(primary.live_records(&searcher, "b").unwrap(), 1);
        assert_eq!(primary.live_records(&searcher, "c").unwrap(), 0);
    }
}
