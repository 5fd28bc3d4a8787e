//! Index partitions and the shared searcher pool
//!
//! A partition is one on-disk index directory opened read-only. The pool
//! holds the partition set for the configured directories behind an `Arc`
//! that is swapped whole on refresh, so a query keeps the set it started
//! with even if a refresh lands mid-flight.

use crate::analyzer::Analyzer;
use crate::error::{Result, SearchError};
use crate::schema::WikiSchema;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tantivy::{Index, IndexReader, ReloadPolicy, Searcher};

/// One read-only index directory
pub struct Partition {
    dir: PathBuf,
    index: Index,
    reader: IndexReader,
    schema: WikiSchema,
}

impl Partition {
    /// Open an existing index directory for reading
    ///
    /// Never creates anything: a missing or empty directory is an error.
    pub fn open(dir: &Path, analyzer: Analyzer) -> Result<Self> {
        if !dir.join("meta.json").exists() {
            return Err(SearchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no index in {}", dir.display()),
            )));
        }

        let index = Index::open_in_dir(dir)?;
        let schema = WikiSchema::for_index(&index.schema(), dir)?;
        analyzer.register(&index);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            dir: dir.to_path_buf(),
            index,
            reader,
            schema,
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

    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher().num_docs()
    }
}

/// Immutable set of opened partitions
#[derive(Default)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

impl PartitionSet {
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    pub fn dirs(&self) -> Vec<&Path> {
        self.partitions.iter().map(|p| p.dir()).collect()
    }

    /// Live record count per partition
    pub fn record_counts(&self) -> Vec<(PathBuf, u64)> {
        self.partitions
            .iter()
            .map(|p| (p.dir.clone(), p.num_docs()))
            .collect()
    }
}

/// Open every directory that holds a usable index
///
/// Directories that are missing, empty, corrupt or hold a foreign schema
/// are logged and left out.
pub fn create_partitions(dirs: &[PathBuf], analyzer: Analyzer) -> PartitionSet {
    let partitions = dirs
        .iter()
        .filter_map(|dir| match Partition::open(dir, analyzer) {
            Ok(partition) => Some(partition),
            Err(e) => {
                tracing::warn!("Excluding index partition {}: {}", dir.display(), e);
                None
            }
        })
        .collect();
    PartitionSet { partitions }
}

/// Shared partition set for the configured directories
pub struct SearcherPool {
    dirs: Vec<PathBuf>,
    analyzer: Analyzer,
    current: RwLock<Arc<PartitionSet>>,
    refresh_lock: Mutex<()>,
}

impl SearcherPool {
    /// Open the initial partition set
    pub fn new(dirs: Vec<PathBuf>, analyzer: Analyzer) -> Self {
        let set = create_partitions(&dirs, analyzer);
        tracing::info!("Searcher pool opened {}/{} partitions", set.len(), dirs.len());
        Self {
            dirs,
            analyzer,
            current: RwLock::new(Arc::new(set)),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The partition set queries should use right now
    pub fn current(&self) -> Arc<PartitionSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Reopen every partition and swap the new set in
    ///
    /// Holders of the previous set keep reading from it until they drop
    /// it. Returns the number of partitions in the new set.
    pub fn refresh(&self) -> usize {
        let _refresh = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Opened outside the swap lock so readers never wait on disk I/O
        let set = Arc::new(create_partitions(&self.dirs, self.analyzer));
        let opened = set.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = set;

        tracing::debug!("Refreshed searcher pool: {} partitions", opened);
        opened
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn analyzer(&self) -> Analyzer {
        self.analyzer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::indexing::{PrimaryIndex, WriteMode};
    use tantivy::doc;
    use tempfile::TempDir;

    fn create_index(dir: &Path, ids: &[&str]) {
        let writer_config = WriterConfig {
            memory_budget_mb: 15,
            num_threads: 1,
        };
        let primary = PrimaryIndex::open_or_create(dir, Analyzer::Standard, writer_config).unwrap();
        let schema = primary.schema().clone();
        let mut session = primary.open_writer(WriteMode::Append).unwrap();
        for id in ids {
            session.add(doc!(schema.id => *id)).unwrap();
        }
        session.commit().unwrap();
    }

    #[test]
    fn test_bad_partitions_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let healthy = temp_dir.path().join("healthy");
        let missing = temp_dir.path().join("missing");
        let empty = temp_dir.path().join("empty");
        let corrupt = temp_dir.path().join("corrupt");

        create_index(&healthy, &["a"]);
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&corrupt).unwrap();
        std::fs::write(corrupt.join("meta.json"), b"not json").unwrap();

        let set = create_partitions(
            &[healthy.clone(), missing.clone(), empty, corrupt],
            Analyzer::Standard,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.dirs(), vec![healthy.as_path()]);
        assert!(!missing.exists());
    }

    #[test]
    fn test_refresh_swaps_set() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("index");
        create_index(&dir, &["a"]);

        let pool = SearcherPool::new(vec![dir.clone()], Analyzer::Standard);
        let before = pool.current();
        assert_eq!(before.record_counts()[0].1, 1);

        create_index(&dir, &["b"]);
        assert_eq!(pool.refresh(), 1);

        // The old set is still readable and unchanged
        assert_eq!(before.record_counts()[0].1, 1);
        assert_eq!(pool.current().record_counts()[0].1, 2);
    }
}
