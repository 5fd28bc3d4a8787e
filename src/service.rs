//! Wiki search service
//!
//! Wires the primary index, the updater thread, the searcher pool, the
//! rebuild driver and the search engine from one `Config`.

use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::indexing::{IndexRebuilder, IndexUpdater, PrimaryIndex, UpdaterHandle};
use crate::metrics::UpdaterStats;
use crate::model::{ChangeEvent, DocumentReference, WikiDocument};
use crate::registry::FieldRegistry;
use crate::search::{QueryBuilder, SearchEngine, SearchRequest, SearchResults, SearcherPool};
use crate::store::{DocumentStore, FieldExtractor};
use std::sync::Arc;

/// Running index core
pub struct WikiSearch {
    config: Config,
    updater: Arc<IndexUpdater>,
    handle: Option<UpdaterHandle>,
    rebuilder: Arc<IndexRebuilder>,
    engine: Arc<SearchEngine>,
}

impl WikiSearch {
    /// Open (or create) the primary index and start the updater thread
    ///
    /// Fails with a usage error when no index directory is configured.
    /// When the primary index is new, a full rebuild is started in the
    /// background.
    pub fn start(
        config: Config,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn FieldExtractor>,
    ) -> Result<Self> {
        config.log_summary();
        let primary_dir = config.primary_dir().ok_or(SearchError::NoIndexDirectories)?;
        let analyzer = config.analyzer();

        let primary = Arc::new(PrimaryIndex::open_or_create(
            primary_dir,
            analyzer,
            config.writer.clone(),
        )?);
        let created = primary.was_created();

        let registry = FieldRegistry::new();
        let pool = Arc::new(SearcherPool::new(config.index_dirs.clone(), analyzer));
        let updater = Arc::new(
            IndexUpdater::new(
                primary,
                store,
                extractor,
                registry.clone(),
                config.indexing_interval(),
            )
            .with_searcher_pool(Arc::clone(&pool)),
        );
        let handle = Arc::clone(&updater).spawn()?;
        let rebuilder = Arc::new(IndexRebuilder::new(Arc::clone(&updater)));
        let engine = Arc::new(SearchEngine::new(pool, QueryBuilder::new(registry)));

        if created {
            tracing::info!("New primary index, starting initial rebuild");
            rebuilder.start_rebuild()?;
        }

        Ok(Self {
            config,
            updater,
            handle: Some(handle),
            rebuilder,
            engine,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn updater(&self) -> &Arc<IndexUpdater> {
        &self.updater
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    pub fn enqueue_document(&self, reference: DocumentReference, language: Option<String>) {
        self.updater.enqueue_document(reference, language);
    }

    pub fn enqueue_object(&self, reference: DocumentReference, class_name: impl Into<String>) {
        self.updater.enqueue_object(reference, class_name);
    }

    pub fn enqueue_attachment(&self, reference: DocumentReference, filename: impl Into<String>) {
        self.updater.enqueue_attachment(reference, filename);
    }

    pub fn enqueue_all_attachments_of(&self, document: &WikiDocument) -> usize {
        self.updater.enqueue_all_attachments_of(document)
    }

    pub fn notify(&self, event: ChangeEvent) {
        self.updater.notify(event);
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.engine.search(request)
    }

    pub fn search_in_dirs(&self, request: &SearchRequest, dirs: &str) -> Result<SearchResults> {
        self.engine.search_in_dirs(request, dirs)
    }

    pub async fn search_async(&self, request: SearchRequest) -> Result<SearchResults> {
        self.engine.search_async(request).await
    }

    /// Clear the index and schedule the whole store; -1 on error
    pub fn rebuild_index(&self) -> i64 {
        self.rebuilder.rebuild_index()
    }

    /// Schedule some wikis, optionally clearing them or skipping indexed units
    pub fn start_index(&self, wikis: &[String], clear: bool, only_new: bool) -> i64 {
        self.rebuilder.start_index(wikis, clear, only_new)
    }

    pub fn queue_size(&self) -> usize {
        self.updater.queue_size()
    }

    pub fn active_batch_size(&self) -> usize {
        self.updater.active_batch_size()
    }

    pub fn indexed_record_count(&self) -> Result<u64> {
        self.updater.indexed_record_count()
    }

    pub fn stats(&self) -> UpdaterStats {
        self.updater.stats()
    }

    /// Stop the updater thread and wait for it; the store is flushed on exit
    pub fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}
