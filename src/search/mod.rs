//! Federated search over index partitions
//!
//! A request is compiled per partition, run against each, and the hits are
//! merged into one ranked list, either by relevance score (comparable
//! across partitions since they share schema and scoring) or by the
//! requested sort keys.

pub mod partitions;
pub mod query;
pub mod results;
pub mod sort;

pub use partitions::{Partition, PartitionSet, SearcherPool, create_partitions};
pub use query::{QueryBuilder, QueryMode};
pub use results::{SearchResult, SearchResults};
pub use sort::{SortKey, SortSpec, SortValue};

use crate::config::parse_dir_list;
use crate::error::{Result, SearchError};
use crate::schema::WikiSchema;
use std::sync::Arc;
use tantivy::collector::{Count, TopDocs};
use tantivy::{DocAddress, TantivyDocument};

/// Search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// Sort keys, `-` prefix for descending; empty for relevance
    pub sort: Vec<String>,
    /// Required wiki ids; empty for all wikis
    pub wikis: Vec<String>,
    /// Preferred languages; empty for no preference
    pub languages: Vec<String>,
    /// Maximum number of hits; `None` for all
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_sort<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_wikis<I, S>(mut self, wikis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wikis = wikis.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Split a comma separated list, dropping blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A hit before the merged list is cut and hydrated
struct Candidate {
    partition: usize,
    address: DocAddress,
    score: f32,
    sort_values: Vec<Option<SortValue>>,
}

/// Search facade over the shared pool or ad-hoc partition sets
pub struct SearchEngine {
    pool: Arc<SearcherPool>,
    builder: QueryBuilder,
}

impl SearchEngine {
    pub fn new(pool: Arc<SearcherPool>, builder: QueryBuilder) -> Self {
        Self { pool, builder }
    }

    pub fn pool(&self) -> &Arc<SearcherPool> {
        &self.pool
    }

    /// Search the pooled partitions
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let set = self.pool.current();
        self.search_set(&set, request)
    }

    /// Search a comma separated directory list opened just for this query
    pub fn search_in_dirs(&self, request: &SearchRequest, dirs: &str) -> Result<SearchResults> {
        let set = create_partitions(&parse_dir_list(dirs), self.pool.analyzer());
        self.search_set(&set, request)
    }

    /// Run `search` on the blocking thread pool
    pub async fn search_async(self: &Arc<Self>, request: SearchRequest) -> Result<SearchResults> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.search(&request))
            .await
            .map_err(|e| SearchError::Task(e.to_string()))?
    }

    /// Search an explicit partition set
    pub fn search_set(&self, set: &PartitionSet, request: &SearchRequest) -> Result<SearchResults> {
        // Surface parse errors even when there is nothing to search
        QueryMode::parse(&request.query)?;
        if set.is_empty() {
            tracing::debug!("No partitions to search for '{}'", request.query);
            return Ok(SearchResults::default());
        }

        let partitions: Vec<&Partition> = set.iter().collect();
        let sort = SortSpec::parse(&request.sort, partitions[0].schema());

        let mut candidates = Vec::new();
        let mut total_hits = 0;
        for (i, partition) in partitions.iter().enumerate() {
            total_hits += self.collect(i, partition, request, &sort, &mut candidates)?;
        }

        candidates.sort_by(|a, b| sort.compare((&a.sort_values, a.score), (&b.sort_values, b.score)));
        if let Some(limit) = request.limit {
            candidates.truncate(limit);
        }

        let mut searchers: Vec<Option<tantivy::Searcher>> = vec![None; partitions.len()];
        let mut hits = Vec::with_capacity(candidates.len());
        for (rank, candidate) in candidates.into_iter().enumerate() {
            let partition = partitions[candidate.partition];
            let searcher = searchers[candidate.partition]
                .get_or_insert_with(|| partition.searcher())
                .clone();
            hits.push(SearchResult::load(
                searcher,
                candidate.address,
                partition.schema(),
                partition.dir().to_path_buf(),
                candidate.score,
                rank + 1,
            )?);
        }

        tracing::debug!(
            "Search '{}' matched {} records in {} partitions",
            request.query,
            total_hits,
            partitions.len()
        );
        Ok(SearchResults { hits, total_hits })
    }

    /// Run the request on one partition, returning its match count
    fn collect(
        &self,
        index: usize,
        partition: &Partition,
        request: &SearchRequest,
        sort: &SortSpec,
        candidates: &mut Vec<Candidate>,
    ) -> Result<usize> {
        let schema: &WikiSchema = partition.schema();
        let query = self.builder.build(
            partition.index(),
            schema,
            &request.query,
            &request.wikis,
            &request.languages,
        )?;

        let searcher = partition.searcher();
        let num_docs = searcher.num_docs() as usize;
        // Sorting needs every hit; relevance only the top `limit` of each partition
        let limit = match (sort.is_relevance(), request.limit) {
            (true, Some(limit)) => limit.min(num_docs),
            _ => num_docs,
        }
        .max(1);

        let (top_docs, count) = searcher.search(&query, &(TopDocs::with_limit(limit), Count))?;
        for (score, address) in top_docs {
            let sort_values = if sort.is_relevance() {
                Vec::new()
            } else {
                let doc: TantivyDocument = searcher.doc(address)?;
                sort.values_of(&doc, schema)
            };
            candidates.push(Candidate {
                partition: index,
                address,
                score,
                sort_values,
            });
        }
        Ok(count)
    }
}
