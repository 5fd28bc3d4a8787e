//! Search result records
//!
//! A result carries its score, rank and the identity of the indexed unit.
//! The identity is read from the stored record when the hit is loaded;
//! other stored fields are only decoded into values when asked for.

use crate::error::Result;
use crate::model::DocumentReference;
use crate::schema::WikiSchema;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::path::PathBuf;
use tantivy::schema::{Field, Value};
use tantivy::{DocAddress, Document, Searcher, TantivyDocument};

/// One hit
#[derive(Clone)]
pub struct SearchResult {
    pub score: f32,
    /// 1-based position in the merged result list
    pub rank: usize,
    /// IndexEntry id of the record
    pub id: String,
    pub reference: DocumentReference,
    pub language: String,
    pub doc_type: String,
    /// Partition the hit came from
    pub partition: PathBuf,

    searcher: Searcher,
    address: DocAddress,
    schema: WikiSchema,
}

impl SearchResult {
    pub(crate) fn load(
        searcher: Searcher,
        address: DocAddress,
        schema: &WikiSchema,
        partition: PathBuf,
        score: f32,
        rank: usize,
    ) -> Result<Self> {
        let doc: TantivyDocument = searcher.doc(address)?;
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            score,
            rank,
            id: text(schema.id),
            reference: DocumentReference::new(text(schema.wiki), text(schema.space), text(schema.name)),
            language: text(schema.lang),
            doc_type: text(schema.doc_type),
            partition,
            searcher,
            address,
            schema: schema.clone(),
        })
    }

    /// The full stored record, read again from the segment store
    pub fn document(&self) -> Result<TantivyDocument> {
        Ok(self.searcher.doc(self.address)?)
    }

    /// Stored fields as JSON, keyed by field name
    pub fn fields(&self) -> Result<Map<String, JsonValue>> {
        let json = self.document()?.to_json(&self.schema.schema);
        let fields = match serde_json::from_str(&json) {
            Ok(JsonValue::Object(fields)) => fields,
            _ => Map::new(),
        };
        Ok(fields)
    }

    /// First stored text value of a field
    pub fn field_text(&self, name: &str) -> Result<Option<String>> {
        let Ok(field) = self.schema.schema.get_field(name) else {
            return Ok(None);
        };
        let doc = self.document()?;
        Ok(doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string))
    }
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResult")
            .field("score", &self.score)
            .field("rank", &self.rank)
            .field("id", &self.id)
            .field("partition", &self.partition)
            .finish()
    }
}

/// Ranked hits of one search
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchResult>,
    /// Matching records across all partitions, before any limit
    pub total_hits: usize,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchResult> {
        self.hits.iter()
    }
}

impl IntoIterator for SearchResults {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}
