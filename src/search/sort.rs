//! Multi-field sort on stored values

use crate::schema::{SortKind, WikiSchema};
use std::cmp::Ordering;
use tantivy::TantivyDocument;
use tantivy::schema::Value;

/// One sort key; `-name` sorts descending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub kind: SortKind,
    pub descending: bool,
}

/// Stored value of a sort key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Text(String),
    Date(i64),
    Unsigned(u64),
}

/// Ordered sort keys; empty means relevance order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Build a sort from key names, dropping keys that cannot be sorted on
    pub fn parse<S: AsRef<str>>(keys: &[S], schema: &WikiSchema) -> Self {
        let keys = keys
            .iter()
            .map(|key| key.as_ref().trim())
            .filter(|key| !key.is_empty())
            .filter_map(|key| {
                let (name, descending) = match key.strip_prefix('-') {
                    Some(name) => (name, true),
                    None => (key, false),
                };
                match schema.sort_field(name) {
                    Some((_, kind)) => Some(SortKey {
                        field: name.to_string(),
                        kind,
                        descending,
                    }),
                    None => {
                        tracing::debug!("Ignoring unsortable sort key '{}'", key);
                        None
                    }
                }
            })
            .collect();
        Self { keys }
    }

    pub fn is_relevance(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Read the sort values of a stored record
    pub fn values_of(&self, doc: &TantivyDocument, schema: &WikiSchema) -> Vec<Option<SortValue>> {
        self.keys
            .iter()
            .map(|key| {
                let (field, _) = schema.sort_field(&key.field)?;
                let value = doc.get_first(field)?;
                match key.kind {
                    SortKind::Text => value.as_str().map(|s| SortValue::Text(s.to_string())),
                    SortKind::Date => value
                        .as_datetime()
                        .map(|d| SortValue::Date(d.into_timestamp_secs())),
                    SortKind::Unsigned => value.as_u64().map(SortValue::Unsigned),
                }
            })
            .collect()
    }

    /// Compare two hits by their sort values, then by descending score
    ///
    /// A hit missing a value sorts after one that has it, whatever the
    /// direction.
    pub fn compare(
        &self,
        a: (&[Option<SortValue>], f32),
        b: (&[Option<SortValue>], f32),
    ) -> Ordering {
        for (i, key) in self.keys.iter().enumerate() {
            let ordering = match (a.0.get(i).and_then(Option::as_ref), b.0.get(i).and_then(Option::as_ref)) {
                (Some(x), Some(y)) if key.descending => y.cmp(x),
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        b.1.total_cmp(&a.1)
    }
}
