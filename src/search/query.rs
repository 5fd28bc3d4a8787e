//! Query composition
//!
//! A user query selects one of three syntaxes by prefix:
//! - `PROP <field>:<rest>` searches `rest` in one field or object property
//! - `MULTI <rest>` searches `rest` in every field the updater has written
//! - anything else searches the fulltext field `ft`
//!
//! Wiki filters are required, language filters only boost, so records in
//! the `default` language stay reachable.

use crate::error::{Result, SearchError};
use crate::registry::FieldRegistry;
use crate::schema::{FIELD_PROPS, WikiSchema};
use tantivy::Index;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

const PROPERTY_PREFIX: &str = "PROP ";
const MULTI_PREFIX: &str = "MULTI ";
const RESERVED: &[char] = &[
    '+', '^', '`', ':', '{', '}', '"', '[', ']', '(', ')', '!', '\\', '*',
];

/// Query syntax selected by the user query prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode<'a> {
    Property { field: &'a str, query: &'a str },
    Multi(&'a str),
    Default(&'a str),
}

impl<'a> QueryMode<'a> {
    /// Select the syntax; fails on an empty query or a `PROP` query
    /// without a field
    pub fn parse(user_query: &'a str) -> Result<Self> {
        if user_query.trim().is_empty() {
            return Err(SearchError::query("empty query"));
        }

        if let Some(rest) = user_query.strip_prefix(PROPERTY_PREFIX) {
            let (field, query) = rest
                .split_once(':')
                .ok_or_else(|| SearchError::query(format!("missing ':' in '{}'", user_query)))?;
            let field = field.trim();
            let field = field.strip_prefix("props.").unwrap_or(field);
            if field.is_empty() {
                return Err(SearchError::query(format!("missing field in '{}'", user_query)));
            }
            if query.trim().is_empty() {
                return Err(SearchError::query(format!("nothing to search in '{}'", user_query)));
            }
            return Ok(Self::Property { field, query });
        }

        if let Some(rest) = user_query.strip_prefix(MULTI_PREFIX) {
            if rest.trim().is_empty() {
                return Err(SearchError::query("empty MULTI query"));
            }
            return Ok(Self::Multi(rest));
        }

        Ok(Self::Default(user_query))
    }
}

/// Builds boolean queries from user input and filters
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    registry: FieldRegistry,
}

impl QueryBuilder {
    pub fn new(registry: FieldRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Compose the query for one partition
    pub fn build(
        &self,
        index: &Index,
        schema: &WikiSchema,
        user_query: &str,
        wikis: &[String],
        languages: &[String],
    ) -> Result<Box<dyn Query>> {
        let main = match QueryMode::parse(user_query)? {
            QueryMode::Property { field, query } => self.property_query(index, schema, field, query)?,
            QueryMode::Multi(query) => self.multi_query(index, schema, query)?,
            QueryMode::Default(query) => QueryParser::for_index(index, vec![schema.ft]).parse_query(query)?,
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, main)];
        if let Some(filter) = any_of(schema.wiki, wikis) {
            clauses.push((Occur::Must, filter));
        }
        if let Some(filter) = any_of(schema.lang, languages) {
            clauses.push((Occur::Should, filter));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn property_query(
        &self,
        index: &Index,
        schema: &WikiSchema,
        field: &str,
        query: &str,
    ) -> Result<Box<dyn Query>> {
        match schema.schema.get_field(field) {
            Ok(field) if field != schema.props => {
                Ok(QueryParser::for_index(index, vec![field]).parse_query(query)?)
            }
            _ => scoped_query(index, schema, field, query),
        }
    }

    fn multi_query(&self, index: &Index, schema: &WikiSchema, query: &str) -> Result<Box<dyn Query>> {
        let names = self.registry.snapshot();
        let (fields, properties): (Vec<&String>, Vec<&String>) =
            names.iter().partition(|name| schema.is_text_field(name));

        let mut fields: Vec<Field> = fields
            .into_iter()
            .filter_map(|name| schema.schema.get_field(name).ok())
            .collect();
        if fields.is_empty() && properties.is_empty() {
            fields.push(schema.ft);
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        if !fields.is_empty() {
            let parsed = QueryParser::for_index(index, fields).parse_query(query)?;
            clauses.push((Occur::Should, parsed));
        }
        for property in properties {
            match scoped_query(index, schema, property, query) {
                Ok(scoped) => clauses.push((Occur::Should, scoped)),
                Err(e) => tracing::debug!("Skipping property {} in MULTI query: {}", property, e),
            }
        }
        if clauses.is_empty() {
            return Ok(QueryParser::for_index(index, vec![schema.ft]).parse_query(query)?);
        }

        if clauses.len() == 1 {
            let (_, query) = clauses.remove(0);
            return Ok(query);
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}

/// Parse `query` with every bare term scoped to one object property
fn scoped_query(index: &Index, schema: &WikiSchema, property: &str, query: &str) -> Result<Box<dyn Query>> {
    let scope = format!("{}.{}", FIELD_PROPS, escape_path(property));
    let rewritten = scope_terms(query, &scope);
    tracing::debug!("Property query rewritten to '{}'", rewritten);
    Ok(QueryParser::for_index(index, vec![schema.ft]).parse_query(&rewritten)?)
}

/// Escape the characters the query grammar reserves in field names
///
/// Dots stay bare: they separate the segments of the property path.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_whitespace() || RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Prefix every bare term of `query` with `scope:`
///
/// Quoted phrases stay whole. Boolean operators, `*` and terms that
/// already name a field are left alone; `+`, `-`, `(` and `)` around a
/// term are kept in place.
pub fn scope_terms(query: &str, scope: &str) -> String {
    split_tokens(query)
        .into_iter()
        .map(|token| {
            if matches!(token.as_str(), "AND" | "OR" | "NOT") {
                return token;
            }
            let start = token.len() - token.trim_start_matches(['+', '-', '(']).len();
            let end = token.trim_end_matches(')').len().max(start);
            let (prefix, rest) = token.split_at(start);
            let (core, suffix) = rest.split_at(end - start);

            if core.is_empty() || core == "*" || (!core.starts_with('"') && core.contains(':')) {
                token
            } else {
                format!("{}{}:{}{}", prefix, scope, core, suffix)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace split that keeps quoted phrases together
fn split_tokens(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in query.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Equality on a raw field: one term as is, several OR'ed
fn any_of(field: Field, values: &[String]) -> Option<Box<dyn Query>> {
    let mut terms: Vec<Box<dyn Query>> = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            Box::new(TermQuery::new(
                Term::from_field_text(field, value),
                IndexRecordOption::Basic,
            )) as Box<dyn Query>
        })
        .collect();

    match terms.len() {
        0 => None,
        1 => terms.pop(),
        _ => Some(Box::new(BooleanQuery::new(
            terms.into_iter().map(|q| (Occur::Should, q)).collect(),
        ))),
    }
}
