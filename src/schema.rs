//! Tantivy schema for wiki index records
//!
//! One record per indexable unit. Raw fields carry identity and filters,
//! tokenized fields carry searchable text, `ft` is the fulltext default
//! field, and `props` holds object properties keyed `Class.property`.

use crate::analyzer::WIKI_TOKENIZER;
use crate::error::{Result, SearchError};
use std::path::Path;
use tantivy::schema::{
    DateOptions, FAST, Field, FieldType, IndexRecordOption, JsonObjectOptions, STORED, STRING,
    Schema, SchemaBuilder, TextFieldIndexing, TextOptions,
};

pub const FIELD_ID: &str = "id";
pub const FIELD_WIKI: &str = "wiki";
pub const FIELD_LANG: &str = "lang";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_SPACE: &str = "space";
pub const FIELD_NAME: &str = "name";
pub const FIELD_FULLNAME: &str = "fullname";
pub const FIELD_CLASS: &str = "class";
pub const FIELD_MIMETYPE: &str = "mimetype";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_CREATOR: &str = "creator";
pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_FULLTEXT: &str = "ft";
pub const FIELD_DATE: &str = "date";
pub const FIELD_CREATION_DATE: &str = "creationdate";
pub const FIELD_FILESIZE: &str = "filesize";
pub const FIELD_PROPS: &str = "props";

/// Fields an extractor may fill directly; other extracted names become properties
const EXTRACTED_FIELDS: &[&str] = &[
    FIELD_TITLE,
    FIELD_CONTENT,
    FIELD_AUTHOR,
    FIELD_CREATOR,
    FIELD_FILENAME,
    FIELD_MIMETYPE,
];

/// Kind of a stored value, used to compare sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Text,
    Date,
    Unsigned,
}

/// Schema for wiki records
#[derive(Clone, Debug)]
pub struct WikiSchema {
    pub schema: Schema,

    /// IndexEntry key (raw, stored)
    pub id: Field,
    pub wiki: Field,
    pub lang: Field,
    /// wikipage / objects / attachment
    pub doc_type: Field,
    pub space: Field,
    pub name: Field,
    pub fullname: Field,
    /// Object class name for `objects` records
    pub class: Field,
    pub mimetype: Field,

    pub title: Field,
    pub content: Field,
    pub author: Field,
    pub creator: Field,
    pub filename: Field,

    /// Fulltext (indexed only)
    pub ft: Field,

    pub date: Field,
    pub creation_date: Field,
    pub filesize: Field,

    /// Object properties as a JSON object
    pub props: Field,
}

impl WikiSchema {
    /// Build the schema used for newly created indexes
    pub fn build() -> Self {
        let mut builder = SchemaBuilder::new();

        let indexing = TextFieldIndexing::default()
            .set_tokenizer(WIKI_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);

        // Tokenized and stored
        let text_options = TextOptions::default()
            .set_stored()
            .set_indexing_options(indexing.clone());

        // Tokenized only
        let fulltext_options = TextOptions::default().set_indexing_options(indexing.clone());

        let date_options = DateOptions::default().set_stored().set_indexed().set_fast();

        let props_options = JsonObjectOptions::default()
            .set_stored()
            .set_indexing_options(indexing)
            .set_expand_dots_enabled();

        // Identity and filters (raw, stored)
        let id = builder.add_text_field(FIELD_ID, STRING | STORED);
        let wiki = builder.add_text_field(FIELD_WIKI, STRING | STORED);
        let lang = builder.add_text_field(FIELD_LANG, STRING | STORED);
        let doc_type = builder.add_text_field(FIELD_TYPE, STRING | STORED);
        let space = builder.add_text_field(FIELD_SPACE, STRING | STORED);
        let name = builder.add_text_field(FIELD_NAME, STRING | STORED);
        let fullname = builder.add_text_field(FIELD_FULLNAME, STRING | STORED);
        let class = builder.add_text_field(FIELD_CLASS, STRING | STORED);
        let mimetype = builder.add_text_field(FIELD_MIMETYPE, STRING | STORED);

        // Searchable text (tokenized, stored)
        let title = builder.add_text_field(FIELD_TITLE, text_options.clone());
        let content = builder.add_text_field(FIELD_CONTENT, text_options.clone());
        let author = builder.add_text_field(FIELD_AUTHOR, text_options.clone());
        let creator = builder.add_text_field(FIELD_CREATOR, text_options.clone());
        let filename = builder.add_text_field(FIELD_FILENAME, text_options);

        let ft = builder.add_text_field(FIELD_FULLTEXT, fulltext_options);

        // Sortable metadata
        let date = builder.add_date_field(FIELD_DATE, date_options.clone());
        let creation_date = builder.add_date_field(FIELD_CREATION_DATE, date_options);
        let filesize = builder.add_u64_field(FIELD_FILESIZE, STORED | FAST);

        let props = builder.add_json_field(FIELD_PROPS, props_options);

        Self {
            schema: builder.build(),
            id,
            wiki,
            lang,
            doc_type,
            space,
            name,
            fullname,
            class,
            mimetype,
            title,
            content,
            author,
            creator,
            filename,
            ft,
            date,
            creation_date,
            filesize,
            props,
        }
    }

    /// Resolve our fields in the schema of an existing index
    ///
    /// Fails when the index was not created by this crate.
    pub fn from_schema(schema: &Schema) -> std::result::Result<Self, String> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| format!("missing field '{}'", name))
        };

        Ok(Self {
            schema: schema.clone(),
            id: field(FIELD_ID)?,
            wiki: field(FIELD_WIKI)?,
            lang: field(FIELD_LANG)?,
            doc_type: field(FIELD_TYPE)?,
            space: field(FIELD_SPACE)?,
            name: field(FIELD_NAME)?,
            fullname: field(FIELD_FULLNAME)?,
            class: field(FIELD_CLASS)?,
            mimetype: field(FIELD_MIMETYPE)?,
            title: field(FIELD_TITLE)?,
            content: field(FIELD_CONTENT)?,
            author: field(FIELD_AUTHOR)?,
            creator: field(FIELD_CREATOR)?,
            filename: field(FIELD_FILENAME)?,
            ft: field(FIELD_FULLTEXT)?,
            date: field(FIELD_DATE)?,
            creation_date: field(FIELD_CREATION_DATE)?,
            filesize: field(FIELD_FILESIZE)?,
            props: field(FIELD_PROPS)?,
        })
    }

    /// Like `from_schema`, reporting the directory on mismatch
    pub fn for_index(schema: &Schema, path: &Path) -> Result<Self> {
        Self::from_schema(schema).map_err(|reason| SearchError::SchemaMismatch {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Get the schema
    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    /// Field an extracted value with this name is written to, if any
    pub fn extracted_field(&self, name: &str) -> Option<Field> {
        if EXTRACTED_FIELDS.contains(&name) {
            self.schema.get_field(name).ok()
        } else {
            None
        }
    }

    /// Whether `name` is an indexed string field the query parser accepts
    /// as a default field
    pub fn is_text_field(&self, name: &str) -> bool {
        let Ok(field) = self.schema.get_field(name) else {
            return false;
        };
        match self.schema.get_field_entry(field).field_type() {
            FieldType::Str(options) => options.get_indexing_options().is_some(),
            _ => false,
        }
    }

    /// Field and comparison kind for a sort key, `None` if unsortable
    ///
    /// Only stored scalar fields can be sorted on.
    pub fn sort_field(&self, name: &str) -> Option<(Field, SortKind)> {
        let field = self.schema.get_field(name).ok()?;
        let entry = self.schema.get_field_entry(field);
        if !entry.is_stored() {
            return None;
        }
        let kind = match entry.field_type() {
            FieldType::Str(_) => SortKind::Text,
            FieldType::Date(_) => SortKind::Date,
            FieldType::U64(_) => SortKind::Unsigned,
            _ => return None,
        };
        Some((field, kind))
    }
}

impl Default for WikiSchema {
    fn default() -> Self {
        Self::build()
    }
}
