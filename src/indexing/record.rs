//! Turning a queued entry into an index record
//!
//! Preparation re-fetches the unit from the document store, extracts its
//! text and lays it out on the schema. It touches no index state, so a
//! whole batch can be prepared in parallel before the writer appends.

use super::errors::{EntryFailure, EntryStage};
use crate::error::StoreError;
use crate::model::{Attachment, IndexEntry, WikiDocument};
use crate::schema::{FIELD_FULLTEXT, WikiSchema};
use crate::store::{DocumentStore, ExtractedFields, FieldExtractor};
use std::collections::BTreeMap;
use tantivy::schema::OwnedValue;
use tantivy::{DateTime, TantivyDocument};

/// A record ready to be appended
#[derive(Debug)]
pub struct PreparedRecord {
    pub id: String,
    pub doc: TantivyDocument,
    /// Searchable field and property names written to the record
    pub field_names: Vec<String>,
}

/// Resolve, extract and lay out one entry
pub fn prepare(
    entry: &IndexEntry,
    store: &dyn DocumentStore,
    extractor: &dyn FieldExtractor,
    schema: &WikiSchema,
) -> Result<PreparedRecord, EntryFailure> {
    let id = entry.id();

    let document = store
        .resolve(entry.reference(), entry.store_language())
        .map_err(|e| EntryFailure::from_store(&id, EntryStage::Resolve, &e))?;

    let (fields, attachment) = match entry {
        IndexEntry::Document(_) => (extractor.document_fields(&document), None),
        IndexEntry::Object(e) => (extractor.object_fields(&document, &e.class_name), None),
        IndexEntry::Attachment(e) => {
            let attachment = document.attachment(&e.filename).ok_or_else(|| {
                let error = StoreError::not_found(format!(
                    "{} has no attachment {}",
                    document.reference, e.filename
                ));
                EntryFailure::from_store(&id, EntryStage::Resolve, &error)
            })?;
            (extractor.attachment_fields(&document, attachment), Some(attachment))
        }
    };
    let fields = fields.map_err(|e| EntryFailure::from_store(&id, EntryStage::Extract, &e))?;

    let (doc, field_names) = build_record(entry, &document, attachment, &fields, schema);
    Ok(PreparedRecord { id, doc, field_names })
}

/// Lay out identity, metadata and extracted text on the schema
fn build_record(
    entry: &IndexEntry,
    document: &WikiDocument,
    attachment: Option<&Attachment>,
    fields: &ExtractedFields,
    schema: &WikiSchema,
) -> (TantivyDocument, Vec<String>) {
    let reference = entry.reference();
    let mut doc = TantivyDocument::default();
    let mut field_names = Vec::new();
    let mut fulltext = Vec::new();

    doc.add_text(schema.id, entry.id());
    doc.add_text(schema.wiki, &reference.wiki);
    doc.add_text(schema.lang, entry.language());
    doc.add_text(schema.doc_type, entry.doc_type());
    doc.add_text(schema.space, &reference.space);
    doc.add_text(schema.name, &reference.name);
    doc.add_text(schema.fullname, reference.full_name());

    let (author, date) = match (entry, attachment) {
        (IndexEntry::Object(e), _) => {
            doc.add_text(schema.class, &e.class_name);
            (document.author.as_str(), document.date)
        }
        (IndexEntry::Attachment(_), Some(attachment)) => {
            doc.add_text(schema.mimetype, &attachment.mime_type);
            doc.add_u64(schema.filesize, attachment.size());
            (attachment.author.as_str(), attachment.date)
        }
        _ => (document.author.as_str(), document.date),
    };

    // Metadata the extractor did not already supply
    let metadata = [
        (schema.author, "author", author),
        (schema.creator, "creator", document.creator.as_str()),
    ];
    for (field, name, value) in metadata {
        if !value.is_empty() && !fields.contains_key(name) {
            doc.add_text(field, value);
            fulltext.push(value.to_string());
            field_names.push(name.to_string());
        }
    }

    doc.add_date(schema.date, DateTime::from_timestamp_secs(date));
    doc.add_date(
        schema.creation_date,
        DateTime::from_timestamp_secs(document.creation_date),
    );

    let mut props = BTreeMap::new();
    for (name, text) in fields {
        let name = name.strip_prefix("props.").unwrap_or(name);
        match schema.extracted_field(name) {
            Some(field) => doc.add_text(field, text),
            None => {
                props.insert(name.to_string(), OwnedValue::Str(text.clone()));
            }
        }
        fulltext.push(text.clone());
        field_names.push(name.to_string());
    }
    if !props.is_empty() {
        doc.add_object(schema.props, props);
    }

    if !fulltext.is_empty() {
        doc.add_text(schema.ft, fulltext.join(" "));
        field_names.push(FIELD_FULLTEXT.to_string());
    }

    (doc, field_names)
}
