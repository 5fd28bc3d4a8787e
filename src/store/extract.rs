//! Text extraction strategies
//!
//! An extractor maps a resolved unit to `{field: text}`. Field names that
//! match a text field of the index schema land in that field; any other
//! name is stored as an object property (see `indexing::record`).

use crate::error::StoreError;
use crate::model::{Attachment, WikiDocument};
use std::collections::BTreeMap;

/// Searchable text keyed by field name
pub type ExtractedFields = BTreeMap<String, String>;

/// Replaceable text-extraction strategy
pub trait FieldExtractor: Send + Sync {
    /// Fields of a document translation
    fn document_fields(&self, doc: &WikiDocument) -> Result<ExtractedFields, StoreError>;

    /// Fields of all objects of `class_name` attached to `doc`
    fn object_fields(
        &self,
        doc: &WikiDocument,
        class_name: &str,
    ) -> Result<ExtractedFields, StoreError>;

    /// Fields of one attachment
    fn attachment_fields(
        &self,
        doc: &WikiDocument,
        attachment: &Attachment,
    ) -> Result<ExtractedFields, StoreError>;
}

/// Mime types whose bytes are indexed as text by `PlainTextExtractor`
const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-sh",
];

/// Default extractor: document title/content, object properties as
/// `Class.property`, and text-like attachments decoded as UTF-8
///
/// Binary formats (office documents, PDF, images) only contribute their
/// filename; a content-aware extractor can be injected instead.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn is_text(mime_type: &str) -> bool {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        mime.starts_with("text/") || TEXT_MIME_TYPES.contains(&mime.as_str())
    }
}

impl FieldExtractor for PlainTextExtractor {
    fn document_fields(&self, doc: &WikiDocument) -> Result<ExtractedFields, StoreError> {
        let mut fields = ExtractedFields::new();
        if !doc.title.is_empty() {
            fields.insert("title".to_string(), doc.title.clone());
        }
        if !doc.content.is_empty() {
            fields.insert("content".to_string(), doc.content.clone());
        }
        Ok(fields)
    }

    fn object_fields(
        &self,
        doc: &WikiDocument,
        class_name: &str,
    ) -> Result<ExtractedFields, StoreError> {
        let mut fields = ExtractedFields::new();
        let mut found = false;

        for object in doc.objects_of_class(class_name) {
            found = true;
            for (property, value) in &object.properties {
                if value.is_empty() {
                    continue;
                }
                // Several objects of one class share a property name
                fields
                    .entry(format!("{}.{}", class_name, property))
                    .and_modify(|existing: &mut String| {
                        existing.push(' ');
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.clone());
            }
        }

        if !found {
            return Err(StoreError::not_found(format!(
                "{} has no object of class {}",
                doc.reference, class_name
            )));
        }
        Ok(fields)
    }

    fn attachment_fields(
        &self,
        _doc: &WikiDocument,
        attachment: &Attachment,
    ) -> Result<ExtractedFields, StoreError> {
        let mut fields = ExtractedFields::new();
        fields.insert("filename".to_string(), attachment.filename.clone());

        if Self::is_text(&attachment.mime_type) {
            let text = String::from_utf8_lossy(&attachment.content).into_owned();
            if !text.trim().is_empty() {
                fields.insert("content".to_string(), text);
            }
        } else {
            tracing::debug!(
                "No text extraction for {} ({}), indexing filename only",
                attachment.filename,
                attachment.mime_type
            );
        }
        Ok(fields)
    }
}
