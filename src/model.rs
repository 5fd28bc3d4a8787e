//! Data model shared by the updater and the search layer
//!
//! `IndexEntry` describes one indexable unit (a document translation, the
//! objects of one class attached to a document, or one attachment) and
//! carries the deterministic key used to find and replace prior versions.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Language code stored for content that has no explicit language
pub const DEFAULT_LANGUAGE: &str = "default";

/// Record type of a document translation
pub const DOCTYPE_WIKIPAGE: &str = "wikipage";
/// Record type of the objects of one class
pub const DOCTYPE_OBJECTS: &str = "objects";
/// Record type of an attachment
pub const DOCTYPE_ATTACHMENT: &str = "attachment";

/// Reference to a document in the store: wiki, space and page name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentReference {
    pub wiki: String,
    pub space: String,
    pub name: String,
}

impl DocumentReference {
    pub fn new(wiki: impl Into<String>, space: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            wiki: wiki.into(),
            space: space.into(),
            name: name.into(),
        }
    }

    /// Parse `wiki:Space.Page` (or `Space.Page` with the given default wiki)
    ///
    /// The page name is everything after the last dot, so nested space
    /// names such as `Main.Sub.Page` keep `Main.Sub` as the space.
    pub fn parse(value: &str, default_wiki: &str) -> Option<Self> {
        let (wiki, full_name) = match value.split_once(':') {
            Some((wiki, rest)) => (wiki, rest),
            None => (default_wiki, value),
        };
        let (space, name) = full_name.rsplit_once('.')?;
        if wiki.is_empty() || space.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(wiki, space, name))
    }

    /// `Space.Page`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.space, self.name)
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.wiki, self.space, self.name)
    }
}

/// A structured object attached to a document
#[derive(Debug, Clone, PartialEq)]
pub struct WikiObject {
    pub class_name: String,
    pub number: u32,
    pub properties: BTreeMap<String, String>,
}

/// A file attached to a document
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub author: String,
    /// Unix timestamp (seconds) of the upload
    pub date: i64,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A document (or one of its translations) as resolved from the store
#[derive(Debug, Clone, PartialEq)]
pub struct WikiDocument {
    pub reference: DocumentReference,
    /// `None` for the default translation
    pub language: Option<String>,
    pub title: String,
    pub content: String,
    pub author: String,
    pub creator: String,
    /// Unix timestamp (seconds) of the last modification
    pub date: i64,
    /// Unix timestamp (seconds) of the creation
    pub creation_date: i64,
    pub objects: Vec<WikiObject>,
    pub attachments: Vec<Attachment>,
}

impl WikiDocument {
    /// Create an empty document with the given reference
    pub fn new(reference: DocumentReference) -> Self {
        Self {
            reference,
            language: None,
            title: String::new(),
            content: String::new(),
            author: String::new(),
            creator: String::new(),
            date: 0,
            creation_date: 0,
            objects: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Language code as stored in the index
    pub fn language_code(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn objects_of_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a WikiObject> {
        self.objects.iter().filter(move |o| o.class_name == class_name)
    }

    pub fn attachment(&self, filename: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.filename == filename)
    }

    /// Distinct class names of the attached objects, sorted
    pub fn object_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.objects.iter().map(|o| o.class_name.clone()).collect();
        classes.sort();
        classes.dedup();
        classes
    }
}

/// Index entry for one document translation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentEntry {
    pub reference: DocumentReference,
    pub language: Option<String>,
}

/// Index entry for all objects of one class attached to a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectEntry {
    pub reference: DocumentReference,
    pub class_name: String,
}

/// Index entry for one attachment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentEntry {
    pub reference: DocumentReference,
    pub filename: String,
}

/// One indexable unit
///
/// Two entries with equal `id()` denote the same logical unit; the index
/// holds at most one record per id once a cycle completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexEntry {
    Document(DocumentEntry),
    Object(ObjectEntry),
    Attachment(AttachmentEntry),
}

impl IndexEntry {
    pub fn document(reference: DocumentReference, language: Option<String>) -> Self {
        // An explicit "default" is the same unit as no language at all
        let language = language.filter(|l| !l.is_empty() && l != DEFAULT_LANGUAGE);
        Self::Document(DocumentEntry { reference, language })
    }

    pub fn object(reference: DocumentReference, class_name: impl Into<String>) -> Self {
        Self::Object(ObjectEntry {
            reference,
            class_name: class_name.into(),
        })
    }

    pub fn attachment(reference: DocumentReference, filename: impl Into<String>) -> Self {
        Self::Attachment(AttachmentEntry {
            reference,
            filename: filename.into(),
        })
    }

    /// Deterministic key: `wiki:Space.Page/<discriminator>/<language>`
    pub fn id(&self) -> String {
        match self {
            Self::Document(e) => format!("{}/{}", e.reference, self.language()),
            Self::Object(e) => format!("{}/object/{}/{}", e.reference, e.class_name, self.language()),
            Self::Attachment(e) => {
                format!("{}/attachment/{}/{}", e.reference, e.filename, self.language())
            }
        }
    }

    pub fn reference(&self) -> &DocumentReference {
        match self {
            Self::Document(e) => &e.reference,
            Self::Object(e) => &e.reference,
            Self::Attachment(e) => &e.reference,
        }
    }

    /// Language of the indexed unit; objects and attachments are not translated
    pub fn language(&self) -> &str {
        match self {
            Self::Document(e) => e.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
            Self::Object(_) | Self::Attachment(_) => DEFAULT_LANGUAGE,
        }
    }

    /// Language to resolve from the store, `None` for the default translation
    pub fn store_language(&self) -> Option<&str> {
        match self {
            Self::Document(e) => e.language.as_deref(),
            Self::Object(_) | Self::Attachment(_) => None,
        }
    }

    /// Record type written to the `type` field
    pub fn doc_type(&self) -> &'static str {
        match self {
            Self::Document(_) => DOCTYPE_WIKIPAGE,
            Self::Object(_) => DOCTYPE_OBJECTS,
            Self::Attachment(_) => DOCTYPE_ATTACHMENT,
        }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Change notifications delivered by the external event bus
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    DocumentChanged {
        reference: DocumentReference,
        language: Option<String>,
    },
    DocumentDeleted {
        reference: DocumentReference,
        language: Option<String>,
    },
    ObjectChanged {
        reference: DocumentReference,
        class_name: String,
    },
    AttachmentUploaded {
        reference: DocumentReference,
        filename: String,
    },
}

impl ChangeEvent {
    /// The entry to queue for this notification
    pub fn into_entry(self) -> IndexEntry {
        match self {
            Self::DocumentChanged { reference, language }
            | Self::DocumentDeleted { reference, language } => IndexEntry::document(reference, language),
            Self::ObjectChanged {
                reference,
                class_name,
            } => IndexEntry::object(reference, class_name),
            Self::AttachmentUploaded {
                reference,
                filename,
            } => IndexEntry::attachment(reference, filename),
        }
    }
}
