//! Per-entry failures collected during an indexing cycle
//!
//! A failing entry never aborts its cycle. The failure is logged where it
//! happens and returned as a value, so the cycle report states exactly
//! which entries were skipped and why.

use crate::error::{SearchError, StoreError};
use std::fmt;

/// Category of an entry failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The unit no longer exists; re-queueing it will not help
    Permanent,
    /// Anything else; the entry may succeed when queued again
    Transient,
}

/// Cycle phase in which an entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStage {
    /// Looking up prior records while draining
    Lookup,
    /// Re-fetching the unit from the document store
    Resolve,
    /// Extracting searchable text
    Extract,
    /// Removing prior records
    Delete,
    /// Appending the record to the index writer
    Write,
}

impl fmt::Display for EntryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Resolve => "resolve",
            Self::Extract => "extract",
            Self::Delete => "delete",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Details of a single skipped entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFailure {
    /// IndexEntry id
    pub id: String,
    pub stage: EntryStage,
    pub category: ErrorCategory,
    pub message: String,
}

impl EntryFailure {
    pub fn from_store(id: &str, stage: EntryStage, error: &StoreError) -> Self {
        let category = match error {
            StoreError::NotFound(_) => ErrorCategory::Permanent,
            _ => ErrorCategory::Transient,
        };
        Self {
            id: id.to_string(),
            stage,
            category,
            message: error.to_string(),
        }
    }

    pub fn from_index(id: &str, stage: EntryStage, error: &SearchError) -> Self {
        let category = match error {
            SearchError::Store(StoreError::NotFound(_)) => ErrorCategory::Permanent,
            _ => ErrorCategory::Transient,
        };
        Self {
            id: id.to_string(),
            stage,
            category,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at {}: {}", self.id, self.stage, self.message)
    }
}
