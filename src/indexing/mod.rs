//! Indexing module - queue, updater loop and single-writer primary index

pub mod batch;
pub mod errors;
pub mod queue;
pub mod rebuild;
pub mod record;
pub mod updater;
pub mod writer;

pub use batch::IndexingBatch;
pub use errors::{EntryFailure, EntryStage, ErrorCategory};
pub use queue::UpdateQueue;
pub use rebuild::IndexRebuilder;
pub use updater::{IndexUpdater, UpdaterHandle};
pub use writer::{PrimaryIndex, WriteMode, WriterSession};
