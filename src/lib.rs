//! Wiki Search - background full-text index maintenance and federated search
//!
//! Library modules for the index core and the `wiki-search` binary

pub mod analyzer;
pub mod config;
pub mod error;
pub mod indexing;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod schema;
pub mod search;
pub mod service;
pub mod store;

pub use error::{Result, SearchError};
pub use service::WikiSearch;
