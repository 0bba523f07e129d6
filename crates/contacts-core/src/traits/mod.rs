//! Core traits for the contacts system
//!
//! - [`RecordStore`]: Remote record store primitives (save, paginated query, batch modify)
//! - [`RecordStoreFactory`]: Builds a store from configuration

pub mod record_store;

pub use record_store::{QueryCursor, QueryPage, QueryRequest, RecordStore, RecordStoreFactory};
