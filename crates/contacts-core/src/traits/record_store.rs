// # Record Store Trait
//
// Defines the interface to the remote, account-scoped record store.
//
// ## Implementations
//
// - In-memory: `MemoryRecordStore` (tests, demos)
// - File-based: `FileRecordStore` (single-user local mirror)
// - HTTP/JSON web service: `contacts-store-http` crate
//
// ## Usage
//
// ```rust,ignore
// use contacts_core::traits::{QueryRequest, RecordStore};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//
//     let mut request = QueryRequest::start("Contact", 100);
//     loop {
//         let page = store.query(&request).await?;
//         println!("{} records", page.records.len());
//         match page.cursor {
//             Some(cursor) => request = QueryRequest::resume(cursor, 100),
//             None => break,
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contact::RecordId;
use crate::record::RemoteRecord;

/// Opaque continuation token for a paginated query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryCursor(String);

impl QueryCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One request for a page of query results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// First page of all records of a type
    Start {
        /// Record type to query
        record_type: String,
        /// Maximum number of records in the page
        limit: usize,
    },
    /// Next page of a query already in progress
    Resume {
        /// Cursor returned with the previous page
        cursor: QueryCursor,
        /// Maximum number of records in the page
        limit: usize,
    },
}

impl QueryRequest {
    pub fn start(record_type: impl Into<String>, limit: usize) -> Self {
        QueryRequest::Start {
            record_type: record_type.into(),
            limit,
        }
    }

    pub fn resume(cursor: QueryCursor, limit: usize) -> Self {
        QueryRequest::Resume { cursor, limit }
    }

    pub fn limit(&self) -> usize {
        match self {
            QueryRequest::Start { limit, .. } | QueryRequest::Resume { limit, .. } => *limit,
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Records in this page (possibly none)
    pub records: Vec<RemoteRecord>,
    /// `Some` if more pages remain, `None` on the last page
    pub cursor: Option<QueryCursor>,
}

impl QueryPage {
    /// A page with no continuation
    pub fn last(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            cursor: None,
        }
    }

    /// A page followed by more
    pub fn more(records: Vec<RemoteRecord>, cursor: QueryCursor) -> Self {
        Self {
            records,
            cursor: Some(cursor),
        }
    }

    pub fn is_last(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Trait for record store implementations
///
/// The store exposes coarse primitives only: save one record, query a page,
/// modify a batch. It knows nothing about contacts.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// - Perform one round trip per call
/// - Return success or failure; never retry (the caller decides)
/// - Never cache results between calls
/// - Never chain pages (`RemoteStoreAdapter` owns pagination)
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Save a single record, creating or replacing it
    ///
    /// # Returns
    ///
    /// - `Ok(RemoteRecord)`: The record as stored (the store's echo)
    /// - `Err(Error)`: If the save failed
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord, crate::Error>;

    /// Fetch one page of query results
    ///
    /// # Returns
    ///
    /// - `Ok(QueryPage)`: Zero or more records plus an optional cursor
    /// - `Err(Error)`: If the page could not be fetched (including a stale cursor)
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, crate::Error>;

    /// Apply a batch of saves and deletes atomically
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Every save and delete was applied
    /// - `Err(Error)`: Nothing was applied
    async fn modify(
        &self,
        saves: Vec<RemoteRecord>,
        deletes: Vec<RecordId>,
    ) -> Result<(), crate::Error>;

    /// Whether the account backing this store is signed in and usable
    ///
    /// Stores without an account concept are always available.
    async fn account_available(&self) -> Result<bool, crate::Error> {
        Ok(true)
    }

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration for the store
    ///
    /// # Returns
    ///
    /// A boxed RecordStore trait object
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
