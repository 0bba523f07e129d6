//! Remote store adapter
//!
//! Wraps a [`RecordStore`] and exposes the three primitives the engine needs:
//!
//! - [`RemoteStoreAdapter::save_one`]: save a single record
//! - [`RemoteStoreAdapter::query_all`]: every record of the contact type,
//!   chaining cursor pages sequentially into one result
//! - [`RemoteStoreAdapter::modify_batch`]: save-only or delete-only batch,
//!   rejecting malformed batches before touching the store
//!
//! The adapter has no knowledge of contacts beyond the record type name.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::contact::RecordId;
use crate::error::{BatchShape, Error, ModifyError, TransactionKind};
use crate::record::{RECORD_TYPE, RemoteRecord};
use crate::traits::{QueryRequest, RecordStore};

/// Async facade over a record store
pub struct RemoteStoreAdapter {
    store: Box<dyn RecordStore>,
    page_size: usize,
}

impl RemoteStoreAdapter {
    /// Create an adapter requesting `page_size` records per query page
    pub fn new(store: Box<dyn RecordStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    /// Name of the underlying store
    pub fn store_name(&self) -> &'static str {
        self.store.store_name()
    }

    /// Save one record and return the store's echo
    pub async fn save_one(&self, record: RemoteRecord) -> Result<RemoteRecord, Error> {
        trace!("Saving record {} to {}", record.id, self.store_name());
        self.store.save(record).await
    }

    /// Fetch every contact record, following cursors until exhausted
    ///
    /// Each page is requested only after the previous one has been collected.
    /// Any page failure aborts the whole query; records from earlier pages
    /// are discarded. A cursor the store has already handed out fails the
    /// query with [`Error::InvalidResponse`].
    pub async fn query_all(&self) -> Result<Vec<RemoteRecord>, Error> {
        let mut collected = Vec::new();
        let mut request = QueryRequest::start(RECORD_TYPE, self.page_size);
        let mut seen_cursors = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self.store.query(&request).await?;
            pages += 1;
            trace!("Query page {} returned {} records", pages, page.records.len());
            collected.extend(page.records);

            let Some(cursor) = page.cursor else {
                break;
            };
            if !seen_cursors.insert(cursor.clone()) {
                warn!(
                    "{} repeated query cursor {} after {} page(s)",
                    self.store_name(),
                    cursor,
                    pages
                );
                return Err(Error::invalid_response(format!(
                    "query cursor did not advance: {}",
                    cursor
                )));
            }
            request = QueryRequest::resume(cursor, self.page_size);
        }

        debug!(
            "Query of {} finished: {} records in {} page(s)",
            self.store_name(),
            collected.len(),
            pages
        );
        Ok(collected)
    }

    /// Apply a batch that either saves records or deletes ids, never both
    ///
    /// `None` and an empty vector are equivalent. A batch with nothing in it,
    /// or with both saves and deletes, is rejected with
    /// [`ModifyError::Setup`] before any network interaction.
    pub async fn modify_batch(
        &self,
        records_to_save: Option<Vec<RemoteRecord>>,
        record_ids_to_delete: Option<Vec<RecordId>>,
    ) -> Result<(), ModifyError> {
        let saves = records_to_save.unwrap_or_default();
        let deletes = record_ids_to_delete.unwrap_or_default();

        let kind = match (saves.is_empty(), deletes.is_empty()) {
            (false, true) => TransactionKind::Update,
            (true, false) => TransactionKind::Delete,
            (true, true) => return Err(ModifyError::Setup(BatchShape::Empty)),
            (false, false) => return Err(ModifyError::Setup(BatchShape::Mixed)),
        };

        trace!(
            "Modify batch ({}) on {}: {} save(s), {} delete(s)",
            kind,
            self.store_name(),
            saves.len(),
            deletes.len()
        );

        self.store
            .modify(saves, deletes)
            .await
            .map_err(|source| ModifyError::Remote { kind, source })?;

        debug!("Modify batch ({}) succeeded", kind);
        Ok(())
    }

    /// Ask the store whether its account is usable
    pub async fn account_available(&self) -> Result<bool, Error> {
        self.store.account_available().await
    }
}
