// # Record Store Implementations
//
// This module provides local implementations of the RecordStore trait.
// Both keep records in an id-ordered map and page through it with a
// key-set cursor (the id of the last record handed out), so a record saved
// or deleted between pages never shifts the records that follow.

pub mod file;
pub mod memory;

pub use file::{FileRecordStore, FileRecordStoreFactory};
pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory};

use chrono::Utc;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::contact::RecordId;
use crate::record::RemoteRecord;
use crate::traits::{QueryCursor, QueryPage, QueryRequest};
use crate::Error;

/// Cut one page out of an id-ordered record map
pub(crate) fn page_of(
    records: &BTreeMap<RecordId, RemoteRecord>,
    request: &QueryRequest,
) -> Result<QueryPage, Error> {
    let limit = request.limit();
    if limit == 0 {
        return Err(Error::store("Query limit must be > 0"));
    }

    let (record_type, lower) = match request {
        QueryRequest::Start { record_type, .. } => (record_type.clone(), Bound::Unbounded),
        QueryRequest::Resume { cursor, .. } => {
            let (record_type, after) = decode_cursor(cursor)?;
            (record_type, Bound::Excluded(after))
        }
    };

    let mut matching = records
        .range((lower, Bound::Unbounded))
        .map(|(_, record)| record)
        .filter(|record| record.record_type == record_type);

    let page: Vec<RemoteRecord> = matching.by_ref().take(limit).cloned().collect();

    let cursor = match (page.last(), matching.next()) {
        (Some(last), Some(_)) => Some(encode_cursor(&record_type, &last.id)),
        _ => None,
    };

    Ok(QueryPage {
        records: page,
        cursor,
    })
}

/// Apply a batch to a record map: all or nothing
///
/// Deleting an id that does not exist fails the whole batch before anything
/// is written.
pub(crate) fn apply_batch(
    records: &mut BTreeMap<RecordId, RemoteRecord>,
    saves: Vec<RemoteRecord>,
    deletes: Vec<RecordId>,
) -> Result<(), Error> {
    if let Some(missing) = deletes.iter().find(|id| !records.contains_key(*id)) {
        return Err(Error::not_found(missing.to_string()));
    }

    let now = Utc::now();
    for mut record in saves {
        record.modified_at = Some(now);
        records.insert(record.id.clone(), record);
    }
    for id in &deletes {
        records.remove(id);
    }

    Ok(())
}

fn encode_cursor(record_type: &str, after: &RecordId) -> QueryCursor {
    QueryCursor::new(format!("{}/{}", record_type, after))
}

fn decode_cursor(cursor: &QueryCursor) -> Result<(String, RecordId), Error> {
    cursor
        .as_str()
        .split_once('/')
        .map(|(record_type, after)| (record_type.to_string(), RecordId::from_name(after)))
        .ok_or_else(|| Error::store(format!("Invalid query cursor: {}", cursor)))
}
