//! Contract Test: Paginated Fetch
//!
//! Constraints verified:
//! - Every page of a query is followed until the store reports no more
//! - Pages are requested one after another, each resuming from the previous
//!   page's cursor
//! - Records that cannot be decoded are dropped, the rest are kept
//! - A failing page leaves the local collection exactly as it was
//! - Fetch replaces the collection rather than merging into it

mod common;

use common::*;
use contacts_core::error::{ContactError, TransactionKind};
use contacts_core::record::RECORD_TYPE;
use contacts_core::traits::QueryRequest;
use contacts_core::{ContactFields, EngineEvent};
use tokio_test::{assert_err, assert_ok};

fn numbered(count: usize) -> Vec<contacts_core::RemoteRecord> {
    (0..count)
        .map(|i| contact_record(&format!("id-{:03}", i), &format!("First{:03}", i), "Last"))
        .collect()
}

#[tokio::test]
async fn two_pages_are_chained_into_one_result() {
    let (engine, mut rx, store) = scripted_engine(50);

    store.push_paged(numbered(53), 50);

    assert_ok!(engine.fetch().await);

    assert_eq!(engine.len().await, 53);
    assert_eq!(store.query_calls(), 2);

    let queries = store.queries();
    assert_eq!(queries[0], QueryRequest::start(RECORD_TYPE, 50));
    assert!(
        matches!(&queries[1], QueryRequest::Resume { cursor, limit: 50 } if cursor.as_str() == "page-1"),
        "second request should resume from the first cursor, got {:?}",
        queries[1]
    );

    assert_eq!(
        drain(&mut rx),
        vec![EngineEvent::Fetched {
            count: 53,
            dropped: 0
        }]
    );
}

#[tokio::test]
async fn fetch_replaces_prior_collection() {
    let (engine, _rx, store) = scripted_engine(100);

    assert_ok!(engine.create(ContactFields::new("Local", "Only", "", "")).await);
    assert_eq!(engine.len().await, 1);

    store.push_paged(numbered(3), 100);
    assert_ok!(engine.fetch().await);

    let contacts = engine.contacts().await;
    assert_eq!(contacts.len(), 3);
    assert!(contacts.iter().all(|c| c.first_name() != "Local"));
}

#[tokio::test]
async fn empty_store_yields_empty_collection() {
    let (engine, _rx, store) = scripted_engine(100);

    store.push_paged(Vec::new(), 100);
    assert_ok!(engine.fetch().await);

    assert!(engine.is_empty().await);
    assert_eq!(store.query_calls(), 1);
}

#[tokio::test]
async fn undecodable_records_are_dropped() {
    let (engine, mut rx, store) = scripted_engine(100);

    let mut records = numbered(4);
    records.insert(2, incomplete_record("broken"));
    store.push_paged(records, 100);

    assert_ok!(engine.fetch().await);

    assert_eq!(engine.len().await, 4);
    assert_eq!(
        drain(&mut rx),
        vec![EngineEvent::Fetched {
            count: 4,
            dropped: 1
        }]
    );
}

#[tokio::test]
async fn repeated_ids_are_kept_once() {
    let (engine, _rx, store) = scripted_engine(2);

    store.push_paged(
        vec![
            contact_record("same", "Ada", "Lovelace"),
            contact_record("other", "Bob", "Ardis"),
            contact_record("same", "Ada", "Lovelace"),
        ],
        2,
    );

    assert_ok!(engine.fetch().await);
    assert_eq!(names(&engine).await, vec!["Bob Ardis", "Ada Lovelace"]);
}

#[tokio::test]
async fn failing_page_leaves_collection_untouched() {
    let (engine, _rx, store) = scripted_engine(2);

    store.push_paged(numbered(2), 2);
    assert_ok!(engine.fetch().await);
    let before = engine.contacts().await;

    // First page succeeds, second fails
    store.push_page(contacts_core::traits::QueryPage::more(
        numbered(2),
        contacts_core::traits::QueryCursor::new("next"),
    ));
    store.push_failure("zone busy");

    let err = assert_err!(engine.fetch().await);
    assert!(matches!(
        err,
        ContactError::Remote {
            kind: TransactionKind::Fetch,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "Error fetching contact. Store error (scripted): zone busy."
    );

    let after = engine.contacts().await;
    assert_eq!(after.len(), before.len());
    assert!(after.iter().zip(&before).all(|(a, b)| a.id() == b.id()));
}

#[tokio::test]
async fn fetch_is_idempotent() {
    let (engine, _rx, store) = scripted_engine(100);

    store.push_paged(numbered(5), 100);
    store.push_paged(numbered(5), 100);

    assert_ok!(engine.fetch().await);
    let first = engine.contacts().await;
    assert_ok!(engine.fetch().await);
    let second = engine.contacts().await;

    assert_eq!(first.len(), 5);
    assert_eq!(
        first.iter().map(|c| c.id().clone()).collect::<Vec<_>>(),
        second.iter().map(|c| c.id().clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn repeated_cursor_fails_fetch_and_keeps_collection() {
    let (engine, _rx, store) = scripted_engine(1);

    store.push_paged(numbered(1), 1);
    assert_ok!(engine.fetch().await);
    let before = engine.contacts().await;

    // A store stuck on one cursor: without the guard this would page forever
    for _ in 0..10 {
        store.push_page(contacts_core::traits::QueryPage::more(
            vec![contact_record("a", "Ada", "Lovelace")],
            contacts_core::traits::QueryCursor::new("same"),
        ));
    }
    let calls_before = store.query_calls();

    let err = assert_err!(engine.fetch().await);
    match &err {
        ContactError::Remote {
            kind: TransactionKind::Fetch,
            source: contacts_core::Error::InvalidResponse(message),
        } => assert!(message.contains("cursor did not advance")),
        other => panic!("expected a fetch failure on the stuck cursor, got {:?}", other),
    }

    // First page hands out the cursor, the second repeats it
    assert_eq!(store.query_calls() - calls_before, 2);

    let after = engine.contacts().await;
    assert_eq!(after.len(), before.len());
    assert_eq!(after[0].id(), before[0].id());
}
