//! Test doubles and common utilities for engine contract tests
//!
//! The scripted store answers queries from a queue of pre-built pages and
//! records every call, so tests can assert exactly what reached the store.

#![allow(dead_code)]

use async_trait::async_trait;
use contacts_core::config::EngineConfig;
use contacts_core::error::{Error, Result};
use contacts_core::record::{RECORD_TYPE, RemoteRecord, to_record};
use contacts_core::traits::{QueryCursor, QueryPage, QueryRequest, RecordStore};
use contacts_core::{Contact, ContactEngine, ContactFields, EngineEvent, RecordId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

/// One scripted answer to a query call
pub enum ScriptedPage {
    Page(QueryPage),
    Fail(String),
}

#[derive(Default)]
struct Script {
    pages: Mutex<VecDeque<ScriptedPage>>,
    save_failure: Mutex<Option<String>>,
    modify_failure: Mutex<Option<String>>,
    malformed_echo: AtomicBool,
    modify_gate: Mutex<Option<Arc<Notify>>>,
    save_calls: AtomicUsize,
    query_calls: AtomicUsize,
    modify_calls: AtomicUsize,
    query_log: Mutex<Vec<QueryRequest>>,
    modify_log: Mutex<Vec<(Vec<RemoteRecord>, Vec<RecordId>)>>,
}

/// A RecordStore whose answers are scripted by the test
///
/// Clones share the same script and counters.
#[derive(Clone, Default)]
pub struct ScriptedRecordStore {
    script: Arc<Script>,
}

impl ScriptedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful page
    pub fn push_page(&self, page: QueryPage) {
        self.script
            .pages
            .lock()
            .unwrap()
            .push_back(ScriptedPage::Page(page));
    }

    /// Queue a failing page
    pub fn push_failure(&self, message: &str) {
        self.script
            .pages
            .lock()
            .unwrap()
            .push_back(ScriptedPage::Fail(message.to_string()));
    }

    /// Queue `records` split into pages of `page_size`, chained by cursors
    pub fn push_paged(&self, records: Vec<RemoteRecord>, page_size: usize) {
        let chunks: Vec<Vec<RemoteRecord>> =
            records.chunks(page_size).map(|chunk| chunk.to_vec()).collect();
        let total = chunks.len();

        if total == 0 {
            self.push_page(QueryPage::last(Vec::new()));
            return;
        }

        for (index, chunk) in chunks.into_iter().enumerate() {
            if index + 1 == total {
                self.push_page(QueryPage::last(chunk));
            } else {
                self.push_page(QueryPage::more(
                    chunk,
                    QueryCursor::new(format!("page-{}", index + 1)),
                ));
            }
        }
    }

    /// Make every following save fail with `message`
    pub fn fail_saves(&self, message: &str) {
        *self.script.save_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make every following modify fail with `message`
    pub fn fail_modifies(&self, message: &str) {
        *self.script.modify_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make save echo a record missing its email field
    pub fn echo_malformed(&self) {
        self.script.malformed_echo.store(true, Ordering::SeqCst);
    }

    /// Hold every following modify until the returned gate is notified
    pub fn hold_modifies(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.script.modify_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn save_calls(&self) -> usize {
        self.script.save_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.script.query_calls.load(Ordering::SeqCst)
    }

    pub fn modify_calls(&self) -> usize {
        self.script.modify_calls.load(Ordering::SeqCst)
    }

    /// Every query request received, in order
    pub fn queries(&self) -> Vec<QueryRequest> {
        self.script.query_log.lock().unwrap().clone()
    }

    /// Every modify batch received, in order
    pub fn modifies(&self) -> Vec<(Vec<RemoteRecord>, Vec<RecordId>)> {
        self.script.modify_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for ScriptedRecordStore {
    async fn save(&self, record: RemoteRecord) -> Result<RemoteRecord> {
        self.script.save_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.script.save_failure.lock().unwrap().clone() {
            return Err(Error::backend("scripted", message));
        }

        if self.script.malformed_echo.load(Ordering::SeqCst) {
            let mut echo = record;
            echo.fields.remove("email");
            return Ok(echo);
        }

        Ok(record)
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        self.script.query_calls.fetch_add(1, Ordering::SeqCst);
        self.script.query_log.lock().unwrap().push(request.clone());

        let next = self.script.pages.lock().unwrap().pop_front();
        match next {
            Some(ScriptedPage::Page(page)) => Ok(page),
            Some(ScriptedPage::Fail(message)) => Err(Error::backend("scripted", message)),
            None => Ok(QueryPage::last(Vec::new())),
        }
    }

    async fn modify(&self, saves: Vec<RemoteRecord>, deletes: Vec<RecordId>) -> Result<()> {
        self.script.modify_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .modify_log
            .lock()
            .unwrap()
            .push((saves, deletes));

        let gate = self.script.modify_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(message) = self.script.modify_failure.lock().unwrap().clone() {
            return Err(Error::backend("scripted", message));
        }

        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "scripted"
    }
}

/// Build an engine over a scripted store, keeping a handle to the store
pub fn scripted_engine(
    page_size: usize,
) -> (ContactEngine, mpsc::Receiver<EngineEvent>, ScriptedRecordStore) {
    let store = ScriptedRecordStore::new();
    let config = EngineConfig::default().with_page_size(page_size);
    let (engine, rx) =
        ContactEngine::new(Box::new(store.clone()), config).expect("engine construction succeeds");
    (engine, rx, store)
}

/// Encode a contact with a fixed identity
pub fn contact_record(id: &str, first: &str, last: &str) -> RemoteRecord {
    to_record(&Contact::with_id(
        RecordId::from_name(id),
        ContactFields::new(first, last, "", ""),
    ))
}

/// A contact-type record missing the phone field
pub fn incomplete_record(id: &str) -> RemoteRecord {
    RemoteRecord::new(RECORD_TYPE, RecordId::from_name(id))
        .with_field("firstName", "Broken")
        .with_field("lastName", "Record")
        .with_field("email", "")
}

/// Names of the collection in display order, as "First Last"
pub async fn names(engine: &ContactEngine) -> Vec<String> {
    engine
        .contacts()
        .await
        .iter()
        .map(|c| format!("{} {}", c.first_name(), c.last_name()))
        .collect()
}

/// Drain every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
