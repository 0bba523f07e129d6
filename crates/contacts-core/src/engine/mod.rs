//! Contact synchronization engine
//!
//! The ContactEngine is responsible for:
//! - Owning the ordered, in-memory mirror of the remote contact collection
//! - Writing through to the record store before touching the mirror
//! - Keeping the mirror sorted by [`Contact::sort_key`]
//! - Mapping store failures into [`ContactError`]
//! - Holding the process-wide "remote store available" flag
//!
//! ## Architecture
//!
//! ```text
//!   caller ── create / fetch / update / delete ──┐
//!                                                ▼
//!                                      ┌──────────────────┐
//!                                      │  ContactEngine   │── EngineEvent ──▶ observers
//!                                      └──────────────────┘
//!                                                │
//!                                                ▼
//!                                   ┌──────────────────────┐
//!                                   │  RemoteStoreAdapter  │
//!                                   └──────────────────────┘
//!                                                │
//!                                                ▼
//!                                      ┌──────────────────┐
//!                                      │   RecordStore    │
//!                                      └──────────────────┘
//! ```
//!
//! ## Write-through
//!
//! Every operation completes its remote call first and only then mutates the
//! local collection. A failed remote call never changes the collection.
//!
//! ## Locking
//!
//! The collection lives behind a mutex that is held only while it is read or
//! mutated, never across a remote call. Each mutation is therefore atomic with
//! respect to every other, and delete re-resolves its target by identity once
//! the store has answered.

use std::collections::HashSet;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, trace, warn};

use crate::adapter::RemoteStoreAdapter;
use crate::config::EngineConfig;
use crate::contact::{Contact, ContactFields, RecordId, sort_contacts};
use crate::error::{ContactError, ContactResult, Result, TransactionKind};
use crate::record::{from_record, to_record};
use crate::traits::RecordStore;

/// Events emitted by the ContactEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The collection was replaced by a fetch
    Fetched {
        /// Contacts now in the collection
        count: usize,
        /// Records skipped because they could not be decoded (or repeated an id)
        dropped: usize,
    },

    /// A contact was created
    Created { id: RecordId },

    /// A contact was updated
    Updated { id: RecordId },

    /// A contact was deleted
    Deleted { id: RecordId },

    /// An operation failed
    OperationFailed {
        kind: Option<TransactionKind>,
        error: String,
    },

    /// The remote-availability flag changed
    AvailabilityChanged { available: bool },
}

/// Contact synchronization engine
///
/// One engine mirrors one remote collection. Share it between tasks with an
/// `Arc`; every operation takes `&self`.
///
/// ## Lifecycle
///
/// 1. Create with [`ContactEngine::new()`], injecting the record store
/// 2. Report availability with [`ContactEngine::set_available()`] (or
///    [`ContactEngine::check_account()`])
/// 3. Populate with [`ContactEngine::fetch()`]
/// 4. Drop to release the store
///
/// The engine never consults the availability flag itself; gating
/// operations on it is the caller's job.
pub struct ContactEngine {
    /// Store primitives
    adapter: RemoteStoreAdapter,

    /// Ordered local mirror
    contacts: Mutex<Vec<Contact>>,

    /// Whether the remote store is currently reachable
    availability: watch::Sender<bool>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ContactEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `store`: Record store implementation
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        store: Box<dyn RecordStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (availability, _) = watch::channel(false);

        let engine = Self {
            adapter: RemoteStoreAdapter::new(store, config.page_size),
            contacts: Mutex::new(Vec::new()),
            availability,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Create a contact and save it to the store
    ///
    /// The contact gets a fresh identity. It is added to the collection only
    /// after the store has accepted it, using the record the store echoed.
    ///
    /// # Errors
    ///
    /// - [`ContactError::Remote`] (`save`): The store rejected the record
    /// - [`ContactError::Construction`]: The echoed record could not be decoded
    pub async fn create(&self, fields: ContactFields) -> ContactResult<()> {
        let contact = Contact::new(fields);
        debug!("Creating contact {}", contact.id());

        let echo = match self.adapter.save_one(to_record(&contact)).await {
            Ok(echo) => echo,
            Err(source) => return Err(self.fail(ContactError::remote(TransactionKind::Save, source))),
        };

        let Some(saved) = from_record(&echo) else {
            return Err(self.fail(ContactError::Construction));
        };
        let id = saved.id().clone();

        {
            let mut contacts = self.contacts.lock().await;
            match contacts.iter_mut().find(|c| c.id() == &id) {
                Some(existing) => *existing = saved,
                None => contacts.push(saved),
            }
            sort_contacts(&mut contacts);
        }

        info!("Created contact {}", id);
        self.emit_event(EngineEvent::Created { id });
        Ok(())
    }

    /// Replace the collection with every contact in the store
    ///
    /// Records that cannot be decoded are skipped. If any page of the query
    /// fails, the collection is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`ContactError::Remote`] (`fetch`): A query page failed
    pub async fn fetch(&self) -> ContactResult<()> {
        debug!("Fetching contacts from {}", self.adapter.store_name());

        let records = match self.adapter.query_all().await {
            Ok(records) => records,
            Err(source) => {
                return Err(self.fail(ContactError::remote(TransactionKind::Fetch, source)));
            }
        };

        let total = records.len();
        let mut seen = HashSet::with_capacity(total);
        let mut fetched: Vec<Contact> = records
            .iter()
            .filter_map(from_record)
            .filter(|contact| seen.insert(contact.id().clone()))
            .collect();
        sort_contacts(&mut fetched);

        let count = fetched.len();
        let dropped = total - count;
        if dropped > 0 {
            warn!("Skipped {} of {} fetched record(s): undecodable or repeated id", dropped, total);
        }

        *self.contacts.lock().await = fetched;

        info!("Fetched {} contact(s)", count);
        self.emit_event(EngineEvent::Fetched { count, dropped });
        Ok(())
    }

    /// Overwrite the fields of an existing contact
    ///
    /// # Errors
    ///
    /// - [`ContactError::Remote`] (`update`): The store rejected the batch
    /// - [`ContactError::Consistency`] (`update`): The store accepted the
    ///   change but the contact is no longer in the local collection
    pub async fn update(&self, existing: &Contact, fields: ContactFields) -> ContactResult<()> {
        let id = existing.id().clone();
        debug!("Updating contact {}", id);

        let replacement = Contact::with_id(id.clone(), fields.clone());
        if let Err(err) = self
            .adapter
            .modify_batch(Some(vec![to_record(&replacement)]), None)
            .await
        {
            return Err(self.fail(ContactError::from_modify(
                TransactionKind::Update,
                err,
            )));
        }

        let applied = {
            let mut contacts = self.contacts.lock().await;
            match contacts.iter_mut().find(|c| c.id() == &id) {
                Some(entry) => {
                    entry.set_fields(fields);
                    sort_contacts(&mut contacts);
                    true
                }
                None => false,
            }
        };

        if !applied {
            return Err(self.fail(ContactError::Consistency {
                kind: TransactionKind::Update,
            }));
        }

        info!("Updated contact {}", id);
        self.emit_event(EngineEvent::Updated { id });
        Ok(())
    }

    /// Delete the contact at `index` in the current ordering
    ///
    /// The index is resolved to an identity before the store is called; the
    /// entry removed afterwards is found by that identity, wherever it has
    /// moved in the meantime.
    ///
    /// # Errors
    ///
    /// - [`ContactError::InvalidIndex`]: No contact at `index`
    /// - [`ContactError::Remote`] (`delete`): The store rejected the batch
    /// - [`ContactError::Consistency`] (`delete`): The store deleted the
    ///   record but it had already left the local collection
    pub async fn delete(&self, index: usize) -> ContactResult<()> {
        let resolved = {
            let contacts = self.contacts.lock().await;
            contacts
                .get(index)
                .map(|contact| contact.id().clone())
                .ok_or(contacts.len())
        };
        let id = match resolved {
            Ok(id) => id,
            Err(len) => return Err(self.fail(ContactError::InvalidIndex { index, len })),
        };
        debug!("Deleting contact {} (position {})", id, index);

        if let Err(err) = self
            .adapter
            .modify_batch(None, Some(vec![id.clone()]))
            .await
        {
            return Err(self.fail(ContactError::from_modify(
                TransactionKind::Delete,
                err,
            )));
        }

        let removed = {
            let mut contacts = self.contacts.lock().await;
            contacts
                .iter()
                .position(|c| c.id() == &id)
                .map(|position| contacts.remove(position))
        };

        if removed.is_none() {
            return Err(self.fail(ContactError::Consistency {
                kind: TransactionKind::Delete,
            }));
        }

        info!("Deleted contact {}", id);
        self.emit_event(EngineEvent::Deleted { id });
        Ok(())
    }

    /// Snapshot of the collection in display order
    pub async fn contacts(&self) -> Vec<Contact> {
        self.contacts.lock().await.clone()
    }

    /// The contact at `index`, if any
    pub async fn contact_at(&self, index: usize) -> Option<Contact> {
        self.contacts.lock().await.get(index).cloned()
    }

    /// Find a contact by identity
    pub async fn find(&self, id: &RecordId) -> Option<Contact> {
        self.contacts
            .lock()
            .await
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Number of contacts in the collection
    pub async fn len(&self) -> usize {
        self.contacts.lock().await.len()
    }

    /// Whether the collection is empty
    pub async fn is_empty(&self) -> bool {
        self.contacts.lock().await.is_empty()
    }

    /// Whether the remote store is currently reported as available
    pub fn is_available(&self) -> bool {
        *self.availability.borrow()
    }

    /// Record the remote store's availability
    ///
    /// Subscribers are notified only when the value actually changes.
    pub fn set_available(&self, available: bool) {
        let changed = self.availability.send_if_modified(|current| {
            if *current == available {
                false
            } else {
                *current = available;
                true
            }
        });

        if changed {
            info!("Remote store availability changed: {}", available);
            self.emit_event(EngineEvent::AvailabilityChanged { available });
        }
    }

    /// Subscribe to the availability flag
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability.subscribe()
    }

    /// Stream of availability changes (the current value is not repeated)
    pub fn availability_changes(&self) -> WatchStream<bool> {
        WatchStream::from_changes(self.availability.subscribe())
    }

    /// Ask the store whether its account is usable and record the answer
    ///
    /// This is a single check; scheduling repeated checks is up to the host.
    /// On error the flag is left unchanged.
    pub async fn check_account(&self) -> Result<bool> {
        let available = self.adapter.account_available().await?;
        self.set_available(available);
        Ok(available)
    }

    /// Log a failure, publish it, and hand it back
    fn fail(&self, error: ContactError) -> ContactError {
        warn!("{}", error);
        self.emit_event(EngineEvent::OperationFailed {
            kind: error.kind(),
            error: error.to_string(),
        });
        error
    }

    /// Emit an engine event
    ///
    /// The channel is bounded; when it is full the event is dropped.
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, event discarded");
            }
        }
    }
}
