// # contacts-core
//
// Core library for keeping a local, ordered contact list in sync with a
// remote record store.
//
// ## Architecture Overview
//
// - **Contact / RecordId**: The domain value and its stable identity
// - **record**: Codec between contacts and generic remote records
// - **RecordStore**: Trait for the remote record store (save, query, modify)
// - **RemoteStoreAdapter**: Paged query, single save and batch modify on top
//   of a RecordStore
// - **ContactEngine**: Owns the sorted local collection and writes through
//   to the store before mutating it
// - **StoreRegistry**: Plugin-based registry of store factories
//
// ## Design Principles
//
// 1. **Write-through**: The remote store is the source of truth; the local
//    list only changes after the store has confirmed
// 2. **Plugin-Based**: Stores are registered by name, no hard-coded if-else
// 3. **Library-First**: Hosts (CLI, UI) only call the engine

pub mod adapter;
pub mod config;
pub mod contact;
pub mod engine;
pub mod error;
pub mod record;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use adapter::RemoteStoreAdapter;
pub use config::{ContactsConfig, EngineConfig, StoreConfig};
pub use contact::{Contact, ContactFields, RecordId};
pub use engine::{ContactEngine, EngineEvent};
pub use error::{BatchShape, ContactError, ContactResult, Error, ModifyError, Result, TransactionKind};
pub use record::RemoteRecord;
pub use registry::StoreRegistry;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{RecordStore, RecordStoreFactory};
