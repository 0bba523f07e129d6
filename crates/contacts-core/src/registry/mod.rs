//! Plugin-based store registry
//!
//! The registry maps store type names to factories so that the host can turn
//! a [`StoreConfig`] into a live [`RecordStore`] without hardcoded if-else
//! chains.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use contacts_core::registry::StoreRegistry;
//! use contacts_core::config::StoreConfig;
//!
//! # async fn run() -> contacts_core::Result<()> {
//! let registry = StoreRegistry::with_builtin_stores();
//!
//! let config = StoreConfig::File { path: "contacts.json".to_string() };
//! let store = registry.create_store(&config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Registration
//!
//! Store crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In contacts-store-http
//! pub fn register(registry: &StoreRegistry) -> contacts_core::Result<()> {
//!     registry.register_store("http", Box::new(HttpRecordStoreFactory))
//! }
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of record store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. The lock is never held across an await.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` stores registered
    pub fn with_builtin_stores() -> Self {
        let mut stores: HashMap<String, Arc<dyn RecordStoreFactory>> = HashMap::new();
        stores.insert("memory".to_string(), Arc::new(MemoryRecordStoreFactory));
        stores.insert("file".to_string(), Arc::new(FileRecordStoreFactory));

        Self {
            stores: RwLock::new(stores),
        }
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "http"); a later registration
    ///   under the same name replaces the earlier one
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) -> Result<()> {
        let name = name.into();
        let mut stores = self
            .stores
            .write()
            .map_err(|_| Error::Other("store registry lock poisoned".to_string()))?;

        tracing::debug!("Registering record store '{}'", name);
        stores.insert(name, Arc::from(factory));
        Ok(())
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the configuration is invalid, the store type is not
    ///   registered, or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        config.validate()?;

        let store_type = config.type_name();
        let factory = {
            let stores = self
                .stores
                .read()
                .map_err(|_| Error::Other("store registry lock poisoned".to_string()))?;

            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// List all registered store types, sorted by name
    pub fn list_stores(&self) -> Vec<String> {
        let Ok(stores) = self.stores.read() else {
            return Vec::new();
        };
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores
            .read()
            .map(|stores| stores.contains_key(name))
            .unwrap_or(false)
    }
}
