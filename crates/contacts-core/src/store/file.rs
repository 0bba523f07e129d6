// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Keeps the record collection in a single JSON file, so a host can run
// against a local collection that survives restarts.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "3F2504E0-4F89-41D3-9A0C-0305E82C3301": {
//       "recordType": "Contact",
//       "recordName": "3F2504E0-4F89-41D3-9A0C-0305E82C3301",
//       "fields": { "firstName": "Ada", "lastName": "Lovelace", "phone": "", "email": "" },
//       "modifiedAt": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::contact::RecordId;
use crate::record::RemoteRecord;
use crate::traits::{QueryPage, QueryRequest, RecordStore, RecordStoreFactory};
use crate::Error;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based record store with crash recovery
///
/// Every successful write is persisted before the call returns; a failed
/// write leaves both the file and the in-memory view unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use contacts_core::store::FileRecordStore;
/// use contacts_core::traits::RecordStore;
/// use contacts_core::record::{RemoteRecord, RECORD_TYPE};
/// use contacts_core::RecordId;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/contacts/records.json").await?;
///     store.save(RemoteRecord::new(RECORD_TYPE, RecordId::new())).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    records: Arc<RwLock<BTreeMap<RecordId, RemoteRecord>>>,
}

/// Serializable store file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    records: BTreeMap<RecordId, RemoteRecord>,
}

impl FileRecordStore {
    /// Create or load a file record store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If it is corrupted, try to load from backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Load records with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<RecordId, RemoteRecord>, Error> {
        match Self::load(path).await {
            Ok(records) => {
                tracing::debug!("Loaded record store: {} records", records.len());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Record store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with an empty store.");
                    return Ok(BTreeMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered record store from backup: {} records", records.len());

                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with an empty store.",
                            backup_err
                        );
                        Ok(BTreeMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load records from a file
    ///
    /// Parse failures surface as `Error::Json` so the caller can tell
    /// corruption apart from I/O trouble.
    async fn load(path: &Path) -> Result<BTreeMap<RecordId, RemoteRecord>, Error> {
        if !path.exists() {
            tracing::debug!("Record store file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.records)
    }

    /// Write records to the file atomically
    async fn write(&self, records: &BTreeMap<RecordId, RemoteRecord>) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            records: records.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize records: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Record store written: {}", self.path.display());
        Ok(())
    }

    /// Apply a change to a copy of the records, persist it, then publish it
    async fn commit<F>(&self, change: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BTreeMap<RecordId, RemoteRecord>) -> Result<(), Error> + Send,
    {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        change(&mut next)?;
        self.write(&next).await?;
        *guard = next;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn save(&self, mut record: RemoteRecord) -> Result<RemoteRecord, Error> {
        record.modified_at = Some(Utc::now());
        let echo = record.clone();

        self.commit(move |records| {
            records.insert(record.id.clone(), record);
            Ok(())
        })
        .await?;

        Ok(echo)
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, Error> {
        let guard = self.records.read().await;
        super::page_of(&guard, request)
    }

    async fn modify(&self, saves: Vec<RemoteRecord>, deletes: Vec<RecordId>) -> Result<(), Error> {
        self.commit(move |records| super::apply_batch(records, saves, deletes))
            .await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for `StoreConfig::File`
#[derive(Debug, Default)]
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileRecordStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
