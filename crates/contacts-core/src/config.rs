//! Configuration types for the contacts system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactsConfig {
    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ContactsConfig {
    /// Create a new configuration with defaults
    pub fn new(store: StoreConfig) -> Self {
        Self {
            store,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// File-based store
    File {
        /// Path to the store file
        path: String,
    },

    /// HTTP/JSON record store web service
    Http {
        /// Base URL of the database (e.g. `https://records.example.com/db/private`)
        url: String,
        /// API token
        api_token: String,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Http {
                url,
                api_token,
                timeout_secs,
            } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP store URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "HTTP store URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if api_token.is_empty() {
                    return Err(crate::Error::config("HTTP store API token cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP store timeout must be > 0"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Http { .. } => "http",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of records requested per query page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.page_size == 0 {
            return Err(crate::Error::config("Page size must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Set the query page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_page_size() -> usize {
    100
}

fn default_event_channel_capacity() -> usize {
    1000
}
