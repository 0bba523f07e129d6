//! Error types for the contacts system
//!
//! Two layers live here:
//!
//! - [`Error`]: infrastructure failures raised by record stores, configuration
//!   and transport code.
//! - [`ContactError`]: the taxonomy the engine hands to callers. Every store
//!   failure reaching a caller is wrapped with the [`TransactionKind`] that was
//!   being attempted.

use std::fmt;
use thiserror::Error;

/// Result type alias for store and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for engine operations
pub type ContactResult<T> = std::result::Result<T, ContactError>;

/// Infrastructure error raised below the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Record store-related errors
    #[error("Record store error: {0}")]
    Store(String),

    /// The account backing the store is not available (signed out, restricted)
    #[error("Account unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store answered with something we cannot interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Store-specific error
    #[error("Store error ({store}): {message}")]
    Backend {
        /// Store name
        store: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an account-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a store-specific error
    pub fn backend(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            store: store.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// The remote operation an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Paginated query of the whole collection
    Fetch,
    /// Single-record save (create)
    Save,
    /// Batch modify carrying a replacement record
    Update,
    /// Batch modify carrying a record id to delete
    Delete,
}

impl TransactionKind {
    /// The action in gerund form, as used in user-facing messages
    pub fn gerund(&self) -> &'static str {
        match self {
            TransactionKind::Fetch => "fetching",
            TransactionKind::Save => "saving",
            TransactionKind::Update => "updating",
            TransactionKind::Delete => "deleting",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Fetch => "fetch",
            TransactionKind::Save => "save",
            TransactionKind::Update => "update",
            TransactionKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Why a batch modify was rejected before reaching the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchShape {
    /// Neither records to save nor ids to delete were supplied
    Empty,
    /// Both records to save and ids to delete were supplied
    Mixed,
}

impl fmt::Display for BatchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchShape::Empty => f.write_str("nothing to save or delete"),
            BatchShape::Mixed => f.write_str("cannot save and delete in the same batch"),
        }
    }
}

/// Failure of a batch modify issued through the adapter
#[derive(Error, Debug)]
pub enum ModifyError {
    /// The batch was malformed; nothing was sent
    #[error("Error setting up batch modify: {0}.")]
    Setup(BatchShape),

    /// The store rejected the batch
    #[error("{}", failure_message(.kind, .source))]
    Remote {
        /// What the batch was meant to do
        kind: TransactionKind,
        /// The underlying store failure
        #[source]
        source: Error,
    },
}

/// Errors reported by the sync engine to its callers
#[derive(Error, Debug)]
pub enum ContactError {
    /// A store operation failed
    #[error("{}", failure_message(.kind, .source))]
    Remote {
        /// The operation that was attempted
        kind: TransactionKind,
        /// The underlying store failure
        #[source]
        source: Error,
    },

    /// A batch modify was malformed; caller bug, never from the network
    #[error("Error {} contact. Batch setup failed: {}.", .kind.gerund(), .shape)]
    Setup {
        /// The operation the batch was built for
        kind: TransactionKind,
        /// What was wrong with the batch
        shape: BatchShape,
    },

    /// A record echoed back by the store could not be decoded into a contact
    #[error("Error creating a contact.")]
    Construction,

    /// The remote write succeeded but the local entry was missing
    #[error("Error {} contact: the local list is out of sync with the store.", .kind.gerund())]
    Consistency {
        /// The operation whose local half could not be applied
        kind: TransactionKind,
    },

    /// A position outside the current collection was supplied
    #[error("Error deleting contact: no contact at position {index} (have {len}).")]
    InvalidIndex {
        /// Requested position
        index: usize,
        /// Collection length at the time of the call
        len: usize,
    },
}

impl ContactError {
    /// Wrap a store failure with the attempted operation
    pub fn remote(kind: TransactionKind, source: Error) -> Self {
        Self::Remote { kind, source }
    }

    /// The operation this error is attributed to, if any
    pub fn kind(&self) -> Option<TransactionKind> {
        match self {
            ContactError::Remote { kind, .. }
            | ContactError::Setup { kind, .. }
            | ContactError::Consistency { kind } => Some(*kind),
            ContactError::Construction => Some(TransactionKind::Save),
            ContactError::InvalidIndex { .. } => Some(TransactionKind::Delete),
        }
    }

    /// Whether the local list should be re-fetched to recover
    pub fn needs_refetch(&self) -> bool {
        matches!(self, ContactError::Consistency { .. })
    }
}

impl ContactError {
    /// Attribute a batch failure to the operation that built the batch
    ///
    /// A remote failure keeps the kind the adapter inferred; a rejected batch
    /// takes `intended`, since the adapter cannot tell what it was meant for.
    pub fn from_modify(intended: TransactionKind, err: ModifyError) -> Self {
        match err {
            ModifyError::Setup(shape) => ContactError::Setup {
                kind: intended,
                shape,
            },
            ModifyError::Remote { kind, source } => ContactError::Remote { kind, source },
        }
    }
}

/// "Error <gerund> contact. <cause>." with the trailing period guaranteed
fn failure_message(kind: &TransactionKind, cause: &Error) -> String {
    let mut message = format!("Error {} contact. {}", kind.gerund(), cause);
    if !message.ends_with('.') {
        message.push('.');
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gerunds() {
        assert_eq!(TransactionKind::Fetch.gerund(), "fetching");
        assert_eq!(TransactionKind::Save.gerund(), "saving");
        assert_eq!(TransactionKind::Update.gerund(), "updating");
        assert_eq!(TransactionKind::Delete.gerund(), "deleting");
        assert_eq!(TransactionKind::Update.to_string(), "update");
    }

    #[test]
    fn test_remote_message_ends_with_period() {
        let err = ContactError::remote(TransactionKind::Fetch, Error::http("connection reset"));
        assert_eq!(
            err.to_string(),
            "Error fetching contact. HTTP error: connection reset."
        );

        let err = ContactError::remote(TransactionKind::Save, Error::Other("quota exceeded.".into()));
        assert_eq!(err.to_string(), "Error saving contact. quota exceeded.");
    }

    #[test]
    fn test_every_message_ends_with_period() {
        let errors = vec![
            ContactError::remote(TransactionKind::Delete, Error::not_found("abc")),
            ContactError::Setup {
                kind: TransactionKind::Update,
                shape: BatchShape::Empty,
            },
            ContactError::Setup {
                kind: TransactionKind::Delete,
                shape: BatchShape::Mixed,
            },
            ContactError::Construction,
            ContactError::Consistency {
                kind: TransactionKind::Update,
            },
            ContactError::InvalidIndex { index: 4, len: 2 },
        ];

        for err in errors {
            assert!(err.to_string().ends_with('.'), "{}", err);
        }
    }

    #[test]
    fn test_modify_error_conversion_keeps_kind() {
        let err = ContactError::from_modify(
            TransactionKind::Update,
            ModifyError::Remote {
                kind: TransactionKind::Delete,
                source: Error::rate_limited("slow down"),
            },
        );

        assert_eq!(err.kind(), Some(TransactionKind::Delete));
        assert!(err.to_string().starts_with("Error deleting contact."));
    }

    #[test]
    fn test_setup_error_takes_intended_kind() {
        let err = ContactError::from_modify(
            TransactionKind::Update,
            ModifyError::Setup(BatchShape::Empty),
        );

        assert!(matches!(
            err,
            ContactError::Setup {
                kind: TransactionKind::Update,
                shape: BatchShape::Empty
            }
        ));
        assert_eq!(err.kind(), Some(TransactionKind::Update));
        assert_eq!(
            err.to_string(),
            "Error updating contact. Batch setup failed: nothing to save or delete."
        );
    }

    #[test]
    fn test_consistency_requests_refetch() {
        let err = ContactError::Consistency {
            kind: TransactionKind::Delete,
        };
        assert!(err.needs_refetch());
        assert!(err.to_string().starts_with("Error deleting contact"));
        assert!(!ContactError::Construction.needs_refetch());
    }
}
