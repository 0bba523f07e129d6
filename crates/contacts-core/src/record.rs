//! Remote records and the contact codec
//!
//! A [`RemoteRecord`] is the untyped shape the store understands: a record
//! type, an identity and a bag of named fields. [`to_record`] and
//! [`from_record`] translate between it and [`Contact`]. Decoding is the only
//! place field presence is checked.

use crate::contact::{Contact, ContactFields, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Record type name used for contacts in the store
pub const RECORD_TYPE: &str = "Contact";

pub const FIRST_NAME_KEY: &str = "firstName";
pub const LAST_NAME_KEY: &str = "lastName";
pub const PHONE_KEY: &str = "phone";
pub const EMAIL_KEY: &str = "email";

/// An untyped record as stored remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Record type name (`"Contact"` for everything this crate writes)
    pub record_type: String,
    /// Record identity
    #[serde(rename = "recordName")]
    pub id: RecordId,
    /// Named field values
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Last modification time, stamped by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// Create an empty record of the given type
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            fields: Map::new(),
            modified_at: None,
        }
    }

    /// Set a field, returning the record for chaining
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// A field's value if it is present and a string
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Encode a contact as a remote record
pub fn to_record(contact: &Contact) -> RemoteRecord {
    RemoteRecord::new(RECORD_TYPE, contact.id().clone())
        .with_field(FIRST_NAME_KEY, contact.first_name())
        .with_field(LAST_NAME_KEY, contact.last_name())
        .with_field(PHONE_KEY, contact.phone())
        .with_field(EMAIL_KEY, contact.email())
}

/// Decode a remote record into a contact
///
/// Returns `None` if any of the four contact fields is missing or is not a
/// string.
pub fn from_record(record: &RemoteRecord) -> Option<Contact> {
    let fields = ContactFields {
        first_name: record.string_field(FIRST_NAME_KEY)?.to_string(),
        last_name: record.string_field(LAST_NAME_KEY)?.to_string(),
        phone: record.string_field(PHONE_KEY)?.to_string(),
        email: record.string_field(EMAIL_KEY)?.to_string(),
    };

    Some(Contact::with_id(record.id.clone(), fields))
}
