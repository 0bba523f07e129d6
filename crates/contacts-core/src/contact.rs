//! The contact entity
//!
//! A [`Contact`] is four free-form strings plus an immutable [`RecordId`].
//! The id is the only thing compared by `==`; two contacts with the same
//! name but different ids are different contacts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque, globally unique identity of a contact record
///
/// Assigned by the caller for new contacts (a fresh UUID v4) or taken from a
/// record loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string().to_uppercase())
    }

    /// Wrap an identity issued elsewhere (usually by the store)
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The editable part of a contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
}

impl ContactFields {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: phone.into(),
            email: email.into(),
        }
    }
}

/// An address-book entry
#[derive(Debug, Clone)]
pub struct Contact {
    id: RecordId,
    fields: ContactFields,
}

impl Contact {
    /// Create a contact with a freshly generated identity
    pub fn new(fields: ContactFields) -> Self {
        Self::with_id(RecordId::new(), fields)
    }

    /// Create a contact carrying an existing identity
    pub fn with_id(id: RecordId, fields: ContactFields) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn fields(&self) -> &ContactFields {
        &self.fields
    }

    pub fn first_name(&self) -> &str {
        &self.fields.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.fields.last_name
    }

    pub fn phone(&self) -> &str {
        &self.fields.phone
    }

    pub fn email(&self) -> &str {
        &self.fields.email
    }

    /// Name as shown in a list: `"Last, First"`, or whichever half is present
    pub fn display_name(&self) -> String {
        let mut name = self.fields.last_name.clone();
        if !self.fields.first_name.is_empty() {
            if !name.is_empty() {
                name.push_str(", ");
            }
            name.push_str(&self.fields.first_name);
        }
        name
    }

    /// Ordering key: last name immediately followed by first name
    ///
    /// This is a plain concatenation, not a `(last, first)` tuple comparison:
    /// last/first `("Ax", "")` and `("A", "x")` tie, and `("Ab", "a")` sorts
    /// before `("A", "z")`.
    pub fn sort_key(&self) -> String {
        let mut key =
            String::with_capacity(self.fields.last_name.len() + self.fields.first_name.len());
        key.push_str(&self.fields.last_name);
        key.push_str(&self.fields.first_name);
        key
    }

    /// Replace the editable fields; the identity is untouched
    pub(crate) fn set_fields(&mut self, fields: ContactFields) {
        self.fields = fields;
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Sort contacts by [`Contact::sort_key`], ascending and stable
pub(crate) fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by_cached_key(Contact::sort_key);
}
