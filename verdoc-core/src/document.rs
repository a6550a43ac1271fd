//! The document entity: identity, version counter, and an open-ended field set.
//!
//! A [`Document`] is deliberately dumb. It carries state and self-validation
//! only; the versioned save protocol in [`crate::versioned`] operates *on* it.
//! Fields live in a [`bson::Document`] container that is distinct from the
//! entity's methods, so no stored field name can ever collide with an
//! operation name.

use bson::{Bson, Document as RawDocument, Uuid};
use bson::{de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Record key carrying the document identity.
pub const ID_FIELD: &str = "_id";
/// Record key carrying the version counter.
pub const VERSION_FIELD: &str = "_v";

/// Opaque comparable document identity.
///
/// System-assigned identities are random UUIDs; callers may instead assign
/// integers, strings, or their own UUIDs. The inner BSON value is what gets
/// stored in the record's `_id` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentId(Bson);

impl DocumentId {
    /// Creates a fresh system-assigned identity.
    pub fn new() -> Self {
        Self(Uuid::new().into())
    }

    /// An unset identity. Documents with this identity fail validation.
    pub fn unset() -> Self {
        Self(Bson::Null)
    }

    /// The identity as the BSON value stored under `_id`.
    pub fn as_bson(&self) -> &Bson {
        &self.0
    }

    pub fn into_bson(self) -> Bson {
        self.0
    }

    /// Stable string form, usable as a map key by backends.
    pub fn storage_key(&self) -> String {
        match &self.0 {
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this identity can anchor a durable record.
    pub fn is_set(&self) -> bool {
        match &self.0 {
            Bson::Null | Bson::Undefined => false,
            Bson::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

impl From<Bson> for DocumentId {
    fn from(value: Bson) -> Self {
        Self(value)
    }
}

impl From<Uuid> for DocumentId {
    fn from(value: Uuid) -> Self {
        Self(value.into())
    }
}

impl From<i32> for DocumentId {
    fn from(value: i32) -> Self {
        Self(Bson::Int32(value))
    }
}

impl From<i64> for DocumentId {
    fn from(value: i64) -> Self {
        Self(Bson::Int64(value))
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(Bson::String(value.to_string()))
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(Bson::String(value))
    }
}

/// Reads the version counter out of a stored record.
///
/// Records written by this crate carry `_v` as `Int64`, but externally written
/// records may carry `Int32`. Negative and non-integer values read as `None`.
pub fn record_version(record: &RawDocument) -> Option<u64> {
    match record.get(VERSION_FIELD) {
        Some(Bson::Int32(v)) if *v >= 0 => Some(*v as u64),
        Some(Bson::Int64(v)) if *v >= 0 => Some(*v as u64),
        _ => None,
    }
}

/// A single versioned record: identity, version counter, and fields.
///
/// A never-saved document has version `0`; the first successful save through a
/// versioned collection sets it to `1` and each later save increments it by
/// exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    version: u64,
    fields: RawDocument,
}

impl Document {
    /// Creates an empty document with a fresh system-assigned identity.
    pub fn new() -> Self {
        Self::with_id(DocumentId::new())
    }

    /// Creates an empty document with a caller-assigned identity.
    pub fn with_id(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            fields: RawDocument::new(),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fields(&self) -> &RawDocument {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut RawDocument {
        &mut self.fields
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Sets a single field, overwriting any previous value.
    ///
    /// The reserved `_id` and `_v` record keys are routed to the identity and
    /// version counter instead of the field container.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        let field = field.into();
        let value = value.into();

        match field.as_str() {
            ID_FIELD => self.id = DocumentId::from(value),
            VERSION_FIELD => {
                let mut wrapper = RawDocument::new();
                wrapper.insert(VERSION_FIELD, value);
                self.version = record_version(&wrapper).unwrap_or(0);
            }
            _ => {
                self.fields.insert(field, value);
            }
        }
    }

    /// Reads a single field.
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.fields.get(field)
    }

    /// Applies a bare record onto this document: `_id` and `_v` keys steer the
    /// identity and version counter, every other key merges into the field
    /// container, overwriting known fields and adding unknown ones.
    pub fn apply(&mut self, bare: RawDocument) {
        for (key, value) in bare {
            self.set(key, value);
        }
    }

    /// Checks that this document can anchor a durable record.
    pub fn validate(&self) -> StoreResult<()> {
        if !self.id.is_set() {
            return Err(StoreError::Validation(
                "document has no identity".to_string(),
            ));
        }

        Ok(())
    }

    /// Flattens this document into the record shape stored by backends.
    pub fn to_record(&self) -> RawDocument {
        let mut record = RawDocument::new();
        record.insert(ID_FIELD, self.id.as_bson().clone());
        record.insert(VERSION_FIELD, Bson::Int64(self.version as i64));

        for (key, value) in self.fields.iter() {
            if key != ID_FIELD && key != VERSION_FIELD {
                record.insert(key.clone(), value.clone());
            }
        }

        record
    }

    /// Rebuilds a document from a stored record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record carries no `_id`.
    pub fn from_record(record: RawDocument) -> StoreResult<Self> {
        let version = record_version(&record).unwrap_or(0);
        let mut id = None;
        let mut fields = RawDocument::new();

        for (key, value) in record {
            match key.as_str() {
                ID_FIELD => id = Some(DocumentId::from(value)),
                VERSION_FIELD => {}
                _ => {
                    fields.insert(key, value);
                }
            }
        }

        let id = id.ok_or_else(|| {
            StoreError::Validation("stored record carries no identity".to_string())
        })?;

        Ok(Self { id, version, fields })
    }

    /// Deserializes the field container into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields do not match the target shape.
    pub fn fields_as<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.fields.clone()))?)
    }

    /// Serializes a typed value and applies it onto the field container.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not serialize to a document.
    pub fn apply_typed<T: Serialize>(&mut self, value: &T) -> StoreResult<()> {
        let bson = serialize_to_bson(value)?;
        let bare = bson
            .as_document()
            .cloned()
            .ok_or_else(|| StoreError::Serialization("expected a document".to_string()))?;

        self.apply(bare);

        Ok(())
    }

    /// The field container as a JSON value.
    pub fn fields_json(&self) -> StoreResult<Value> {
        Ok(serde_json::to_value(&self.fields)?)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
