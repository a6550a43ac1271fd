//! Error types and result types for store operations.
//!
//! Use [`StoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a store.
///
/// [`StoreError::Conflict`] is the only variant the save protocol produces on
/// purpose: it signals a lost optimistic-concurrency race and is recoverable by
/// re-reading the document and retrying the save. Backend failures propagate
/// unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another writer already archived this version of the document.
    /// The first argument is the document id, the second the contested version.
    #[error("Cannot save new version of document {0}: version {1} already archived")]
    Conflict(String, u64),
    /// The document failed self-validation or its declared schema.
    #[error("Invalid document: {0}")]
    Validation(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given id already exists in the collection.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Whether this error is a recoverable optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_, _))
    }
}

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
