//! Plain collection handles: CRUD pass-through without version bookkeeping.
//!
//! A [`Collection`] wraps one named backend collection and converts between
//! stored records and [`Document`] entities. Saves here are last-write-wins
//! upserts; for the optimistic-concurrency, history-preserving write path use
//! [`crate::versioned::VersionedCollection`].

use bson::{Bson, Document as RawDocument};

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentId},
    error::StoreResult,
};

/// A handle on one named collection of a storage backend.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a fresh empty document, not yet persisted anywhere.
    pub fn new_document(&self) -> Document {
        Document::new()
    }

    /// Builds a document from a bare record, as fetched or supplied by a
    /// caller. `_id` and `_v` keys steer identity and version.
    pub fn new_from_bare(&self, bare: RawDocument) -> Document {
        let mut document = Document::new();
        document.apply(bare);
        document
    }

    /// Fetches the document with the given identity, if any.
    pub async fn find_one(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        match self
            .backend
            .find_document(id.as_bson(), &self.name)
            .await?
        {
            Some(record) => Ok(Some(Document::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Returns all documents matching the filter (backend-defined pass-through
    /// semantics; an empty filter matches everything).
    pub async fn find_many(&self, filter: RawDocument) -> StoreResult<Vec<Document>> {
        self.backend
            .find_documents(filter, &self.name)
            .await?
            .into_iter()
            .map(Document::from_record)
            .collect()
    }

    /// Persists the document as-is, inserting or overwriting without version
    /// bookkeeping (last-write-wins).
    pub async fn save(&self, document: &Document) -> StoreResult<()> {
        document.validate()?;

        self.backend
            .upsert_document(document.id().as_bson(), document.to_record(), &self.name)
            .await
    }

    /// Atomically applies an update to the first record matching the filter,
    /// returning the updated document if any matched. Filter and update
    /// semantics are backend-defined pass-through, like
    /// [`find_many`](Collection::find_many).
    pub async fn find_one_and_update(
        &self,
        filter: RawDocument,
        update: RawDocument,
    ) -> StoreResult<Option<Document>> {
        match self
            .backend
            .find_one_and_update(filter, update, &self.name)
            .await?
        {
            Some(record) => Ok(Some(Document::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Sets a single field on the stored record, leaving the rest untouched.
    pub async fn set_field(
        &self,
        id: &DocumentId,
        field: &str,
        value: impl Into<Bson> + Send,
    ) -> StoreResult<()> {
        self.backend
            .set_field(id.as_bson(), field, value.into(), &self.name)
            .await
    }

    /// Deletes the stored record with the given identity.
    pub async fn delete(&self, id: &DocumentId) -> StoreResult<()> {
        self.backend
            .delete_document(id.as_bson(), &self.name)
            .await
    }
}
