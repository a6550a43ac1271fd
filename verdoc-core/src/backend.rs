//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait is the seam between the save protocol and a
//! concrete document store. The protocol needs only a handful of primitives:
//! point reads, inserts that reject duplicates, wholesale replacement
//! conditioned on the stored version, and — the one the concurrency guarantee
//! rests on — an atomic insert-if-absent on the history collection.
//!
//! Implementations must be thread-safe (`Send + Sync`) and support concurrent
//! access; the save protocol holds no lock of its own.

use async_trait::async_trait;
use bson::{Bson, Document as RawDocument};
use std::fmt::Debug;

use crate::error::StoreResult;

/// Abstract interface for document storage backends.
///
/// Record shape: each stored record is a flat BSON document carrying `_id`,
/// `_v`, and arbitrary further fields. History records carry `doc_id` instead
/// of a caller-visible `_id`.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Fetches the record with the given `_id`, if any.
    async fn find_document(
        &self,
        id: &Bson,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>>;

    /// Inserts a brand-new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentAlreadyExists`](crate::error::StoreError)
    /// when a record with the same `_id` is already present. The save protocol
    /// relies on this rejection to break first-save races.
    async fn insert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()>;

    /// Replaces the record matching both `_id` and the expected stored `_v`
    /// wholesale with `record`.
    ///
    /// Returns whether any record matched. A `false` result means the stored
    /// version moved between the caller's read and this write.
    async fn replace_document(
        &self,
        id: &Bson,
        expected_version: u64,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<bool>;

    /// Inserts a history snapshot keyed by `(doc_id, version)` if and only if
    /// that slot is vacant. Never overwrites an existing snapshot.
    ///
    /// Returns whether an insert actually occurred. This operation must be
    /// atomic with respect to concurrent calls for the same key; it is the
    /// only synchronization primitive the save protocol uses.
    async fn append_history(
        &self,
        doc_id: &Bson,
        version: u64,
        snapshot: RawDocument,
        collection: &str,
    ) -> StoreResult<bool>;

    /// Inserts or replaces a record unconditionally (last-write-wins).
    async fn upsert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()>;

    /// Returns all records matching the filter.
    ///
    /// Filter semantics are backend-defined pass-through: the memory backend
    /// matches on top-level field equality, the MongoDB backend hands the
    /// filter to the driver unchanged. Not used by the save path.
    async fn find_documents(
        &self,
        filter: RawDocument,
        collection: &str,
    ) -> StoreResult<Vec<RawDocument>>;

    /// Atomically applies an update to the first record matching the filter
    /// and returns the updated record, if any matched.
    ///
    /// Filter and update semantics are backend-defined pass-through, like
    /// [`find_documents`](StoreBackend::find_documents). Not used by the save
    /// path.
    async fn find_one_and_update(
        &self,
        filter: RawDocument,
        update: RawDocument,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>>;

    /// Deletes the record with the given `_id`.
    async fn delete_document(&self, id: &Bson, collection: &str) -> StoreResult<()>;

    /// Sets a single field on the record with the given `_id`.
    async fn set_field(
        &self,
        id: &Bson,
        field: &str,
        value: Bson,
        collection: &str,
    ) -> StoreResult<()>;

    /// Creates a new, empty collection.
    async fn create_collection(&self, name: &str) -> StoreResult<()>;

    /// Drops a collection and all its records.
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends with external
    /// connections should override this.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for constructing backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
