//! Main store interface handing out collection handles.
//!
//! A [`DocumentStore`] owns its backend handle as a plain value: the caller
//! initializes it on startup and shuts it down explicitly. There is no ambient
//! connection cache or module-level singleton; everything downstream borrows
//! from this value.

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::StoreResult,
    versioned::VersionedCollection,
};

/// A document store bound to a specific backend implementation.
///
/// # Example
///
/// ```ignore
/// let store = DocumentStore::new(my_backend);
/// let notes = store.versioned_collection("notes");
/// ```
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a plain collection handle with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Gets a versioned collection handle with the given name.
    ///
    /// The history collection defaults to `{name}_history`.
    pub fn versioned_collection<'a>(&'a self, name: &str) -> VersionedCollection<'a, B> {
        VersionedCollection::new(name.to_string(), None, &self.backend)
    }

    /// Gets a versioned collection handle with an explicit history collection
    /// name.
    pub fn versioned_collection_with_history<'a>(
        &'a self,
        name: &str,
        history_name: &str,
    ) -> VersionedCollection<'a, B> {
        VersionedCollection::new(
            name.to_string(),
            Some(history_name.to_string()),
            &self.backend,
        )
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.backend.create_collection(name).await
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}
