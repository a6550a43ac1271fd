//! In-memory storage implementation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document as RawDocument};
use mea::rwlock::RwLock;

use verdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{ID_FIELD, record_version},
    error::{StoreError, StoreResult},
};

type CollectionMap = HashMap<String, RawDocument>;
type StoreMap = HashMap<String, CollectionMap>;

/// Stable map key for an arbitrary BSON identity value.
fn key_of(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map key for a `(doc_id, version)` history slot.
fn history_key(doc_id: &Bson, version: u64) -> String {
    format!("{}#{}", key_of(doc_id), version)
}

/// Thread-safe in-memory document storage backend.
///
/// Records are stored as flat BSON documents keyed by the string form of
/// their identity. `InMemoryStore` is cloneable and uses `Arc`-wrapped
/// internal state; clones share the same underlying data.
///
/// All mutating operations take the single write lock, which is what makes
/// [`append_history`](StoreBackend::append_history) an atomic
/// insert-if-absent: the vacancy check and the insert cannot interleave with
/// another writer.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Whether the filter matches the record: every top-level filter entry
    /// must equal the record's value under the same key.
    fn matches(filter: &RawDocument, record: &RawDocument) -> bool {
        filter
            .iter()
            .all(|(key, value)| record.get(key) == Some(value))
    }

    /// Applies an update document in place. `$set` and `$unset` operate on
    /// top-level fields; an update without operators replaces the record
    /// wholesale, keeping its `_id`.
    fn apply_update(record: &mut RawDocument, update: &RawDocument) -> StoreResult<()> {
        if !update.keys().any(|key| key.starts_with('$')) {
            let mut replacement = update.clone();
            if let Some(id) = record.get(ID_FIELD) {
                replacement.insert(ID_FIELD, id.clone());
            }
            *record = replacement;

            return Ok(());
        }

        for (operator, spec) in update.iter() {
            let spec = match spec.as_document() {
                Some(spec) => spec,
                None => {
                    return Err(StoreError::Backend(format!(
                        "malformed {operator} update"
                    )));
                }
            };

            match operator.as_str() {
                "$set" => {
                    for (field, value) in spec.iter() {
                        record.insert(field.clone(), value.clone());
                    }
                }
                "$unset" => {
                    for (field, _) in spec.iter() {
                        record.remove(field);
                    }
                }
                other => {
                    return Err(StoreError::Backend(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_document(
        &self,
        id: &Bson,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|col| col.get(&key_of(id)))
            .cloned())
    }

    async fn insert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        let key = key_of(id);

        if collection_map.contains_key(&key) {
            return Err(StoreError::DocumentAlreadyExists(key, collection.to_string()));
        }

        collection_map.insert(key, record);

        Ok(())
    }

    async fn replace_document(
        &self,
        id: &Bson,
        expected_version: u64,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(false),
        };

        let key = key_of(id);

        match collection_map.get_mut(&key) {
            Some(stored) if record_version(stored) == Some(expected_version) => {
                *stored = record;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_history(
        &self,
        doc_id: &Bson,
        version: u64,
        snapshot: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        let key = history_key(doc_id, version);

        if collection_map.contains_key(&key) {
            return Ok(false);
        }

        collection_map.insert(key, snapshot);

        Ok(true)
    }

    async fn upsert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        let mut store = self.store.write().await;

        store
            .entry(collection.to_string())
            .or_default()
            .insert(key_of(id), record);

        Ok(())
    }

    async fn find_documents(
        &self,
        filter: RawDocument,
        collection: &str,
    ) -> StoreResult<Vec<RawDocument>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        Ok(collection_map
            .values()
            .filter(|record| Self::matches(&filter, record))
            .cloned()
            .collect())
    }

    async fn find_one_and_update(
        &self,
        filter: RawDocument,
        update: RawDocument,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        let key = match collection_map
            .iter()
            .find(|(_, record)| Self::matches(&filter, record))
            .map(|(key, _)| key.clone())
        {
            Some(key) => key,
            None => return Ok(None),
        };

        match collection_map.get_mut(&key) {
            Some(record) => {
                Self::apply_update(record, &update)?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_document(&self, id: &Bson, collection: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let key = key_of(id);

        // Point writes report a missing record, never a missing collection,
        // matching backends that create collections lazily.
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(StoreError::DocumentNotFound(key, collection.to_string())),
        };

        if collection_map.remove(&key).is_none() {
            return Err(StoreError::DocumentNotFound(key, collection.to_string()));
        }

        Ok(())
    }

    async fn set_field(
        &self,
        id: &Bson,
        field: &str,
        value: Bson,
        collection: &str,
    ) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let key = key_of(id);

        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(StoreError::DocumentNotFound(key, collection.to_string())),
        };

        match collection_map.get_mut(&key) {
            Some(record) => {
                record.insert(field.to_string(), value);
                Ok(())
            }
            None => Err(StoreError::DocumentNotFound(key, collection.to_string())),
        }
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(HashMap::new);

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
