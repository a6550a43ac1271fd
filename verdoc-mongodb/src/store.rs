use async_trait::async_trait;
use bson::{Bson, Document as RawDocument, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, ReturnDocument},
};
use tracing::debug;

use verdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::VERSION_FIELD,
    error::{StoreError, StoreResult},
    history::DOC_ID_FIELD,
};

use crate::keys::{escape_record, restore_record};

fn backend_err(e: MongoError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_duplicate_key(e: &MongoError) -> bool {
    match &*e.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<RawDocument> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn shutdown(self) -> StoreResult<()> {
        debug!(database = %self.database, "shutting down mongodb backend");
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_document(
        &self,
        id: &Bson,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        Ok(self
            .get_collection(collection)
            .find_one(doc! { "_id": id.clone() })
            .await
            .map_err(backend_err)?
            .map(|record| restore_record(&record)))
    }

    async fn insert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        self.get_collection(collection)
            .insert_one(escape_record(&record))
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::DocumentAlreadyExists(id.to_string(), collection.to_string())
                } else {
                    backend_err(e)
                }
            })?;

        Ok(())
    }

    async fn replace_document(
        &self,
        id: &Bson,
        expected_version: u64,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        let result = self
            .get_collection(collection)
            .replace_one(
                doc! { "_id": id.clone(), VERSION_FIELD: expected_version as i64 },
                escape_record(&record),
            )
            .await
            .map_err(backend_err)?;

        Ok(result.matched_count > 0)
    }

    async fn append_history(
        &self,
        doc_id: &Bson,
        version: u64,
        snapshot: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        // $setOnInsert leaves an occupied slot untouched; whether an upsert
        // actually inserted is what distinguishes winning from losing the
        // race for this (doc_id, version) key.
        let result = self
            .get_collection(collection)
            .update_one(
                doc! { DOC_ID_FIELD: doc_id.clone(), VERSION_FIELD: version as i64 },
                doc! { "$setOnInsert": escape_record(&snapshot) },
            )
            .upsert(true)
            .await
            .map_err(backend_err)?;

        Ok(result.upserted_id.is_some())
    }

    async fn upsert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        self.get_collection(collection)
            .replace_one(doc! { "_id": id.clone() }, escape_record(&record))
            .upsert(true)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn find_documents(
        &self,
        filter: RawDocument,
        collection: &str,
    ) -> StoreResult<Vec<RawDocument>> {
        Ok(self
            .get_collection(collection)
            .find(filter)
            .await
            .map_err(backend_err)?
            .try_collect::<Vec<RawDocument>>()
            .await
            .map_err(backend_err)?
            .iter()
            .map(restore_record)
            .collect())
    }

    async fn find_one_and_update(
        &self,
        filter: RawDocument,
        update: RawDocument,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        Ok(self
            .get_collection(collection)
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend_err)?
            .map(|record| restore_record(&record)))
    }

    async fn delete_document(&self, id: &Bson, collection: &str) -> StoreResult<()> {
        let result = self
            .get_collection(collection)
            .delete_one(doc! { "_id": id.clone() })
            .await
            .map_err(backend_err)?;

        if result.deleted_count == 0 {
            return Err(StoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            ));
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
        let result = self
            .get_collection(collection)
            .update_one(
                doc! { "_id": id.clone() },
                doc! { "$set": escape_record(&doc! { field: value }) },
            )
            .await
            .map_err(backend_err)?;

        if result.matched_count == 0 {
            return Err(StoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            ));
        }

        Ok(())
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_err)
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| StoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
