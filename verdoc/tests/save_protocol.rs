//! End-to-end tests of the versioned save protocol against the in-memory
//! backend, including a deterministic lost-update race.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document as RawDocument, doc};
use tokio::sync::Barrier;

use verdoc::memory::InMemoryStore;
use verdoc::prelude::*;

fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

#[tokio::test]
async fn first_save_sets_version_one_and_writes_no_history() {
    let store = store();
    let notes = store.versioned_collection("notes");

    let mut note = Document::new();
    note.set("message", "Hallo Welt!");
    notes.save(&mut note).await.unwrap();

    assert_eq!(note.version(), 1);

    let stored = notes.find_one(note.id()).await.unwrap().unwrap();
    assert_eq!(stored.version(), 1);

    let trail = notes.ledger().entries_for(note.id()).await.unwrap();
    assert!(trail.is_empty());
}

#[tokio::test]
async fn sequential_saves_increment_version_and_archive_previous_state() {
    let store = store();
    let notes = store.versioned_collection("notes");

    // Empty first save.
    let mut note = Document::with_id(1);
    notes.save(&mut note).await.unwrap();
    assert_eq!(note.version(), 1);
    assert!(notes.ledger().entries_for(note.id()).await.unwrap().is_empty());

    // Second save archives the empty version 1.
    note.set("message", "A");
    notes.save(&mut note).await.unwrap();
    assert_eq!(note.version(), 2);

    let trail = notes.ledger().entries_for(note.id()).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].doc_id(), &DocumentId::from(1));
    assert_eq!(trail[0].version(), 1);
    assert!(trail[0].fields().get("message").is_none());

    // Third save archives version 2 with the fields it carried.
    note.set("message", "B");
    notes.save(&mut note).await.unwrap();
    assert_eq!(note.version(), 3);

    let trail = notes.ledger().entries_for(note.id()).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].version(), 1);
    assert_eq!(trail[1].version(), 2);
    assert_eq!(trail[1].fields().get("message"), Some(&Bson::String("A".into())));
}

#[tokio::test]
async fn n_saves_leave_version_n_and_n_minus_one_history_entries() {
    let store = store();
    let notes = store.versioned_collection("notes");

    let mut note = Document::with_id("counter");
    for n in 1..=5_i32 {
        note.set("count", n);
        notes.save(&mut note).await.unwrap();
    }

    assert_eq!(note.version(), 5);

    let trail = notes.ledger().entries_for(note.id()).await.unwrap();
    assert_eq!(trail.len(), 4);
    assert_eq!(
        trail.iter().map(HistoryRecord::version).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
}

#[tokio::test]
async fn saving_over_an_externally_inserted_record_archives_it() {
    let store = store();

    // A bare record written outside the versioned path, already at version 1.
    let plain = store.collection("notes");
    let seeded = plain.new_from_bare(doc! { "_id": 1, "_v": 1_i64, "message": "Hallo Welt" });
    plain.save(&seeded).await.unwrap();

    let notes = store.versioned_collection("notes");
    let mut note = plain.new_from_bare(doc! { "_id": 1, "message": "Hallo Welt" });

    notes.save(&mut note).await.unwrap();
    notes.save(&mut note).await.unwrap();
    notes.save(&mut note).await.unwrap();

    assert_eq!(note.version(), 4);

    let trail = notes.ledger().entries_for(note.id()).await.unwrap();
    assert_eq!(
        trail.iter().map(HistoryRecord::version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn saved_fields_round_trip_through_the_primary_record() {
    let store = store();
    let notes = store.versioned_collection("notes");

    let mut note = Document::new();
    note.set("message", "Hallo Welt!");
    note.set("tags", vec!["a", "b"]);
    note.set("meta", doc! { "nested": { "deep": true } });
    notes.save(&mut note).await.unwrap();

    let fetched = notes.find_one(note.id()).await.unwrap().unwrap();
    assert_eq!(fetched.fields(), note.fields());
    assert_eq!(fetched.version(), note.version());
}

#[tokio::test]
async fn replaying_an_archived_version_conflicts() {
    let store = store();
    let notes = store.versioned_collection("notes");

    let mut note = Document::with_id(1);
    note.set("message", "A");
    notes.save(&mut note).await.unwrap();
    note.set("message", "B");
    notes.save(&mut note).await.unwrap();
    assert_eq!(note.version(), 2);

    // Tamper the durable record back to the already-archived version 1.
    store
        .collection("notes")
        .set_field(note.id(), VERSION_FIELD, 1_i64)
        .await
        .unwrap();

    note.set("message", "C");
    let err = notes.save(&mut note).await.unwrap_err();
    assert!(err.is_conflict());

    // The losing save must not have touched the primary record.
    let stored = notes.find_one(note.id()).await.unwrap().unwrap();
    assert_eq!(stored.get("message"), Some(&Bson::String("B".into())));
}

/// Backend wrapper that parks every point read on a barrier, so all racing
/// savers observe the same durable version before any of them writes.
#[derive(Debug)]
struct RacingStore {
    inner: InMemoryStore,
    gate: Barrier,
}

impl RacingStore {
    fn new(racers: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            gate: Barrier::new(racers),
        }
    }
}

#[async_trait]
impl StoreBackend for RacingStore {
    async fn find_document(
        &self,
        id: &Bson,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        let record = self.inner.find_document(id, collection).await?;
        self.gate.wait().await;
        Ok(record)
    }

    async fn insert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        self.inner.insert_document(id, record, collection).await
    }

    async fn replace_document(
        &self,
        id: &Bson,
        expected_version: u64,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        self.inner
            .replace_document(id, expected_version, record, collection)
            .await
    }

    async fn append_history(
        &self,
        doc_id: &Bson,
        version: u64,
        snapshot: RawDocument,
        collection: &str,
    ) -> StoreResult<bool> {
        self.inner
            .append_history(doc_id, version, snapshot, collection)
            .await
    }

    async fn upsert_document(
        &self,
        id: &Bson,
        record: RawDocument,
        collection: &str,
    ) -> StoreResult<()> {
        self.inner.upsert_document(id, record, collection).await
    }

    async fn find_documents(
        &self,
        filter: RawDocument,
        collection: &str,
    ) -> StoreResult<Vec<RawDocument>> {
        self.inner.find_documents(filter, collection).await
    }

    async fn find_one_and_update(
        &self,
        filter: RawDocument,
        update: RawDocument,
        collection: &str,
    ) -> StoreResult<Option<RawDocument>> {
        self.inner.find_one_and_update(filter, update, collection).await
    }

    async fn delete_document(&self, id: &Bson, collection: &str) -> StoreResult<()> {
        self.inner.delete_document(id, collection).await
    }

    async fn set_field(
        &self,
        id: &Bson,
        field: &str,
        value: Bson,
        collection: &str,
    ) -> StoreResult<()> {
        self.inner.set_field(id, field, value, collection).await
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.inner.create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.inner.list_collections().await
    }
}

#[tokio::test]
async fn concurrent_saves_reading_the_same_version_yield_one_winner() {
    const RACERS: usize = 4;

    let backend = RacingStore::new(RACERS);

    // Seed version 1 without going through the gated read path.
    backend
        .inner
        .upsert_document(
            &Bson::Int32(1),
            doc! { "_id": 1, "_v": 1_i64, "message": "seed" },
            "notes",
        )
        .await
        .unwrap();

    // Ungated view of the shared state for post-race verification; reads
    // through the racing store would park on the barrier again.
    let verify = DocumentStore::new(backend.inner.clone());

    let store = Arc::new(DocumentStore::new(backend));

    let mut handles = Vec::new();
    for racer in 0..RACERS {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let notes = store.versioned_collection("notes");
            let mut note = Document::with_id(1);
            note.set("message", format!("writer {racer}"));
            notes.save(&mut note).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, RACERS - 1);

    // The surviving save advanced the record to exactly version 2 and
    // archived exactly one snapshot of version 1.
    let notes = verify.versioned_collection("notes");
    let stored = notes.find_one(&DocumentId::from(1)).await.unwrap().unwrap();
    assert_eq!(stored.version(), 2);

    let trail = notes.ledger().entries_for(&DocumentId::from(1)).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].version(), 1);
    assert_eq!(trail[0].fields().get("message"), Some(&Bson::String("seed".into())));
}
