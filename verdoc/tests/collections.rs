//! Tests for plain collection handles, the store facade, and the schema seam.

use bson::{Bson, doc};

use verdoc::memory::InMemoryStore;
use verdoc::prelude::*;

fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::new())
}

#[tokio::test]
async fn plain_save_upserts_and_round_trips() {
    let store = store();
    let users = store.collection("users");

    let mut user = users.new_document();
    user.set("name", "ada");
    users.save(&user).await.unwrap();

    let fetched = users.find_one(user.id()).await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&Bson::String("ada".into())));

    // Plain saves are last-write-wins: same id, no conflict.
    user.set("name", "grace");
    users.save(&user).await.unwrap();

    let fetched = users.find_one(user.id()).await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&Bson::String("grace".into())));
}

#[tokio::test]
async fn find_many_filters_on_field_equality() {
    let store = store();
    let users = store.collection("users");

    for (id, role) in [(1, "admin"), (2, "member"), (3, "admin")] {
        let mut user = users.new_from_bare(doc! { "_id": id, "role": role });
        user.set("seq", id);
        users.save(&user).await.unwrap();
    }

    let admins = users.find_many(doc! { "role": "admin" }).await.unwrap();
    assert_eq!(admins.len(), 2);

    let all = users.find_many(doc! {}).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn set_field_patches_without_touching_other_fields() {
    let store = store();
    let users = store.collection("users");

    let user = users.new_from_bare(doc! { "_id": "u1", "name": "ada", "role": "member" });
    users.save(&user).await.unwrap();

    users.set_field(user.id(), "role", "admin").await.unwrap();

    let fetched = users.find_one(user.id()).await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&Bson::String("ada".into())));
    assert_eq!(fetched.get("role"), Some(&Bson::String("admin".into())));
}

#[tokio::test]
async fn find_one_and_update_returns_the_updated_document() {
    let store = store();
    let users = store.collection("users");

    let user = users.new_from_bare(doc! { "_id": "u1", "name": "ada", "role": "member" });
    users.save(&user).await.unwrap();

    let updated = users
        .find_one_and_update(doc! { "_id": "u1" }, doc! { "$set": { "role": "admin" } })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id(), &DocumentId::from("u1"));
    assert_eq!(updated.get("role"), Some(&Bson::String("admin".into())));
    assert_eq!(updated.get("name"), Some(&Bson::String("ada".into())));

    let missing = users
        .find_one_and_update(doc! { "_id": "nope" }, doc! { "$set": { "role": "admin" } })
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn set_field_on_missing_document_fails() {
    let store = store();
    let users = store.collection("users");

    let err = users
        .set_field(&DocumentId::from("nope"), "role", "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DocumentNotFound(_, _)));
}

#[tokio::test]
async fn delete_removes_the_record() {
    let store = store();
    let users = store.collection("users");

    let user = users.new_from_bare(doc! { "_id": "u1", "name": "ada" });
    users.save(&user).await.unwrap();

    users.delete(user.id()).await.unwrap();
    assert!(users.find_one(user.id()).await.unwrap().is_none());

    let err = users.delete(user.id()).await.unwrap_err();
    assert!(matches!(err, StoreError::DocumentNotFound(_, _)));
}

#[tokio::test]
async fn new_from_bare_routes_reserved_keys() {
    let store = store();
    let users = store.collection("users");

    let user = users.new_from_bare(doc! { "_id": 7, "_v": 3_i64, "name": "ada" });
    assert_eq!(user.id(), &DocumentId::from(7));
    assert_eq!(user.version(), 3);
    assert_eq!(user.fields(), &doc! { "name": "ada" });
}

#[tokio::test]
async fn collection_management_through_the_store() {
    let store = store();

    store.create_collection("a").await.unwrap();
    store.create_collection("b").await.unwrap();

    let mut names = store.list_collections().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

    store.drop_collection("a").await.unwrap();
    let names = store.list_collections().await.unwrap();
    assert_eq!(names, vec!["b".to_string()]);
}

#[tokio::test]
async fn schema_rejection_happens_before_any_write() {
    let store = store();
    let registry = {
        let mut registry = SchemaRegistry::new();
        registry.register(
            "note",
            Box::new(|record: &bson::Document| record.get("message").is_some()),
        );
        registry
    };

    let notes = store
        .versioned_collection("notes")
        .with_schema(registry.validator("note").unwrap());

    let mut bad = Document::with_id(1);
    bad.set("title", "no message field");

    let err = notes.save(&mut bad).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // Nothing reached the backend: no primary record, no history entry.
    assert!(notes.find_one(bad.id()).await.unwrap().is_none());
    assert!(notes.ledger().entries_for(bad.id()).await.unwrap().is_empty());
    assert_eq!(bad.version(), 0);

    let mut good = Document::with_id(1);
    good.set("message", "Hallo Welt!");
    notes.save(&mut good).await.unwrap();
    assert_eq!(good.version(), 1);
}

#[tokio::test]
async fn custom_history_collection_name_is_honoured() {
    let store = store();
    let notes = store.versioned_collection_with_history("notes", "notes_audit");
    assert_eq!(notes.ledger().name(), "notes_audit");

    let mut note = Document::with_id(1);
    note.set("message", "A");
    notes.save(&mut note).await.unwrap();
    note.set("message", "B");
    notes.save(&mut note).await.unwrap();

    // The snapshot landed in the named ledger, not the default one.
    let audit = notes.ledger().find_all(doc! {}).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].version(), 1);

    let default_named = store.versioned_collection("notes");
    assert!(default_named.ledger().find_all(doc! {}).await.unwrap().is_empty());
}
