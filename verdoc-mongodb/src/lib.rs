//! MongoDB storage backend for verdoc.
//!
//! History appends map to an upsert with `$setOnInsert` keyed by
//! `(doc_id, _v)`: an occupied slot is never overwritten, and whether the
//! upsert actually inserted is the race-breaker the save protocol relies on.
//! For the uniqueness of that key to hold under concurrency, the history
//! collection should carry a unique compound index on `(doc_id, _v)`.

#[allow(unused_extern_crates)]
extern crate self as verdoc_mongodb;

pub mod keys;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
