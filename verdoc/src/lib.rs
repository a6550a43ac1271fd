//! Main verdoc crate providing a unified interface for versioned document storage.
//!
//! This crate is the primary entry point for users of the verdoc framework.
//! It re-exports the core types from the sub-crates and provides convenient
//! access to the storage backends.
//!
//! # Features
//!
//! - **Versioned saves** - Every save archives the superseded record into an
//!   append-only history collection
//! - **Optimistic concurrency** - Lost-update races surface as recoverable
//!   conflict errors instead of silent overwrites
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Schema seam** - Pluggable document validation before any write
//!
//! # Quick Start
//!
//! ```ignore
//! use verdoc::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let notes = store.versioned_collection("notes");
//!
//!     let mut note = Document::new();
//!     note.set("message", "Hallo Welt!");
//!
//!     // First save: _v becomes 1, no history entry yet.
//!     notes.save(&mut note).await?;
//!
//!     // Second save: _v becomes 2 and the first draft is archived.
//!     note.set("message", "Hallo schoene Welt!");
//!     notes.save(&mut note).await?;
//!
//!     let trail = notes.ledger().entries_for(note.id()).await?;
//!     assert_eq!(trail.len(), 1);
//!     assert_eq!(trail[0].version(), 1);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Conflict handling
//!
//! Two concurrent saves that both read the same durable version race for the
//! same `(doc_id, _v)` history slot; exactly one wins. The losers receive
//! [`StoreError::Conflict`](verdoc_core::error::StoreError) and are expected
//! to re-read the document and retry:
//!
//! ```ignore
//! match notes.save(&mut note).await {
//!     Err(e) if e.is_conflict() => {
//!         note = notes.find_one(note.id()).await?.expect("document exists");
//!         // re-apply the mutation and save again
//!     }
//!     other => other?,
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use verdoc_core::{backend, collection, document, error, history, schema, store, versioned};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use verdoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use verdoc_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
