//! A thin versioned-document ODM layer over JSON document stores.
//!
//! This crate is the core of the verdoc project and provides:
//!
//! - **Document entity** ([`document`]) - Identity, version counter, and an open-ended field set
//! - **History ledger** ([`history`]) - Append-only collection of superseded snapshots
//! - **Versioned save protocol** ([`versioned`]) - Optimistic-concurrency, history-preserving writes
//! - **Plain collections** ([`collection`]) - CRUD pass-through without version bookkeeping
//! - **Document store** ([`store`]) - Main interface handing out collection handles
//! - **Backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Schema seam** ([`schema`]) - Pluggable document validation
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use verdoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let notes = store.versioned_collection("notes");
//!
//! let mut note = Document::new();
//! note.set("message", "Hallo Welt!");
//! notes.save(&mut note).await?; // _v == 1
//!
//! note.set("message", "Hallo schoene Welt!");
//! notes.save(&mut note).await?; // _v == 2, first draft archived
//! ```

#[allow(unused_extern_crates)]
extern crate self as verdoc_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod history;
pub mod schema;
pub mod store;
pub mod versioned;
