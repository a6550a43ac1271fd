//! In-memory storage backend for verdoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait using async-aware read-write locks. It is intended for
//! development and testing; the single write lock is also what makes the
//! history insert-if-absent atomic here.

#[allow(unused_extern_crates)]
extern crate self as verdoc_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
