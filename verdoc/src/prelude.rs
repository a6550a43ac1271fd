//! Convenient re-exports of commonly used types from verdoc.
//!
//! ```ignore
//! use verdoc::prelude::*;
//! ```

pub use verdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    document::{Document, DocumentId, ID_FIELD, VERSION_FIELD},
    error::{StoreError, StoreResult},
    history::{DOC_ID_FIELD, HistoryLedger, HistoryRecord},
    schema::{SchemaRegistry, SchemaValidator},
    store::DocumentStore,
    versioned::VersionedCollection,
};
