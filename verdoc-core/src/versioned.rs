//! The versioned-document save protocol.
//!
//! [`VersionedCollection::save`] persists a document while preserving the
//! superseded record in the history ledger and detecting lost-update races.
//! The write path is two non-atomic round trips coordinated by optimistic
//! concurrency:
//!
//! 1. **Read** — fetch the current durable record to learn the prior version.
//! 2. **History append** — archive that record into the ledger with an atomic
//!    insert-if-absent keyed by `(doc_id, _v)`. Only one concurrent save can
//!    win the race to archive a given version; every other save targeting the
//!    same prior version finds the slot taken and aborts with
//!    [`StoreError::Conflict`].
//! 3. **Write** — bump `_v` and insert (first save) or replace the primary
//!    record conditioned on the old `_v`.
//!
//! The protocol holds no in-process lock and never retries; a conflicted
//! caller re-reads and retries if it wants eventual success. A conflict during
//! the history append guarantees the primary record was never touched by that
//! save attempt.

use tracing::{debug, trace};

use bson::Document as RawDocument;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentId},
    error::{StoreError, StoreResult},
    history::{HistoryLedger, HistoryRecord},
    schema::SchemaValidator,
};

/// Default suffix for a collection's history counterpart.
const HISTORY_SUFFIX: &str = "_history";

/// A collection handle with the versioned, history-preserving save path.
pub struct VersionedCollection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    ledger: HistoryLedger<'a, B>,
    schema: Option<&'a dyn SchemaValidator>,
}

impl<'a, B: StoreBackend> std::fmt::Debug for VersionedCollection<'a, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedCollection")
            .field("name", &self.name)
            .field("history", &self.ledger.name())
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl<'a, B: StoreBackend> VersionedCollection<'a, B> {
    pub(crate) fn new(name: String, history_name: Option<String>, backend: &'a B) -> Self {
        let history_name =
            history_name.unwrap_or_else(|| format!("{name}{HISTORY_SUFFIX}"));

        Self {
            name,
            backend,
            ledger: HistoryLedger::new(history_name, backend),
            schema: None,
        }
    }

    /// Returns the name of the primary collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The history ledger backing this collection.
    pub fn ledger(&self) -> &HistoryLedger<'a, B> {
        &self.ledger
    }

    /// Attaches a schema validator. Documents failing it are rejected before
    /// any write is attempted.
    pub fn with_schema(mut self, schema: &'a dyn SchemaValidator) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Fetches the current durable document with the given identity, if any.
    pub async fn find_one(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        match self
            .backend
            .find_document(id.as_bson(), &self.name)
            .await?
        {
            Some(record) => Ok(Some(Document::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Returns all current documents matching the filter.
    pub async fn find_many(&self, filter: RawDocument) -> StoreResult<Vec<Document>> {
        self.backend
            .find_documents(filter, &self.name)
            .await?
            .into_iter()
            .map(Document::from_record)
            .collect()
    }

    /// Deletes the primary record. Archived history entries are kept; the
    /// ledger is append-only.
    pub async fn delete(&self, id: &DocumentId) -> StoreResult<()> {
        self.backend
            .delete_document(id.as_bson(), &self.name)
            .await
    }

    /// Persists the document's current in-memory state, archiving the
    /// superseded durable record into the history ledger.
    ///
    /// The prior version is re-derived from durable state on every call; no
    /// expected-version parameter is accepted. On success the document's
    /// version counter is bumped to exactly one past the superseded version.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the document has no identity or fails
    ///   the attached schema. Raised before any round trip.
    /// - [`StoreError::Conflict`] if another writer archived the same prior
    ///   version first, or moved the primary record between our read and
    ///   write. The primary record was not modified by this attempt.
    /// - Backend errors propagate unchanged.
    pub async fn save(&self, document: &mut Document) -> StoreResult<()> {
        document.validate()?;

        if let Some(schema) = self.schema {
            if !schema.validate(&document.to_record()) {
                return Err(StoreError::Validation(format!(
                    "document {} does not validate against its schema",
                    document.id()
                )));
            }
        }

        // Read phase: the stored record is both the expected-version source
        // and the candidate history entry.
        let previous = self
            .backend
            .find_document(document.id().as_bson(), &self.name)
            .await?;

        let curr_version = match previous {
            None => {
                trace!(collection = %self.name, id = %document.id(), "first save, no history write");
                0
            }
            Some(record) => {
                let snapshot = HistoryRecord::from_superseded(record)?;
                let version = snapshot.version();

                // History-append phase: the race-breaker. Losing the
                // insert-if-absent means another save already advanced past
                // this version.
                if !self.ledger.append_if_absent(&snapshot).await? {
                    debug!(
                        collection = %self.name,
                        id = %document.id(),
                        version,
                        "history slot already archived, rejecting save"
                    );
                    return Err(StoreError::Conflict(document.id().to_string(), version));
                }

                version
            }
        };

        // Write phase.
        document.set_version(curr_version + 1);

        if curr_version == 0 {
            match self
                .backend
                .insert_document(document.id().as_bson(), document.to_record(), &self.name)
                .await
            {
                // A duplicate insert is a lost first-save race.
                Err(StoreError::DocumentAlreadyExists(_, _)) => {
                    debug!(collection = %self.name, id = %document.id(), "lost first-save race");
                    Err(StoreError::Conflict(document.id().to_string(), 0))
                }
                other => other,
            }
        } else {
            // The conditional match on the old `_v` is a secondary guard; a
            // zero-match replace means a third writer moved the record after
            // our history append won.
            let matched = self
                .backend
                .replace_document(
                    document.id().as_bson(),
                    curr_version,
                    document.to_record(),
                    &self.name,
                )
                .await?;

            if !matched {
                debug!(
                    collection = %self.name,
                    id = %document.id(),
                    version = curr_version,
                    "primary record moved past expected version, rejecting save"
                );
                return Err(StoreError::Conflict(document.id().to_string(), curr_version));
            }

            trace!(
                collection = %self.name,
                id = %document.id(),
                version = document.version(),
                "saved new version"
            );

            Ok(())
        }
    }
}
