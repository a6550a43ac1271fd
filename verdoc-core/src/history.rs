//! The history ledger: an append-only collection of superseded snapshots.
//!
//! Every successful non-first save archives the record it replaces as a
//! [`HistoryRecord`] tagged with the document's id and the version being
//! superseded. The ledger owns the durable sequence of those snapshots; it
//! only ever appends, and at most one record may exist per `(doc_id, _v)`.

use bson::{Bson, Document as RawDocument, doc};

use crate::{
    backend::StoreBackend,
    document::{DocumentId, ID_FIELD, VERSION_FIELD, record_version},
    error::{StoreError, StoreResult},
};

/// Record key tagging a snapshot with the document it belongs to.
///
/// The snapshot's original `_id` is renamed to this key so it cannot collide
/// with the history collection's own key space.
pub const DOC_ID_FIELD: &str = "doc_id";

/// An immutable snapshot of a document's fields prior to a save.
///
/// The `version` is the version the snapshot *represents*, i.e. the one being
/// superseded by the save that archived it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    doc_id: DocumentId,
    version: u64,
    fields: RawDocument,
}

impl HistoryRecord {
    /// Re-tags a fetched primary record as a history snapshot: `_id` becomes
    /// `doc_id`, the stored `_v` becomes the snapshot version, everything else
    /// is carried as-is.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record carries no `_id`.
    pub fn from_superseded(record: RawDocument) -> StoreResult<Self> {
        let version = record_version(&record).unwrap_or(0);
        let mut doc_id = None;
        let mut fields = RawDocument::new();

        for (key, value) in record {
            match key.as_str() {
                ID_FIELD => doc_id = Some(DocumentId::from(value)),
                VERSION_FIELD => {}
                _ => {
                    fields.insert(key, value);
                }
            }
        }

        let doc_id = doc_id.ok_or_else(|| {
            StoreError::Validation("superseded record carries no identity".to_string())
        })?;

        Ok(Self { doc_id, version, fields })
    }

    pub fn doc_id(&self) -> &DocumentId {
        &self.doc_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fields(&self) -> &RawDocument {
        &self.fields
    }

    /// Flattens this snapshot into the record shape stored in the ledger.
    pub fn to_record(&self) -> RawDocument {
        let mut record = RawDocument::new();
        record.insert(DOC_ID_FIELD, self.doc_id.as_bson().clone());
        record.insert(VERSION_FIELD, Bson::Int64(self.version as i64));

        for (key, value) in self.fields.iter() {
            if key != DOC_ID_FIELD && key != VERSION_FIELD {
                record.insert(key.clone(), value.clone());
            }
        }

        record
    }

    /// Rebuilds a snapshot from a stored ledger record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record carries no `doc_id`.
    pub fn from_record(record: RawDocument) -> StoreResult<Self> {
        let version = record_version(&record).unwrap_or(0);
        let mut doc_id = None;
        let mut fields = RawDocument::new();

        for (key, value) in record {
            match key.as_str() {
                DOC_ID_FIELD => doc_id = Some(DocumentId::from(value)),
                VERSION_FIELD => {}
                _ => {
                    fields.insert(key, value);
                }
            }
        }

        let doc_id = doc_id.ok_or_else(|| {
            StoreError::Validation("history record carries no doc_id".to_string())
        })?;

        Ok(Self { doc_id, version, fields })
    }
}

/// Handle on a history collection.
///
/// The save protocol uses only [`append_if_absent`](HistoryLedger::append_if_absent);
/// the read methods exist for audits and tests.
#[derive(Debug)]
pub struct HistoryLedger<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> HistoryLedger<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of the underlying history collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Archives a snapshot if its `(doc_id, version)` slot is vacant.
    ///
    /// Returns whether the snapshot was actually inserted. A `false` result
    /// means another writer won the race to archive this version.
    pub async fn append_if_absent(&self, snapshot: &HistoryRecord) -> StoreResult<bool> {
        self.backend
            .append_history(
                snapshot.doc_id().as_bson(),
                snapshot.version(),
                snapshot.to_record(),
                &self.name,
            )
            .await
    }

    /// Returns all snapshots matching the filter.
    pub async fn find_all(&self, filter: RawDocument) -> StoreResult<Vec<HistoryRecord>> {
        self.backend
            .find_documents(filter, &self.name)
            .await?
            .into_iter()
            .map(HistoryRecord::from_record)
            .collect()
    }

    /// Returns the archived snapshots of one document, ordered by version.
    pub async fn entries_for(&self, doc_id: &DocumentId) -> StoreResult<Vec<HistoryRecord>> {
        let mut entries = self
            .find_all(doc! { DOC_ID_FIELD: doc_id.as_bson().clone() })
            .await?;

        entries.sort_by_key(HistoryRecord::version);

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn from_superseded_retags_identity_and_keeps_fields() {
        let record = doc! { "_id": 1, "_v": 3_i64, "message": "A" };
        let snapshot = HistoryRecord::from_superseded(record).unwrap();

        assert_eq!(snapshot.doc_id(), &DocumentId::from(1));
        assert_eq!(snapshot.version(), 3);
        assert_eq!(snapshot.fields(), &doc! { "message": "A" });

        let stored = snapshot.to_record();
        assert_eq!(stored.get(DOC_ID_FIELD), Some(&Bson::Int32(1)));
        assert!(stored.get(ID_FIELD).is_none());
    }

    #[test]
    fn ledger_record_round_trip() {
        let snapshot =
            HistoryRecord::from_superseded(doc! { "_id": "n1", "_v": 1_i64, "message": "A" })
                .unwrap();

        let rebuilt = HistoryRecord::from_record(snapshot.to_record()).unwrap();
        assert_eq!(rebuilt, snapshot);
    }

    #[test]
    fn from_superseded_without_identity_fails() {
        assert!(HistoryRecord::from_superseded(doc! { "_v": 1_i64 }).is_err());
    }
}
