//! Index store abstraction: the queryable materialization of a table or view.

use crate::column::ColumnModel;
use crate::error::IndexResult;
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a materialized index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    /// Row id (the entity id for views).
    pub row_id: u64,
    /// Entity etag at replication time.
    pub etag: String,
    /// Entity whose ACL governs this row.
    pub benefactor_id: u64,
    /// Cell values keyed by column id.
    pub values: BTreeMap<String, Option<String>>,
}

/// Storage of index artifacts.
///
/// All operations are idempotent where the wording allows: deleting a
/// missing index succeeds, setting the same schema twice is a no-op.
pub trait IndexStore: Send + Sync {
    /// Drops the index and its secondary structures.
    fn delete_index(&self, object_id: &ObjectId) -> IndexResult<()>;

    /// Creates an empty index with the given schema, replacing any existing one.
    fn set_index_schema(&self, object_id: &ObjectId, schema: &[ColumnModel]) -> IndexResult<()>;

    /// Appends rows; returns how many were written.
    fn append_rows(&self, object_id: &ObjectId, rows: Vec<IndexRow>) -> IndexResult<u64>;

    /// Builds secondary indices over the populated rows.
    fn optimize_indices(&self, object_id: &ObjectId) -> IndexResult<()>;

    /// Returns true if an index exists for the object.
    fn index_exists(&self, object_id: &ObjectId) -> IndexResult<bool>;

    /// Returns the schema of the index, if it exists.
    fn index_schema(&self, object_id: &ObjectId) -> IndexResult<Option<Vec<ColumnModel>>>;

    /// Returns a copy of the rows, ordered by row id, if the index exists.
    fn rows(&self, object_id: &ObjectId) -> IndexResult<Option<Vec<IndexRow>>>;
}
