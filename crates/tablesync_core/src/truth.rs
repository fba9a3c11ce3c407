//! Truth store and schema store abstractions.
//!
//! The truth store is the authoritative, versioned entity graph. The schema
//! store holds the column bindings and scope definitions of tables and views.
//! Both are external collaborators; this crate only reads them (plus the
//! definition writes made through [`ViewManager`](crate::ViewManager)).

use crate::column::ColumnModel;
use crate::error::IndexResult;
use crate::types::{EntityType, ObjectId, ViewScope};
use std::collections::HashSet;

/// Read access to the authoritative entity graph.
pub trait TruthStore: Send + Sync {
    /// Returns the node type, or `None` if the node does not exist.
    fn node_type(&self, id: u64) -> IndexResult<Option<EntityType>>;

    /// Returns true if the node exists and is not in the trash.
    fn is_available(&self, id: u64) -> IndexResult<bool>;

    /// Returns true if the node exists (trashed or not).
    fn exists(&self, id: u64) -> IndexResult<bool>;

    /// Returns the ids on the path from the root down to and including `id`.
    fn entity_path(&self, id: u64) -> IndexResult<Vec<u64>>;

    /// Returns the last applied change number of a row table.
    ///
    /// For a snapshot id this is the last change at or before the snapshot.
    fn last_change_number(&self, object_id: &ObjectId) -> IndexResult<Option<u64>>;
}

/// Column bindings and view scope definitions.
pub trait SchemaStore: Send + Sync {
    /// Returns the ordered column ids bound to the object.
    fn column_ids(&self, object_id: &ObjectId) -> IndexResult<Vec<String>>;

    /// Returns the ordered column models bound to the object.
    fn column_models(&self, object_id: &ObjectId) -> IndexResult<Vec<ColumnModel>>;

    /// Binds the given column ids, in order, to the latest version of `id`.
    fn bind_columns(&self, id: u64, column_ids: &[String]) -> IndexResult<Vec<ColumnModel>>;

    /// Stores a column model, returning the stored copy with its id.
    ///
    /// Must be idempotent: an identical template yields the same id.
    fn create_column_model(&self, template: &ColumnModel) -> IndexResult<ColumnModel>;

    /// Returns the scope of a view, or `None` if no scope was defined.
    fn view_scope(&self, id: u64) -> IndexResult<Option<ViewScope>>;

    /// Replaces the scope of a view.
    fn set_view_scope(&self, id: u64, scope: &ViewScope) -> IndexResult<()>;

    /// Returns the views whose scope contains any of the given containers.
    fn find_views_intersecting(&self, container_ids: &[u64]) -> IndexResult<HashSet<u64>>;
}
