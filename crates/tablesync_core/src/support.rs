//! Reads the truth needed to decide whether an index is current.
//!
//! [`TableSupport`] dispatches on [`TableKind`]: row tables are versioned by
//! their last change number, views by a CRC over the replicated rows in their
//! resolved scope.

use crate::cache::ExpiringCache;
use crate::clock::Clock;
use crate::column::{ColumnModel, EntityField, IMPLICIT_VIEW_FIELDS};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::fingerprint::{SchemaFingerprint, VersionFingerprint};
use crate::hierarchy::ContainerHierarchy;
use crate::index_store::IndexStore;
use crate::notify::ChangeNotifier;
use crate::reconcile::ReconciliationTrigger;
use crate::replication::ReplicationStore;
use crate::scope::ScopeResolver;
use crate::status::StatusStore;
use crate::truth::{SchemaStore, TruthStore};
use crate::types::{ContainerSet, ObjectId, TableKind, ViewScope, ViewTypeMask};
use std::sync::Arc;

/// The external collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    /// Authoritative entity graph.
    pub truth: Arc<dyn TruthStore>,
    /// Column bindings and view scopes.
    pub schema: Arc<dyn SchemaStore>,
    /// Container expansion.
    pub hierarchy: Arc<dyn ContainerHierarchy>,
    /// Replicated entity metadata.
    pub replication: Arc<dyn ReplicationStore>,
    /// Change messages and reconciliation requests.
    pub notifier: Arc<dyn ChangeNotifier>,
    /// Index status rows.
    pub status: Arc<dyn StatusStore>,
    /// Materialized indices.
    pub index: Arc<dyn IndexStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Truth lookups shared by the tracker, the builder and the view manager.
pub struct TableSupport {
    truth: Arc<dyn TruthStore>,
    schema: Arc<dyn SchemaStore>,
    replication: Arc<dyn ReplicationStore>,
    scope: ScopeResolver,
    reconciliation: ReconciliationTrigger,
    column_cache: ExpiringCache<EntityField, ColumnModel>,
}

impl TableSupport {
    /// Wires the support layer.
    pub fn new(collaborators: &Collaborators, config: &IndexConfig) -> Self {
        Self {
            truth: Arc::clone(&collaborators.truth),
            schema: Arc::clone(&collaborators.schema),
            replication: Arc::clone(&collaborators.replication),
            scope: ScopeResolver::new(
                Arc::clone(&collaborators.hierarchy),
                config.max_containers_per_view,
            ),
            reconciliation: ReconciliationTrigger::new(
                Arc::clone(&collaborators.notifier),
                config.root_container_id,
            ),
            column_cache: ExpiringCache::new(
                config.default_column_ttl,
                Arc::clone(&collaborators.clock),
            ),
        }
    }

    /// The scope resolver.
    pub fn scope_resolver(&self) -> &ScopeResolver {
        &self.scope
    }

    /// The reconciliation trigger.
    pub fn reconciliation(&self) -> &ReconciliationTrigger {
        &self.reconciliation
    }

    /// The replication store.
    pub fn replication(&self) -> &dyn ReplicationStore {
        self.replication.as_ref()
    }

    /// The schema store.
    pub fn schema(&self) -> &dyn SchemaStore {
        self.schema.as_ref()
    }

    /// The truth store.
    pub fn truth(&self) -> &dyn TruthStore {
        self.truth.as_ref()
    }

    /// Returns whether the object is a row table or a view.
    pub fn table_kind(&self, object_id: &ObjectId) -> IndexResult<TableKind> {
        match self.truth.node_type(object_id.id)? {
            Some(entity_type) => TableKind::from_entity_type(entity_type),
            None => Err(IndexError::not_found(format!("{object_id} does not exist"))),
        }
    }

    /// Returns true if the object exists (trashed or not).
    pub fn exists(&self, object_id: &ObjectId) -> IndexResult<bool> {
        self.truth.exists(object_id.id)
    }

    /// Returns true if the object exists and is not in the trash.
    pub fn is_available(&self, object_id: &ObjectId) -> IndexResult<bool> {
        self.truth.is_available(object_id.id)
    }

    /// Returns the ids from the root down to the entity.
    pub fn entity_path(&self, id: u64) -> IndexResult<Vec<u64>> {
        self.truth.entity_path(id)
    }

    /// Fingerprint of the columns bound to the object, in order.
    pub fn schema_fingerprint(&self, object_id: &ObjectId) -> IndexResult<SchemaFingerprint> {
        let column_ids = self.schema.column_ids(object_id)?;
        Ok(SchemaFingerprint::of_columns(&column_ids))
    }

    /// The scope of a view; a view without a scope selects nothing.
    pub fn view_scope(&self, object_id: &ObjectId) -> IndexResult<ViewScope> {
        Ok(self
            .schema
            .view_scope(object_id.id)?
            .unwrap_or_else(|| ViewScope::new([], ViewTypeMask::FILE)))
    }

    /// Resolves the scope of a view to its container set.
    pub fn view_containers(&self, object_id: &ObjectId) -> IndexResult<(ViewScope, ContainerSet)> {
        let scope = self.view_scope(object_id)?;
        let containers = self
            .scope
            .validate_and_expand(&scope.container_ids, scope.type_mask)?;
        Ok((scope, containers))
    }

    /// The version fingerprint the truth currently implies.
    ///
    /// For views this also queues the scope for reconciliation, so a stale
    /// replica converges and changes the CRC on a later check.
    pub fn version_fingerprint(
        &self,
        object_id: &ObjectId,
        kind: TableKind,
    ) -> IndexResult<VersionFingerprint> {
        match kind {
            TableKind::RowTable => Ok(VersionFingerprint::ChangeSequence(
                self.truth.last_change_number(object_id)?,
            )),
            TableKind::ReplicationView => {
                let (scope, containers) = self.view_containers(object_id)?;
                self.reconciliation
                    .trigger_scope_reconciliation(scope.type_mask, &containers);
                self.replication.compute_crc(&containers, scope.type_mask)
            }
        }
    }

    /// Both fingerprints the truth currently implies.
    pub fn current_fingerprints(
        &self,
        object_id: &ObjectId,
    ) -> IndexResult<(VersionFingerprint, SchemaFingerprint)> {
        let kind = self.table_kind(object_id)?;
        Ok((
            self.version_fingerprint(object_id, kind)?,
            self.schema_fingerprint(object_id)?,
        ))
    }

    /// The stored column model of an entity field, cached for the configured TTL.
    pub fn column_model(&self, field: EntityField) -> IndexResult<ColumnModel> {
        self.column_cache.get_or_try_insert_with(&field, || {
            self.schema.create_column_model(&field.column_model())
        })
    }

    /// A view schema plus every implicit field it does not already carry.
    ///
    /// The implicit columns are appended after the requested ones.
    pub fn expanded_view_schema(&self, columns: &[ColumnModel]) -> IndexResult<Vec<ColumnModel>> {
        let mut expanded = columns.to_vec();
        for field in IMPLICIT_VIEW_FIELDS {
            let present = columns
                .iter()
                .any(|column| EntityField::find_match(column) == Some(*field));
            if !present {
                expanded.push(self.column_model(*field)?);
            }
        }
        Ok(expanded)
    }
}
