//! In-memory replication store.

use crate::column::ColumnModel;
use crate::error::{IndexError, IndexResult};
use crate::fingerprint::{ContentCrc, VersionFingerprint};
use crate::index_store::IndexStore;
use crate::replication::{ReplicatedEntity, ReplicationStore};
use crate::types::{ContainerSet, ObjectId, ViewTypeMask};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory [`ReplicationStore`].
///
/// Counts `populate` calls and can be told to fail the next one, so callers
/// can observe whether a build actually copied rows.
#[derive(Default)]
pub struct MemoryReplicationStore {
    entities: RwLock<BTreeMap<u64, ReplicatedEntity>>,
    populate_calls: AtomicU64,
    fail_next_populate: Mutex<Option<String>>,
}

impl MemoryReplicationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a replicated entity.
    pub fn upsert(&self, entity: ReplicatedEntity) {
        self.entities.write().insert(entity.id, entity);
    }

    /// Removes a replicated entity.
    pub fn remove(&self, id: u64) -> Option<ReplicatedEntity> {
        self.entities.write().remove(&id)
    }

    /// Returns a copy of a replicated entity.
    pub fn get(&self, id: u64) -> Option<ReplicatedEntity> {
        self.entities.read().get(&id).cloned()
    }

    /// Number of replicated entities.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if nothing is replicated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times `populate` has been called.
    pub fn populate_calls(&self) -> u64 {
        self.populate_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `populate` fail with a replication error.
    pub fn fail_next_populate(&self, message: impl Into<String>) {
        *self.fail_next_populate.lock() = Some(message.into());
    }

    fn in_scope(&self, containers: &ContainerSet, mask: ViewTypeMask) -> Vec<ReplicatedEntity> {
        self.entities
            .read()
            .values()
            .filter(|entity| entity.is_in_view_scope(containers, mask))
            .cloned()
            .collect()
    }
}

impl ReplicationStore for MemoryReplicationStore {
    fn populate(
        &self,
        target: &dyn IndexStore,
        target_id: &ObjectId,
        containers: &ContainerSet,
        mask: ViewTypeMask,
        schema: &[ColumnModel],
    ) -> IndexResult<u64> {
        self.populate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_populate.lock().take() {
            return Err(IndexError::Replication(message));
        }
        let rows = self
            .in_scope(containers, mask)
            .iter()
            .map(|entity| entity.to_index_row(schema))
            .collect();
        target.append_rows(target_id, rows)
    }

    fn compute_crc(
        &self,
        containers: &ContainerSet,
        mask: ViewTypeMask,
    ) -> IndexResult<VersionFingerprint> {
        let mut crc = ContentCrc::new();
        for entity in self.in_scope(containers, mask) {
            crc.add_row(entity.id, &entity.etag, entity.benefactor_id);
        }
        Ok(crc.finish())
    }
}
