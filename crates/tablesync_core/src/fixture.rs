//! Shared wiring for unit tests.

use crate::memory::{MemoryIndexStore, MemoryReplicationStore, MemorySchemaStore, MemoryTruthStore};
use crate::{
    ChangeFeed, Collaborators, EntityType, IndexConfig, ManualClock, MemoryStatusStore,
    ReplicatedEntity, TableIndexService, TableStatus, TruthStore, ViewScope, ViewTypeMask,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ROOT: u64 = 4489;
pub const P1: u64 = 1;
pub const P2: u64 = 2;
pub const F1: u64 = 11;
pub const F2: u64 = 21;

pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub truth: Arc<MemoryTruthStore>,
    pub schema: Arc<MemorySchemaStore>,
    pub replication: Arc<MemoryReplicationStore>,
    pub index: Arc<MemoryIndexStore>,
    pub status: Arc<MemoryStatusStore>,
    pub feed: Arc<ChangeFeed>,
    pub service: Arc<TableIndexService>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::new())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let truth = Arc::new(MemoryTruthStore::new());
        let schema = Arc::new(MemorySchemaStore::new());
        let replication = Arc::new(MemoryReplicationStore::new());
        let index = Arc::new(MemoryIndexStore::new());
        let status = Arc::new(MemoryStatusStore::new());
        let feed = Arc::new(ChangeFeed::new());
        let collaborators = Collaborators {
            truth: truth.clone(),
            schema: schema.clone(),
            hierarchy: truth.clone(),
            replication: replication.clone(),
            notifier: feed.clone(),
            status: status.clone(),
            index: index.clone(),
            clock: clock.clone(),
        };
        let service = Arc::new(TableIndexService::new(
            collaborators,
            config.with_root_container_id(ROOT),
        ));
        truth.add_node(ROOT, None, EntityType::Folder);
        Self {
            clock,
            truth,
            schema,
            replication,
            index,
            status,
            feed,
            service,
        }
    }

    /// Projects P1, P2; folders F1 in P1, F2 in P2; one file in each container.
    pub fn with_projects() -> Self {
        let fixture = Self::new();
        fixture.add_entity(P1, ROOT, EntityType::Project);
        fixture.add_entity(P2, ROOT, EntityType::Project);
        fixture.add_entity(F1, P1, EntityType::Folder);
        fixture.add_entity(F2, P2, EntityType::Folder);
        for (file, parent) in [(101, P1), (111, F1), (201, P2), (211, F2)] {
            fixture.add_entity(file, parent, EntityType::File);
        }
        fixture
    }

    pub fn add_entity(&self, id: u64, parent_id: u64, entity_type: EntityType) {
        self.truth.add_node(id, Some(parent_id), entity_type);
        let project_id = self
            .truth
            .entity_path(id)
            .unwrap()
            .into_iter()
            .find(|node| self.truth.node_type(*node).unwrap() == Some(EntityType::Project))
            .unwrap_or(id);
        self.replication.upsert(ReplicatedEntity {
            id,
            current_version: 1,
            parent_id,
            benefactor_id: project_id,
            project_id,
            entity_type,
            name: format!("entity-{id}"),
            etag: format!("etag-{id}-1"),
            created_on: 1,
            created_by: 7,
            modified_on: 1,
            modified_by: 7,
            data_file_handle_id: (entity_type == EntityType::File).then_some(9_000 + id),
            annotations: BTreeMap::new(),
        });
    }

    /// Changes an entity's etag, as an update would.
    pub fn touch(&self, id: u64) {
        let mut entity = self.replication.get(id).unwrap();
        entity.current_version += 1;
        entity.etag = format!("etag-{id}-{}", entity.current_version);
        self.replication.upsert(entity);
    }

    pub fn create_view(&self, view_id: u64, scope: &[u64], mask: ViewTypeMask) -> TableStatus {
        self.truth.add_node(view_id, Some(P1), EntityType::EntityView);
        let views = self.service.views();
        let column_ids: Vec<String> = views
            .default_view_columns(mask)
            .unwrap()
            .into_iter()
            .map(|column| column.id)
            .collect();
        views
            .set_view_schema_and_scope(view_id, &column_ids, &ViewScope::new(scope.iter().copied(), mask))
            .unwrap()
    }

    pub fn create_table(&self, table_id: u64, last_change: Option<u64>) {
        self.truth.add_node(table_id, Some(P1), EntityType::Table);
        if let Some(change) = last_change {
            self.truth.set_last_change_number(table_id, change);
        }
    }
}
