//! Deployment fixtures.
//!
//! A [`TestDeployment`] wires a [`TableIndexService`] over the in-memory
//! collaborators with a manual clock, so tests can build entity trees,
//! define views and drive the worker deterministically.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tablesync_core::memory::{
    MemoryIndexStore, MemoryReplicationStore, MemorySchemaStore, MemoryTruthStore,
};
use tablesync_core::{
    ChangeEvent, ChangeFeed, Clock, Collaborators, EntityType, IndexConfig, IndexResult, IndexWorker,
    ManualClock, MemoryStatusStore, ObjectId, ReplicatedEntity, RetryConfig, TableIndexService,
    TableStatus, ViewScope, ViewTypeMask, DEFAULT_ROOT_CONTAINER_ID,
};

/// Start time of the manual clock (epoch millis).
pub const START_MILLIS: u64 = 1_000_000;

/// First id handed out by [`TestDeployment::next_id`].
const FIRST_GENERATED_ID: u64 = 100_000;

/// The service and every in-memory collaborator behind it.
pub struct TestDeployment {
    /// Manually driven clock.
    pub clock: Arc<ManualClock>,
    /// Entity graph.
    pub truth: Arc<MemoryTruthStore>,
    /// Column models, bindings and view scopes.
    pub schema: Arc<MemorySchemaStore>,
    /// Replicated entity metadata.
    pub replication: Arc<MemoryReplicationStore>,
    /// Materialized indices.
    pub index: Arc<MemoryIndexStore>,
    /// Status rows.
    pub status: Arc<MemoryStatusStore>,
    /// Committed change messages and reconciliation requests.
    pub feed: Arc<ChangeFeed>,
    /// The service under test.
    pub service: Arc<TableIndexService>,
    next_id: AtomicU64,
}

impl TestDeployment {
    /// A deployment with the default configuration.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::new())
    }

    /// A deployment with `config`. The root container is created.
    pub fn with_config(config: IndexConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let truth = Arc::new(MemoryTruthStore::new());
        let schema = Arc::new(MemorySchemaStore::new());
        let replication = Arc::new(MemoryReplicationStore::new());
        let index = Arc::new(MemoryIndexStore::new());
        let status = Arc::new(MemoryStatusStore::new());
        let feed = Arc::new(ChangeFeed::new());
        let root = config.root_container_id;
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
        let service = Arc::new(TableIndexService::new(collaborators, config));
        truth.add_node(root, None, EntityType::Folder);
        Self {
            clock,
            truth,
            schema,
            replication,
            index,
            status,
            feed,
            service,
            next_id: AtomicU64::new(FIRST_GENERATED_ID),
        }
    }

    /// The root container id.
    pub fn root(&self) -> u64 {
        self.service.config().root_container_id
    }

    /// Hands out a fresh entity id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds an entity to the graph and to the replication store.
    pub fn add_entity(&self, id: u64, parent_id: u64, entity_type: EntityType) {
        self.truth.add_node(id, Some(parent_id), entity_type);
        let project_id = if entity_type == EntityType::Project {
            id
        } else {
            self.replication
                .get(parent_id)
                .map(|parent| parent.project_id)
                .unwrap_or(parent_id)
        };
        self.replication.upsert(ReplicatedEntity {
            id,
            current_version: 1,
            parent_id,
            benefactor_id: project_id,
            project_id,
            entity_type,
            name: format!("{entity_type:?}-{id}").to_lowercase(),
            etag: format!("etag-{id}-1"),
            created_on: self.clock_millis(),
            created_by: 1,
            modified_on: self.clock_millis(),
            modified_by: 1,
            data_file_handle_id: (entity_type == EntityType::File).then_some(90_000 + id),
            annotations: BTreeMap::new(),
        });
    }

    /// Adds an entity with a generated id and returns the id.
    pub fn add(&self, parent_id: u64, entity_type: EntityType) -> u64 {
        let id = self.next_id();
        self.add_entity(id, parent_id, entity_type);
        id
    }

    /// Bumps an entity's version and etag, as an update would.
    ///
    /// # Panics
    ///
    /// Panics if the entity was never replicated.
    pub fn touch(&self, id: u64) {
        let mut entity = self
            .replication
            .get(id)
            .expect("touched entity must be replicated");
        entity.current_version += 1;
        entity.etag = format!("etag-{id}-{}", entity.current_version);
        entity.modified_on = self.clock_millis();
        self.replication.upsert(entity);
    }

    /// Sets an annotation on a replicated entity and bumps its etag.
    pub fn annotate(&self, id: u64, key: &str, value: &str) {
        if let Some(mut entity) = self.replication.get(id) {
            entity.annotations.insert(key.to_string(), value.to_string());
            self.replication.upsert(entity);
            self.touch(id);
        }
    }

    /// Builds a regular tree under the root.
    pub fn build_hierarchy(&self, shape: HierarchyShape) -> Hierarchy {
        let mut hierarchy = Hierarchy::default();
        for _ in 0..shape.projects {
            let project = self.add(self.root(), EntityType::Project);
            hierarchy.projects.push(project);
            for _ in 0..shape.files_per_folder {
                hierarchy.files.push(self.add(project, EntityType::File));
            }
            for _ in 0..shape.folders_per_project {
                let folder = self.add(project, EntityType::Folder);
                hierarchy.folders.push(folder);
                for _ in 0..shape.files_per_folder {
                    hierarchy.files.push(self.add(folder, EntityType::File));
                }
            }
        }
        hierarchy
    }

    /// Adds a view under `parent_id` whose columns are the defaults for `mask`.
    ///
    /// The returned status is PROCESSING and an update message is queued.
    pub fn create_view(
        &self,
        parent_id: u64,
        scope: impl IntoIterator<Item = u64>,
        mask: ViewTypeMask,
    ) -> IndexResult<(ObjectId, TableStatus)> {
        let view_id = self.next_id();
        self.truth
            .add_node(view_id, Some(parent_id), EntityType::EntityView);
        let views = self.service.views();
        let column_ids: Vec<String> = views
            .default_view_columns(mask)?
            .into_iter()
            .map(|column| column.id)
            .collect();
        let status =
            views.set_view_schema_and_scope(view_id, &column_ids, &ViewScope::new(scope, mask))?;
        Ok((ObjectId::latest(view_id), status))
    }

    /// Adds a row table under `parent_id`, optionally with applied changes.
    pub fn create_table(&self, parent_id: u64, last_change: Option<u64>) -> ObjectId {
        let table_id = self.next_id();
        self.truth
            .add_node(table_id, Some(parent_id), EntityType::Table);
        if let Some(change) = last_change {
            self.truth.set_last_change_number(table_id, change);
        }
        ObjectId::latest(table_id)
    }

    /// A worker subscribed to every message published from now on.
    pub fn worker(&self) -> IndexWorker {
        self.worker_with_retry(RetryConfig::no_retry())
    }

    /// A worker with a custom retry policy.
    pub fn worker_with_retry(&self, retry: RetryConfig) -> IndexWorker {
        IndexWorker::new(Arc::clone(&self.service), self.feed.subscribe(), retry)
    }

    /// A raw subscription to the change feed.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn clock_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}

impl Default for TestDeployment {
    fn default() -> Self {
        Self::new()
    }
}

/// Dimensions of a generated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyShape {
    /// Projects under the root.
    pub projects: usize,
    /// Folders directly under each project.
    pub folders_per_project: usize,
    /// Files in each project and in each folder.
    pub files_per_folder: usize,
}

impl HierarchyShape {
    /// Creates a shape.
    pub const fn new(projects: usize, folders_per_project: usize, files_per_folder: usize) -> Self {
        Self {
            projects,
            folders_per_project,
            files_per_folder,
        }
    }

    /// Number of containers (projects and folders).
    pub fn containers(&self) -> usize {
        self.projects * (1 + self.folders_per_project)
    }

    /// Number of files.
    pub fn files(&self) -> usize {
        self.containers() * self.files_per_folder
    }
}

/// Ids created by [`TestDeployment::build_hierarchy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    /// Project ids, in creation order.
    pub projects: Vec<u64>,
    /// Folder ids, in creation order.
    pub folders: Vec<u64>,
    /// File ids, in creation order.
    pub files: Vec<u64>,
}

impl Hierarchy {
    /// Every container id.
    pub fn containers(&self) -> Vec<u64> {
        self.projects
            .iter()
            .chain(self.folders.iter())
            .copied()
            .collect()
    }
}

/// The root id [`TestDeployment::new`] uses.
pub const ROOT: u64 = DEFAULT_ROOT_CONTAINER_ID;
