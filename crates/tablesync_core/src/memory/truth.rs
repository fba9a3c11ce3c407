//! In-memory entity graph.

use crate::error::{IndexError, IndexResult};
use crate::hierarchy::ContainerHierarchy;
use crate::truth::TruthStore;
use crate::types::{ContainerSet, EntityType, ObjectId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone)]
struct Node {
    parent_id: Option<u64>,
    entity_type: EntityType,
    trashed: bool,
    children: Vec<u64>,
}

#[derive(Default)]
struct Graph {
    nodes: HashMap<u64, Node>,
    last_change: HashMap<u64, u64>,
    snapshot_change: HashMap<(u64, u64), u64>,
}

/// An in-memory [`TruthStore`] and [`ContainerHierarchy`].
#[derive(Default)]
pub struct MemoryTruthStore {
    graph: RwLock<Graph>,
}

impl MemoryTruthStore {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent_id` (or a root when `None`).
    pub fn add_node(&self, id: u64, parent_id: Option<u64>, entity_type: EntityType) {
        let mut graph = self.graph.write();
        if let Some(parent) = parent_id {
            if let Some(node) = graph.nodes.get_mut(&parent) {
                node.children.push(id);
            }
        }
        graph.nodes.insert(
            id,
            Node {
                parent_id,
                entity_type,
                trashed: false,
                children: Vec::new(),
            },
        );
    }

    /// Moves a node to or from the trash.
    pub fn set_trashed(&self, id: u64, trashed: bool) {
        if let Some(node) = self.graph.write().nodes.get_mut(&id) {
            node.trashed = trashed;
        }
    }

    /// Removes a node; its children are left orphaned.
    pub fn remove_node(&self, id: u64) {
        let mut graph = self.graph.write();
        if let Some(node) = graph.nodes.remove(&id) {
            if let Some(parent) = node.parent_id.and_then(|p| graph.nodes.get_mut(&p)) {
                parent.children.retain(|child| *child != id);
            }
        }
        graph.last_change.remove(&id);
    }

    /// Records a change applied to a row table.
    pub fn set_last_change_number(&self, id: u64, change_number: u64) {
        self.graph.write().last_change.insert(id, change_number);
    }

    /// Records the last change at or before a snapshot version.
    pub fn set_snapshot_change_number(&self, id: u64, version: u64, change_number: u64) {
        self.graph
            .write()
            .snapshot_change
            .insert((id, version), change_number);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.read().nodes.len()
    }

    /// Returns true if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TruthStore for MemoryTruthStore {
    fn node_type(&self, id: u64) -> IndexResult<Option<EntityType>> {
        Ok(self.graph.read().nodes.get(&id).map(|node| node.entity_type))
    }

    fn is_available(&self, id: u64) -> IndexResult<bool> {
        Ok(self
            .graph
            .read()
            .nodes
            .get(&id)
            .map(|node| !node.trashed)
            .unwrap_or(false))
    }

    fn exists(&self, id: u64) -> IndexResult<bool> {
        Ok(self.graph.read().nodes.contains_key(&id))
    }

    fn entity_path(&self, id: u64) -> IndexResult<Vec<u64>> {
        let graph = self.graph.read();
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = graph
                .nodes
                .get(&node_id)
                .ok_or_else(|| IndexError::not_found(format!("syn{node_id}")))?;
            if path.contains(&node_id) {
                return Err(IndexError::Store(format!("cycle in entity path of syn{id}")));
            }
            path.push(node_id);
            current = node.parent_id;
        }
        path.reverse();
        Ok(path)
    }

    fn last_change_number(&self, object_id: &ObjectId) -> IndexResult<Option<u64>> {
        let graph = self.graph.read();
        Ok(match object_id.version {
            Some(version) => graph.snapshot_change.get(&(object_id.id, version)).copied(),
            None => graph.last_change.get(&object_id.id).copied(),
        })
    }
}

impl ContainerHierarchy for MemoryTruthStore {
    fn expand_descendants(
        &self,
        container_ids: &HashSet<u64>,
        limit: usize,
    ) -> IndexResult<ContainerSet> {
        let graph = self.graph.read();
        let mut result = ContainerSet::new();
        let mut queue: VecDeque<u64> = container_ids.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !result.insert(id) {
                continue;
            }
            if result.len() > limit {
                return Err(IndexError::LimitExceeded(format!(
                    "container expansion exceeds {limit}"
                )));
            }
            if let Some(node) = graph.nodes.get(&id) {
                queue.extend(
                    node.children
                        .iter()
                        .copied()
                        .filter(|child| {
                            graph
                                .nodes
                                .get(child)
                                .map(|c| c.entity_type.is_container())
                                .unwrap_or(false)
                        }),
                );
            }
        }
        Ok(result)
    }
}
