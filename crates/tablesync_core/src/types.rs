//! Core type definitions.

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Message used when the Project bit is combined with other mask bits.
pub const PROJECT_TYPE_CANNOT_BE_COMBINED_WITH_ANY_OTHER_TYPE: &str =
    "The Project type cannot be combined with any other type.";

/// Identifier of a table or view, optionally pinned to a snapshot version.
///
/// `version == None` addresses the latest (mutable) state of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// Entity id.
    pub id: u64,
    /// Snapshot version, if any.
    pub version: Option<u64>,
}

impl ObjectId {
    /// Creates an id addressing the latest version.
    #[must_use]
    pub const fn latest(id: u64) -> Self {
        Self { id, version: None }
    }

    /// Creates an id addressing a snapshot version.
    #[must_use]
    pub const fn versioned(id: u64, version: u64) -> Self {
        Self {
            id,
            version: Some(version),
        }
    }

    /// Returns true if this id addresses a snapshot.
    #[must_use]
    pub const fn is_snapshot(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "syn{}.{}", self.id, version),
            None => write!(f, "syn{}", self.id),
        }
    }
}

impl FromStr for ObjectId {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("syn")
            .or_else(|| trimmed.strip_prefix("SYN"))
            .unwrap_or(trimmed);
        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| IndexError::invalid_argument(format!("invalid object id: '{s}'")))
        };
        match body.split_once('.') {
            Some((id, version)) => Ok(Self::versioned(parse(id)?, parse(version)?)),
            None => Ok(Self::latest(parse(body)?)),
        }
    }
}

/// Type of a node in the truth store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A project (top-level container).
    Project,
    /// A folder (nested container).
    Folder,
    /// A file.
    File,
    /// A row table.
    Table,
    /// A view over replicated entity metadata.
    EntityView,
    /// A docker repository.
    DockerRepo,
}

impl EntityType {
    /// Returns true for entities that can have children.
    pub fn is_container(&self) -> bool {
        matches!(self, EntityType::Project | EntityType::Folder)
    }

    /// The view mask bit that selects this entity type.
    pub fn mask_bit(&self) -> ViewTypeMask {
        match self {
            EntityType::Project => ViewTypeMask::PROJECT,
            EntityType::Folder => ViewTypeMask::FOLDER,
            EntityType::File => ViewTypeMask::FILE,
            EntityType::Table => ViewTypeMask::TABLE,
            EntityType::EntityView => ViewTypeMask::VIEW,
            EntityType::DockerRepo => ViewTypeMask::DOCKER_REPO,
        }
    }
}

/// The two kinds of indexed objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    /// A table whose rows are applied from its own change log.
    #[serde(rename = "TABLE")]
    RowTable,
    /// A view populated from the replication store.
    #[serde(rename = "ENTITY_VIEW")]
    ReplicationView,
}

impl TableKind {
    /// Maps a node type to a table kind.
    pub fn from_entity_type(entity_type: EntityType) -> IndexResult<Self> {
        match entity_type {
            EntityType::Table => Ok(TableKind::RowTable),
            EntityType::EntityView => Ok(TableKind::ReplicationView),
            other => Err(IndexError::invalid_argument(format!(
                "unknown table type: {other:?}"
            ))),
        }
    }

    /// Returns true for replication views.
    pub fn is_view(&self) -> bool {
        matches!(self, TableKind::ReplicationView)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::RowTable => write!(f, "TABLE"),
            TableKind::ReplicationView => write!(f, "ENTITY_VIEW"),
        }
    }
}

/// Bitset selecting which entity types a view includes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewTypeMask(u64);

impl ViewTypeMask {
    /// Files.
    pub const FILE: Self = Self(0x01);
    /// Projects.
    pub const PROJECT: Self = Self(0x02);
    /// Tables.
    pub const TABLE: Self = Self(0x04);
    /// Folders.
    pub const FOLDER: Self = Self(0x08);
    /// Views.
    pub const VIEW: Self = Self(0x10);
    /// Docker repositories.
    pub const DOCKER_REPO: Self = Self(0x20);

    const ALL_BITS: u64 = 0x3F;

    /// Creates a mask from raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Returns true if the mask is exactly Project.
    pub const fn is_project_only(&self) -> bool {
        self.0 == Self::PROJECT.0
    }

    /// Returns true if the mask selects the given entity type.
    pub fn includes(&self, entity_type: EntityType) -> bool {
        self.contains(entity_type.mask_bit())
    }

    /// Checks the mask is non-empty, known, and does not mix Project with other types.
    pub fn validate(&self) -> IndexResult<()> {
        if self.0 == 0 {
            return Err(IndexError::invalid_argument("view type mask must not be empty"));
        }
        if self.0 & !Self::ALL_BITS != 0 {
            return Err(IndexError::invalid_argument(format!(
                "unknown view type mask bits: {:#x}",
                self.0
            )));
        }
        if self.0 & Self::PROJECT.0 != 0 && !self.is_project_only() {
            return Err(IndexError::invalid_argument(
                PROJECT_TYPE_CANNOT_BE_COMBINED_WITH_ANY_OTHER_TYPE,
            ));
        }
        Ok(())
    }
}

impl std::ops::BitOr for ViewTypeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ViewTypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewTypeMask({:#x})", self.0)
    }
}

/// The defining scope of a view: its containers and type mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewScope {
    /// Container ids listed by the view's owner.
    pub container_ids: HashSet<u64>,
    /// Entity types included in the view.
    pub type_mask: ViewTypeMask,
}

impl ViewScope {
    /// Creates a scope.
    pub fn new(container_ids: impl IntoIterator<Item = u64>, type_mask: ViewTypeMask) -> Self {
        Self {
            container_ids: container_ids.into_iter().collect(),
            type_mask,
        }
    }
}

/// The resolved, deduplicated set of containers a view draws rows from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerSet(HashSet<u64>);

impl ContainerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Number of containers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the container is in the set.
    pub fn contains(&self, id: u64) -> bool {
        self.0.contains(&id)
    }

    /// Adds a container; returns false if it was already present.
    pub fn insert(&mut self, id: u64) -> bool {
        self.0.insert(id)
    }

    /// Iterates over the containers in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    /// Returns the containers in ascending order.
    pub fn to_sorted_vec(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.0.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Borrows the underlying set.
    pub fn as_set(&self) -> &HashSet<u64> {
        &self.0
    }
}

impl FromIterator<u64> for ContainerSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<HashSet<u64>> for ContainerSet {
    fn from(set: HashSet<u64>) -> Self {
        Self(set)
    }
}
