//! Replication store abstraction.
//!
//! The replication store is an eventually consistent, denormalized copy of
//! entity metadata. Views are materialized by copying the replicated rows
//! that fall within their container set.

use crate::column::{ColumnModel, EntityField};
use crate::error::IndexResult;
use crate::fingerprint::VersionFingerprint;
use crate::index_store::{IndexRow, IndexStore};
use crate::types::{ContainerSet, EntityType, ObjectId, ViewTypeMask};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replicated metadata of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatedEntity {
    /// Entity id.
    pub id: u64,
    /// Current version.
    pub current_version: u64,
    /// Parent container.
    pub parent_id: u64,
    /// Entity whose ACL applies.
    pub benefactor_id: u64,
    /// Owning project.
    pub project_id: u64,
    /// Node type.
    pub entity_type: EntityType,
    /// Name.
    pub name: String,
    /// Concurrency tag, changes on every update.
    pub etag: String,
    /// Creation time (epoch millis).
    pub created_on: u64,
    /// Creator.
    pub created_by: u64,
    /// Last modification time (epoch millis).
    pub modified_on: u64,
    /// Last modifier.
    pub modified_by: u64,
    /// File handle, for files.
    pub data_file_handle_id: Option<u64>,
    /// User annotations by name.
    pub annotations: BTreeMap<String, String>,
}

impl ReplicatedEntity {
    /// Returns the value of an entity field.
    pub fn field_value(&self, field: EntityField) -> Option<String> {
        match field {
            EntityField::Id => Some(self.id.to_string()),
            EntityField::Name => Some(self.name.clone()),
            EntityField::CreatedOn => Some(self.created_on.to_string()),
            EntityField::CreatedBy => Some(self.created_by.to_string()),
            EntityField::Etag => Some(self.etag.clone()),
            EntityField::Type => Some(format!("{:?}", self.entity_type).to_lowercase()),
            EntityField::CurrentVersion => Some(self.current_version.to_string()),
            EntityField::ParentId => Some(self.parent_id.to_string()),
            EntityField::BenefactorId => Some(self.benefactor_id.to_string()),
            EntityField::ProjectId => Some(self.project_id.to_string()),
            EntityField::ModifiedOn => Some(self.modified_on.to_string()),
            EntityField::ModifiedBy => Some(self.modified_by.to_string()),
            EntityField::DataFileHandleId => self.data_file_handle_id.map(|id| id.to_string()),
        }
    }

    /// Returns the value this entity contributes to a column.
    ///
    /// Columns matching an entity field read the field; every other column
    /// reads the annotation of the same name.
    pub fn value_for(&self, column: &ColumnModel) -> Option<String> {
        match EntityField::find_match(column) {
            Some(field) => self.field_value(field),
            None => self.annotations.get(&column.name).cloned(),
        }
    }

    /// Returns true if the entity belongs in a view with this scope.
    ///
    /// Project views select the listed projects themselves; every other view
    /// selects children of the listed containers whose type is in the mask.
    pub fn is_in_view_scope(&self, containers: &ContainerSet, mask: ViewTypeMask) -> bool {
        if mask.is_project_only() {
            self.entity_type == EntityType::Project && containers.contains(self.id)
        } else {
            mask.includes(self.entity_type) && containers.contains(self.parent_id)
        }
    }

    /// Builds the index row for a schema.
    pub fn to_index_row(&self, schema: &[ColumnModel]) -> IndexRow {
        IndexRow {
            row_id: self.id,
            etag: self.etag.clone(),
            benefactor_id: self.benefactor_id,
            values: schema
                .iter()
                .map(|column| (column.id.clone(), self.value_for(column)))
                .collect(),
        }
    }
}

/// Access to the replicated entity metadata.
pub trait ReplicationStore: Send + Sync {
    /// Copies every row within `containers` and `mask` into the index of
    /// `target_id`, projecting onto `schema`. Returns the number of rows copied.
    fn populate(
        &self,
        target: &dyn IndexStore,
        target_id: &ObjectId,
        containers: &ContainerSet,
        mask: ViewTypeMask,
        schema: &[ColumnModel],
    ) -> IndexResult<u64>;

    /// Computes the content CRC of the rows within `containers` and `mask`.
    fn compute_crc(&self, containers: &ContainerSet, mask: ViewTypeMask)
        -> IndexResult<VersionFingerprint>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;

    fn file(id: u64, parent_id: u64) -> ReplicatedEntity {
        ReplicatedEntity {
            id,
            current_version: 1,
            parent_id,
            benefactor_id: parent_id,
            project_id: parent_id,
            entity_type: EntityType::File,
            name: format!("file-{id}"),
            etag: format!("etag-{id}"),
            created_on: 10,
            created_by: 1,
            modified_on: 20,
            modified_by: 2,
            data_file_handle_id: Some(900 + id),
            annotations: BTreeMap::from([("species".to_string(), "mouse".to_string())]),
        }
    }

    #[test]
    fn file_scope_selects_children_of_listed_containers() {
        let containers: ContainerSet = vec![1, 2].into_iter().collect();
        assert!(file(10, 1).is_in_view_scope(&containers, ViewTypeMask::FILE));
        assert!(!file(11, 3).is_in_view_scope(&containers, ViewTypeMask::FILE));
        assert!(!file(10, 1).is_in_view_scope(&containers, ViewTypeMask::FOLDER));
    }

    #[test]
    fn project_scope_selects_listed_projects() {
        let containers: ContainerSet = vec![5].into_iter().collect();
        let mut project = file(5, 4489);
        project.entity_type = EntityType::Project;
        assert!(project.is_in_view_scope(&containers, ViewTypeMask::PROJECT));
        project.id = 6;
        assert!(!project.is_in_view_scope(&containers, ViewTypeMask::PROJECT));
    }

    #[test]
    fn row_projects_fields_and_annotations() {
        let schema = vec![
            EntityField::Name.column_model().with_id("1"),
            ColumnModel::template("species", ColumnType::String).with_id("2"),
            ColumnModel::template("missing", ColumnType::String).with_id("3"),
        ];
        let row = file(10, 1).to_index_row(&schema);
        assert_eq!(row.row_id, 10);
        assert_eq!(row.etag, "etag-10");
        assert_eq!(row.values["1"], Some("file-10".to_string()));
        assert_eq!(row.values["2"], Some("mouse".to_string()));
        assert_eq!(row.values["3"], None);
    }

    #[test]
    fn type_field_is_lowercase() {
        assert_eq!(
            file(1, 1).field_value(EntityField::Type),
            Some("file".to_string())
        );
    }
}
