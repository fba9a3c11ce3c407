//! Column models and the entity fields every view can expose.

use serde::{Deserialize, Serialize};

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    /// Bounded string.
    String,
    /// 64-bit integer.
    Integer,
    /// Epoch milliseconds.
    Date,
    /// Entity id.
    EntityId,
    /// User id.
    UserId,
    /// File handle id.
    FileHandleId,
}

/// A column definition.
///
/// `id` is assigned by the schema store; a template model (not yet stored)
/// has an empty id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnModel {
    /// Stable column id.
    pub id: String,
    /// Column name.
    pub name: String,
    /// Value type.
    pub column_type: ColumnType,
    /// Maximum string size, for string columns.
    pub max_size: Option<u32>,
}

impl ColumnModel {
    /// Creates a template column with no id.
    pub fn template(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            column_type,
            max_size: None,
        }
    }

    /// Sets the maximum size.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Returns a copy carrying the given id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Metadata fields of a replicated entity that views may expose as columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EntityField {
    Id,
    Name,
    CreatedOn,
    CreatedBy,
    Etag,
    Type,
    CurrentVersion,
    ParentId,
    BenefactorId,
    ProjectId,
    ModifiedOn,
    ModifiedBy,
    DataFileHandleId,
}

/// Default columns of views that include files.
pub const FILE_VIEW_DEFAULT_COLUMNS: &[EntityField] = &[
    EntityField::Id,
    EntityField::Name,
    EntityField::CreatedOn,
    EntityField::CreatedBy,
    EntityField::Etag,
    EntityField::Type,
    EntityField::CurrentVersion,
    EntityField::ParentId,
    EntityField::BenefactorId,
    EntityField::ProjectId,
    EntityField::ModifiedOn,
    EntityField::ModifiedBy,
    EntityField::DataFileHandleId,
];

/// Default columns of views that exclude files.
pub const BASIC_ENTITY_DEFAULT_COLUMNS: &[EntityField] = &[
    EntityField::Id,
    EntityField::Name,
    EntityField::CreatedOn,
    EntityField::CreatedBy,
    EntityField::Etag,
    EntityField::ModifiedOn,
    EntityField::ModifiedBy,
];

/// Fields every view index carries even when its schema omits them.
pub const IMPLICIT_VIEW_FIELDS: &[EntityField] =
    &[EntityField::Id, EntityField::Etag, EntityField::BenefactorId];

impl EntityField {
    /// All fields.
    pub const ALL: &'static [EntityField] = FILE_VIEW_DEFAULT_COLUMNS;

    /// The column name of this field.
    pub fn column_name(&self) -> &'static str {
        match self {
            EntityField::Id => "id",
            EntityField::Name => "name",
            EntityField::CreatedOn => "createdOn",
            EntityField::CreatedBy => "createdBy",
            EntityField::Etag => "etag",
            EntityField::Type => "type",
            EntityField::CurrentVersion => "currentVersion",
            EntityField::ParentId => "parentId",
            EntityField::BenefactorId => "benefactorId",
            EntityField::ProjectId => "projectId",
            EntityField::ModifiedOn => "modifiedOn",
            EntityField::ModifiedBy => "modifiedBy",
            EntityField::DataFileHandleId => "dataFileHandleId",
        }
    }

    /// The template column model of this field.
    pub fn column_model(&self) -> ColumnModel {
        let name = self.column_name();
        match self {
            EntityField::Id | EntityField::ParentId | EntityField::BenefactorId | EntityField::ProjectId => {
                ColumnModel::template(name, ColumnType::EntityId)
            }
            EntityField::Name => ColumnModel::template(name, ColumnType::String).with_max_size(256),
            EntityField::Etag => ColumnModel::template(name, ColumnType::String).with_max_size(36),
            EntityField::Type => ColumnModel::template(name, ColumnType::String).with_max_size(20),
            EntityField::CreatedOn | EntityField::ModifiedOn => {
                ColumnModel::template(name, ColumnType::Date)
            }
            EntityField::CreatedBy | EntityField::ModifiedBy => {
                ColumnModel::template(name, ColumnType::UserId)
            }
            EntityField::CurrentVersion => ColumnModel::template(name, ColumnType::Integer),
            EntityField::DataFileHandleId => ColumnModel::template(name, ColumnType::FileHandleId),
        }
    }

    /// Finds the field a column represents, matching on name and type.
    pub fn find_match(column: &ColumnModel) -> Option<EntityField> {
        Self::ALL.iter().copied().find(|field| {
            let template = field.column_model();
            template.name == column.name && template.column_type == column.column_type
        })
    }
}
