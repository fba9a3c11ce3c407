//! In-memory column bindings and view scopes.

use crate::column::ColumnModel;
use crate::error::{IndexError, IndexResult};
use crate::truth::SchemaStore;
use crate::types::{ObjectId, ViewScope};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Schemas {
    models: HashMap<String, ColumnModel>,
    by_template: HashMap<ColumnModel, String>,
    bindings: HashMap<ObjectId, Vec<String>>,
    scopes: HashMap<u64, ViewScope>,
    next_column_id: u64,
}

/// An in-memory [`SchemaStore`].
#[derive(Default)]
pub struct MemorySchemaStore {
    inner: RwLock<Schemas>,
}

impl MemorySchemaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds columns to a specific version of an object.
    pub fn bind_version(&self, object_id: ObjectId, column_ids: Vec<String>) {
        self.inner.write().bindings.insert(object_id, column_ids);
    }

    /// Number of stored column models.
    pub fn column_model_count(&self) -> usize {
        self.inner.read().models.len()
    }
}

impl SchemaStore for MemorySchemaStore {
    fn column_ids(&self, object_id: &ObjectId) -> IndexResult<Vec<String>> {
        let inner = self.inner.read();
        Ok(inner
            .bindings
            .get(object_id)
            .or_else(|| inner.bindings.get(&ObjectId::latest(object_id.id)))
            .cloned()
            .unwrap_or_default())
    }

    fn column_models(&self, object_id: &ObjectId) -> IndexResult<Vec<ColumnModel>> {
        let ids = self.column_ids(object_id)?;
        let inner = self.inner.read();
        ids.iter()
            .map(|id| {
                inner
                    .models
                    .get(id)
                    .cloned()
                    .ok_or_else(|| IndexError::not_found(format!("column {id}")))
            })
            .collect()
    }

    fn bind_columns(&self, id: u64, column_ids: &[String]) -> IndexResult<Vec<ColumnModel>> {
        let mut inner = self.inner.write();
        let models = column_ids
            .iter()
            .map(|column_id| {
                inner
                    .models
                    .get(column_id)
                    .cloned()
                    .ok_or_else(|| IndexError::not_found(format!("column {column_id}")))
            })
            .collect::<IndexResult<Vec<_>>>()?;
        inner
            .bindings
            .insert(ObjectId::latest(id), column_ids.to_vec());
        Ok(models)
    }

    fn create_column_model(&self, template: &ColumnModel) -> IndexResult<ColumnModel> {
        let key = template.clone().with_id("");
        let mut inner = self.inner.write();
        if let Some(id) = inner.by_template.get(&key) {
            return Ok(key.with_id(id.clone()));
        }
        inner.next_column_id += 1;
        let id = inner.next_column_id.to_string();
        let model = key.clone().with_id(id.clone());
        inner.models.insert(id.clone(), model.clone());
        inner.by_template.insert(key, id);
        Ok(model)
    }

    fn view_scope(&self, id: u64) -> IndexResult<Option<ViewScope>> {
        Ok(self.inner.read().scopes.get(&id).cloned())
    }

    fn set_view_scope(&self, id: u64, scope: &ViewScope) -> IndexResult<()> {
        self.inner.write().scopes.insert(id, scope.clone());
        Ok(())
    }

    fn find_views_intersecting(&self, container_ids: &[u64]) -> IndexResult<HashSet<u64>> {
        Ok(self
            .inner
            .read()
            .scopes
            .iter()
            .filter(|(_, scope)| container_ids.iter().any(|id| scope.container_ids.contains(id)))
            .map(|(view_id, _)| *view_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::types::ViewTypeMask;

    #[test]
    fn create_is_idempotent() {
        let store = MemorySchemaStore::new();
        let template = ColumnModel::template("a", ColumnType::String).with_max_size(10);
        let first = store.create_column_model(&template).unwrap();
        let second = store.create_column_model(&template).unwrap();
        assert_eq!(first, second);
        assert!(!first.id.is_empty());
        assert_eq!(store.column_model_count(), 1);
    }

    #[test]
    fn binding_unknown_column_fails() {
        let store = MemorySchemaStore::new();
        let err = store.bind_columns(1, &["42".to_string()]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn snapshot_falls_back_to_latest_binding() {
        let store = MemorySchemaStore::new();
        let a = store
            .create_column_model(&ColumnModel::template("a", ColumnType::Integer))
            .unwrap();
        store.bind_columns(1, &[a.id.clone()]).unwrap();
        assert_eq!(store.column_ids(&ObjectId::versioned(1, 3)).unwrap(), vec![a.id.clone()]);
        store.bind_version(ObjectId::versioned(1, 3), Vec::new());
        assert!(store.column_ids(&ObjectId::versioned(1, 3)).unwrap().is_empty());
        assert_eq!(store.column_models(&ObjectId::latest(1)).unwrap(), vec![a]);
    }

    #[test]
    fn finds_views_by_container() {
        let store = MemorySchemaStore::new();
        store
            .set_view_scope(10, &ViewScope::new([1, 2], ViewTypeMask::FILE))
            .unwrap();
        store
            .set_view_scope(11, &ViewScope::new([3], ViewTypeMask::FILE))
            .unwrap();
        assert_eq!(
            store.find_views_intersecting(&[4489, 2, 5]).unwrap(),
            HashSet::from([10])
        );
    }
}
