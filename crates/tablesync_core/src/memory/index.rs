//! In-memory index store.

use crate::column::ColumnModel;
use crate::error::{IndexError, IndexResult};
use crate::index_store::{IndexRow, IndexStore};
use crate::types::ObjectId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

struct IndexTable {
    schema: Vec<ColumnModel>,
    rows: BTreeMap<u64, IndexRow>,
    optimized: bool,
}

/// An in-memory [`IndexStore`].
#[derive(Default)]
pub struct MemoryIndexStore {
    tables: RwLock<HashMap<ObjectId, IndexTable>>,
}

impl MemoryIndexStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if secondary indices were built since the schema was set.
    pub fn is_optimized(&self, object_id: &ObjectId) -> bool {
        self.tables
            .read()
            .get(object_id)
            .map(|table| table.optimized)
            .unwrap_or(false)
    }

    /// Number of rows in an index; zero if it does not exist.
    pub fn row_count(&self, object_id: &ObjectId) -> usize {
        self.tables
            .read()
            .get(object_id)
            .map(|table| table.rows.len())
            .unwrap_or(0)
    }
}

impl IndexStore for MemoryIndexStore {
    fn delete_index(&self, object_id: &ObjectId) -> IndexResult<()> {
        self.tables.write().remove(object_id);
        Ok(())
    }

    fn set_index_schema(&self, object_id: &ObjectId, schema: &[ColumnModel]) -> IndexResult<()> {
        let mut tables = self.tables.write();
        if let Some(table) = tables.get(object_id) {
            if table.schema == schema {
                return Ok(());
            }
        }
        tables.insert(
            *object_id,
            IndexTable {
                schema: schema.to_vec(),
                rows: BTreeMap::new(),
                optimized: false,
            },
        );
        Ok(())
    }

    fn append_rows(&self, object_id: &ObjectId, rows: Vec<IndexRow>) -> IndexResult<u64> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(object_id)
            .ok_or_else(|| IndexError::Index(format!("no index exists for {object_id}")))?;
        let count = rows.len() as u64;
        for row in rows {
            table.rows.insert(row.row_id, row);
        }
        table.optimized = false;
        Ok(count)
    }

    fn optimize_indices(&self, object_id: &ObjectId) -> IndexResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(object_id)
            .ok_or_else(|| IndexError::Index(format!("no index exists for {object_id}")))?;
        table.optimized = true;
        Ok(())
    }

    fn index_exists(&self, object_id: &ObjectId) -> IndexResult<bool> {
        Ok(self.tables.read().contains_key(object_id))
    }

    fn index_schema(&self, object_id: &ObjectId) -> IndexResult<Option<Vec<ColumnModel>>> {
        Ok(self
            .tables
            .read()
            .get(object_id)
            .map(|table| table.schema.clone()))
    }

    fn rows(&self, object_id: &ObjectId) -> IndexResult<Option<Vec<IndexRow>>> {
        Ok(self
            .tables
            .read()
            .get(object_id)
            .map(|table| table.rows.values().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u64) -> IndexRow {
        IndexRow {
            row_id: id,
            etag: format!("e{id}"),
            benefactor_id: 1,
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn append_requires_schema() {
        let store = MemoryIndexStore::new();
        let id = ObjectId::latest(1);
        assert!(matches!(
            store.append_rows(&id, vec![row(1)]),
            Err(IndexError::Index(_))
        ));
        store.set_index_schema(&id, &[]).unwrap();
        assert_eq!(store.append_rows(&id, vec![row(3), row(2)]).unwrap(), 2);
        let ids: Vec<u64> = store.rows(&id).unwrap().unwrap().iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryIndexStore::new();
        let id = ObjectId::latest(1);
        store.delete_index(&id).unwrap();
        store.set_index_schema(&id, &[]).unwrap();
        store.optimize_indices(&id).unwrap();
        assert!(store.is_optimized(&id));
        store.delete_index(&id).unwrap();
        store.delete_index(&id).unwrap();
        assert!(!store.index_exists(&id).unwrap());
        assert_eq!(store.rows(&id).unwrap(), None);
    }
}
