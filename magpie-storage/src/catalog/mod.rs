use crate::buffer::pool::BufferPool;
use crate::error::Result;
use crate::index::{HashIndex, Index};
use crate::table::TableHeap;
use crate::trie::Trie;
use magpie_catalog::{IndexOid, Schema, TableOid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the executors need to touch a table.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Schema,
    pub heap: Arc<TableHeap>,
}

/// Everything the executors need to touch an index.
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub key_schema: Schema,
    pub key_attrs: Vec<usize>,
    pub index: Arc<dyn Index>,
}

/// Runtime catalog: tables and indexes, constructed once per engine and
/// handed around by reference.
///
/// The name map is a persistent trie, so `table_names()` returns an
/// immutable snapshot of the namespace at one pointer copy.
pub struct Catalog {
    pool: Arc<BufferPool>,
    inner: Mutex<CatalogInner>,
}

struct CatalogInner {
    next_table_oid: TableOid,
    next_index_oid: IndexOid,
    tables: HashMap<TableOid, Arc<TableInfo>>,
    /// name -> TableOid, copy-on-write.
    table_names: Trie,
    indexes: HashMap<IndexOid, Arc<IndexInfo>>,
    /// table name -> index name -> oid.
    index_names: HashMap<String, HashMap<String, IndexOid>>,
}

impl Catalog {
    pub fn new(pool: Arc<BufferPool>) -> Arc<Self> {
        Arc::new(Catalog {
            pool,
            inner: Mutex::new(CatalogInner {
                next_table_oid: 0,
                next_index_oid: 0,
                tables: HashMap::new(),
                table_names: Trie::new(),
                indexes: HashMap::new(),
                index_names: HashMap::new(),
            }),
        })
    }

    /// Creates a table with a fresh heap. Returns `None` when the name
    /// is taken.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Option<Arc<TableInfo>>> {
        let mut inner = self.inner.lock();
        if inner.table_names.get::<TableOid>(name).is_some() {
            return Ok(None);
        }
        let heap = Arc::new(TableHeap::new(Arc::clone(&self.pool))?);
        let oid = inner.next_table_oid;
        inner.next_table_oid += 1;
        let info = Arc::new(TableInfo {
            oid,
            name: name.to_string(),
            schema,
            heap,
        });
        inner.tables.insert(oid, Arc::clone(&info));
        inner.table_names = inner.table_names.put(name, oid);
        inner.index_names.entry(name.to_string()).or_default();
        log::debug!("create table {name} oid={oid}");
        Ok(Some(info))
    }

    pub fn table_info(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.inner.lock().tables.get(&oid).cloned()
    }

    pub fn table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let inner = self.inner.lock();
        let oid = *inner.table_names.get::<TableOid>(name)?;
        inner.tables.get(&oid).cloned()
    }

    /// Immutable snapshot of the name -> oid map.
    pub fn table_names(&self) -> Trie {
        self.inner.lock().table_names.clone()
    }

    pub fn tables(&self) -> Vec<Arc<TableInfo>> {
        self.inner.lock().tables.values().cloned().collect()
    }

    /// Creates a hash index over `key_attrs` of `table_name`. Returns
    /// `None` when the table is missing or the index name is taken.
    /// The index starts empty; only subsequent writes maintain it.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Option<Arc<IndexInfo>> {
        let mut inner = self.inner.lock();
        let table_oid = *inner.table_names.get::<TableOid>(table_name)?;
        let table = inner.tables.get(&table_oid).cloned()?;
        if inner
            .index_names
            .get(table_name)
            .is_some_and(|names| names.contains_key(index_name))
        {
            return None;
        }
        let oid = inner.next_index_oid;
        inner.next_index_oid += 1;
        let key_schema = table.schema.project(&key_attrs);
        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index: Arc::new(HashIndex::new()),
        });
        inner
            .index_names
            .entry(table_name.to_string())
            .or_default()
            .insert(index_name.to_string(), oid);
        inner.indexes.insert(oid, Arc::clone(&info));
        log::debug!("create index {index_name} on {table_name} oid={oid}");
        Some(info)
    }

    pub fn index_info(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.inner.lock().indexes.get(&oid).cloned()
    }

    /// All indexes on `table_name`.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let inner = self.inner.lock();
        match inner.index_names.get(table_name) {
            None => vec![],
            Some(names) => names
                .values()
                .filter_map(|oid| inner.indexes.get(oid).cloned())
                .collect(),
        }
    }

    /// Finds an index keyed on exactly `[col_idx]`, for the
    /// seq-scan-to-index-scan rewrite.
    pub fn match_index(&self, table_name: &str, col_idx: usize) -> Option<Arc<IndexInfo>> {
        self.table_indexes(table_name)
            .into_iter()
            .find(|info| info.key_attrs == [col_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DiskManager;
    use magpie_catalog::Column;
    use magpie_datatype::TypeId;
    use tempfile::TempDir;

    fn catalog() -> (TempDir, Arc<Catalog>) {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let pool = BufferPool::new(16, 2, disk);
        (dir, Catalog::new(pool))
    }

    fn two_col_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", TypeId::Integer),
            Column::new("v", TypeId::Integer),
        ])
    }

    #[test]
    fn test_create_and_lookup_table() {
        let (_dir, catalog) = catalog();
        let info = catalog.create_table("t", two_col_schema()).unwrap().unwrap();
        assert_eq!(catalog.table_by_name("t").unwrap().oid, info.oid);
        assert_eq!(catalog.table_info(info.oid).unwrap().name, "t");
        // Duplicate name is rejected.
        assert!(catalog.create_table("t", two_col_schema()).unwrap().is_none());
    }

    #[test]
    fn test_name_snapshot_is_stable() {
        let (_dir, catalog) = catalog();
        catalog.create_table("a", two_col_schema()).unwrap().unwrap();
        let snapshot = catalog.table_names();
        catalog.create_table("b", two_col_schema()).unwrap().unwrap();
        // The earlier snapshot does not see the later table.
        assert!(snapshot.get::<TableOid>("a").is_some());
        assert!(snapshot.get::<TableOid>("b").is_none());
        assert!(catalog.table_names().get::<TableOid>("b").is_some());
    }

    #[test]
    fn test_match_index() {
        let (_dir, catalog) = catalog();
        catalog.create_table("t", two_col_schema()).unwrap().unwrap();
        catalog.create_index("t_v", "t", vec![1]).unwrap();
        assert!(catalog.match_index("t", 1).is_some());
        assert!(catalog.match_index("t", 0).is_none());
        assert_eq!(catalog.table_indexes("t").len(), 1);
        // Duplicate index name on the same table is rejected.
        assert!(catalog.create_index("t_v", "t", vec![0]).is_none());
    }
}
