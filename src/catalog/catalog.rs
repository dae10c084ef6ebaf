use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::catalog::value::CompositeKey;
use crate::index::btree::{BPlusTree, BTreeError};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::table::{TableError, TableHeap};

pub type TableOid = u32;
pub type IndexOid = u32;

// Sized so index nodes comfortably fit a page with composite keys.
const DEFAULT_LEAF_MAX_SIZE: usize = 32;
const DEFAULT_INTERNAL_MAX_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("table {0} not found")]
    TableNotFound(String),
    #[error("table oid {0} not found")]
    TableOidNotFound(TableOid),
    #[error("table {0} already exists")]
    TableExists(String),
    #[error("index {0} not found")]
    IndexNotFound(String),
    #[error("index oid {0} not found")]
    IndexOidNotFound(IndexOid),
    #[error("index {0} already exists")]
    IndexExists(String),
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("index error: {0}")]
    Index(#[from] BTreeError),
}

/// Metadata bundle for one table.
pub struct TableInfo {
    pub name: String,
    pub oid: TableOid,
    pub schema: Schema,
    pub table: Arc<TableHeap>,
}

/// Metadata bundle for one index: the key schema is the projection of
/// the table schema over `key_attrs`.
pub struct IndexInfo {
    pub name: String,
    pub index_oid: IndexOid,
    pub table_name: String,
    pub key_schema: Schema,
    pub key_attrs: Vec<usize>,
    pub index: Arc<BPlusTree<CompositeKey>>,
}

/// In-memory registry of tables and indexes. Executors resolve their
/// handles here once, at construction time.
pub struct Catalog {
    buffer_pool: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<TableOid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, TableOid>>,
    indexes: RwLock<HashMap<IndexOid, Arc<IndexInfo>>>,
    // table name -> index name -> oid
    index_names: RwLock<HashMap<String, HashMap<String, IndexOid>>>,
    next_table_oid: AtomicU32,
    next_index_oid: AtomicU32,
}

impl Catalog {
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            index_names: RwLock::new(HashMap::new()),
            next_table_oid: AtomicU32::new(0),
            next_index_oid: AtomicU32::new(0),
        }
    }

    /// Create a table and its backing heap.
    pub fn create_table(
        &self,
        name: impl Into<String>,
        schema: Schema,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        let name = name.into();
        let mut table_names = self.table_names.write();
        if table_names.contains_key(&name) {
            return Err(CatalogError::TableExists(name));
        }

        let heap = Arc::new(TableHeap::new(Arc::clone(&self.buffer_pool))?);
        let oid = self.next_table_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(TableInfo {
            name: name.clone(),
            oid,
            schema,
            table: heap,
        });

        table_names.insert(name, oid);
        self.tables.write().insert(oid, Arc::clone(&info));
        Ok(info)
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<TableInfo>, CatalogError> {
        let oid = *self
            .table_names
            .read()
            .get(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))?;
        self.get_table_by_oid(oid)
    }

    pub fn get_table_by_oid(&self, oid: TableOid) -> Result<Arc<TableInfo>, CatalogError> {
        self.tables
            .read()
            .get(&oid)
            .cloned()
            .ok_or(CatalogError::TableOidNotFound(oid))
    }

    /// Create a B+tree index over the given key columns of a table.
    pub fn create_index(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        self.create_index_with_sizes(
            index_name,
            table_name,
            key_attrs,
            DEFAULT_LEAF_MAX_SIZE,
            DEFAULT_INTERNAL_MAX_SIZE,
        )
    }

    pub fn create_index_with_sizes(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let index_name = index_name.into();
        let table_info = self.get_table(table_name)?;

        let mut index_names = self.index_names.write();
        let per_table = index_names.entry(table_name.to_string()).or_default();
        if per_table.contains_key(&index_name) {
            return Err(CatalogError::IndexExists(index_name));
        }

        let key_schema = table_info.schema.project(&key_attrs);
        let tree = Arc::new(BPlusTree::new(
            index_name.clone(),
            Arc::clone(&self.buffer_pool),
            leaf_max_size,
            internal_max_size,
        )?);

        let index_oid = self.next_index_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(IndexInfo {
            name: index_name.clone(),
            index_oid,
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index: tree,
        });

        per_table.insert(index_name, index_oid);
        self.indexes.write().insert(index_oid, Arc::clone(&info));
        Ok(info)
    }

    pub fn get_index(
        &self,
        index_name: &str,
        table_name: &str,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let oid = self
            .index_names
            .read()
            .get(table_name)
            .and_then(|per_table| per_table.get(index_name))
            .copied()
            .ok_or_else(|| CatalogError::IndexNotFound(index_name.to_string()))?;
        self.get_index_by_oid(oid)
    }

    pub fn get_index_by_oid(&self, oid: IndexOid) -> Result<Arc<IndexInfo>, CatalogError> {
        self.indexes
            .read()
            .get(&oid)
            .cloned()
            .ok_or(CatalogError::IndexOidNotFound(oid))
    }

    /// All indexes registered on a table, in no particular order.
    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let oids: Vec<IndexOid> = self
            .index_names
            .read()
            .get(table_name)
            .map(|per_table| per_table.values().copied().collect())
            .unwrap_or_default();

        let indexes = self.indexes.read();
        oids.iter()
            .filter_map(|oid| indexes.get(oid).cloned())
            .collect()
    }
}
