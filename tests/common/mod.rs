use std::sync::Arc;
use anyhow::Result;
use tempfile::NamedTempFile;

use minnowdb::catalog::{Catalog, Column, DataType, Schema};
use minnowdb::query::expression::Expression;
use minnowdb::query::plan::Projection;
use minnowdb::query::ExecutionEngine;
use minnowdb::storage::buffer::BufferPoolManager;
use minnowdb::transaction::{LockManager, LockManagerOptions, TransactionManager};

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a buffer pool manager backed by a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, path)?);
    Ok((buffer_pool, file))
}

/// The full stack most integration tests need, wired together the same
/// way the embedding application would do it.
#[allow(dead_code)]
pub struct TestDb {
    pub buffer_pool: Arc<BufferPoolManager>,
    pub catalog: Arc<Catalog>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
    pub engine: ExecutionEngine,
    _file: NamedTempFile,
}

#[allow(dead_code)]
pub fn create_test_db(pool_size: usize) -> Result<TestDb> {
    let (buffer_pool, file) = create_test_buffer_pool(pool_size)?;
    let catalog = Arc::new(Catalog::new(Arc::clone(&buffer_pool)));
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = Arc::new(TransactionManager::new(Arc::clone(&lock_manager)));
    let engine = ExecutionEngine::new(
        Arc::clone(&catalog),
        Arc::clone(&buffer_pool),
        Arc::clone(&lock_manager),
    );

    Ok(TestDb {
        buffer_pool,
        catalog,
        lock_manager,
        txn_manager,
        engine,
        _file: file,
    })
}

/// (id INTEGER, name TEXT, balance INTEGER)
#[allow(dead_code)]
pub fn accounts_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Integer),
        Column::new("name", DataType::Text),
        Column::new("balance", DataType::Integer),
    ])
}

/// Projection that passes every column of `schema` through unchanged.
#[allow(dead_code)]
pub fn identity_projection(schema: &Schema) -> Projection {
    Projection {
        schema: schema.clone(),
        exprs: (0..schema.column_count()).map(Expression::column).collect(),
    }
}
