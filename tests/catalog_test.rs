use std::sync::Arc;
use anyhow::Result;

use minnowdb::catalog::{CatalogError, Column, DataType, Schema};

mod common;
use common::create_test_db;

#[test]
fn test_create_table_round_trip() -> Result<()> {
    let db = create_test_db(50)?;

    let schema = Schema::new(vec![
        Column::new("A", DataType::Integer),
        Column::new("B", DataType::Boolean),
    ]);

    // The table does not exist yet.
    assert!(matches!(
        db.catalog.get_table("potato"),
        Err(CatalogError::TableNotFound(_))
    ));

    let created = db.catalog.create_table("potato", schema.clone())?;
    assert_eq!(created.name, "potato");
    assert_eq!(created.schema, schema);

    // Name and oid lookups resolve to the same entry.
    let by_name = db.catalog.get_table("potato")?;
    assert_eq!(by_name.oid, created.oid);
    assert_eq!(by_name.schema, schema);

    let by_oid = db.catalog.get_table_by_oid(created.oid)?;
    assert!(Arc::ptr_eq(&by_name, &by_oid));

    // Duplicate creation is rejected.
    assert!(matches!(
        db.catalog.create_table("potato", schema),
        Err(CatalogError::TableExists(_))
    ));
    Ok(())
}

#[test]
fn test_create_index_round_trip() -> Result<()> {
    let db = create_test_db(50)?;

    let schema = Schema::new(vec![
        Column::new("A", DataType::Integer),
        Column::new("B", DataType::Boolean),
    ]);
    db.catalog.create_table("potato", schema)?;

    let index = db.catalog.create_index("idx_a", "potato", vec![0])?;
    assert_eq!(index.name, "idx_a");
    assert_eq!(index.table_name, "potato");
    assert_eq!(index.key_attrs, vec![0]);
    assert_eq!(index.key_schema.column_count(), 1);
    assert_eq!(index.key_schema.column_at(0).unwrap().name(), "A");

    let by_name = db.catalog.get_index("idx_a", "potato")?;
    assert_eq!(by_name.index_oid, index.index_oid);

    let by_oid = db.catalog.get_index_by_oid(index.index_oid)?;
    assert!(Arc::ptr_eq(&by_name, &by_oid));

    let table_indexes = db.catalog.get_table_indexes("potato");
    assert_eq!(table_indexes.len(), 1);
    assert_eq!(table_indexes[0].index_oid, index.index_oid);

    // Missing lookups report errors.
    assert!(db.catalog.get_index("idx_missing", "potato").is_err());
    assert!(db.catalog.get_index_by_oid(999).is_err());
    assert!(db.catalog.get_table_indexes("no_such_table").is_empty());

    // An index on a missing table is rejected.
    assert!(matches!(
        db.catalog.create_index("idx_b", "no_such_table", vec![0]),
        Err(CatalogError::TableNotFound(_))
    ));
    Ok(())
}
