use std::sync::Arc;
use anyhow::Result;

use minnowdb::catalog::Value;
use minnowdb::storage::table::{TableIterator, Tuple};
use minnowdb::transaction::IsolationLevel;

mod common;
use common::{accounts_schema, create_test_db};

fn account_row(id: i64, name: &str, balance: i64) -> Vec<Value> {
    vec![
        Value::Integer(id),
        Value::Text(name.to_string()),
        Value::Integer(balance),
    ]
}

fn live_rows(table: &Arc<minnowdb::storage::table::TableHeap>) -> Result<Vec<Vec<Value>>> {
    let mut iter = TableIterator::new(Arc::clone(table));
    let mut rows = Vec::new();
    while let Some((tuple, _rid)) = iter.next()? {
        rows.push(tuple.values()?);
    }
    Ok(rows)
}

#[test]
fn test_commit_keeps_writes() -> Result<()> {
    let db = create_test_db(50)?;
    let info = db.catalog.create_table("accounts", accounts_schema())?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let tuple = Tuple::from_values(&account_row(1, "alice", 100), &info.schema)?;
    info.table.insert_tuple(&tuple, &txn)?;
    db.txn_manager.commit(&txn)?;

    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "alice", 100)]);
    Ok(())
}

#[test]
fn test_abort_undoes_insert() -> Result<()> {
    let db = create_test_db(50)?;
    let info = db.catalog.create_table("accounts", accounts_schema())?;

    let setup = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let kept = Tuple::from_values(&account_row(1, "kept", 10), &info.schema)?;
    info.table.insert_tuple(&kept, &setup)?;
    db.txn_manager.commit(&setup)?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let doomed = Tuple::from_values(&account_row(2, "doomed", 20), &info.schema)?;
    info.table.insert_tuple(&doomed, &txn)?;
    db.txn_manager.abort(&txn)?;

    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "kept", 10)]);
    Ok(())
}

#[test]
fn test_abort_undoes_delete() -> Result<()> {
    let db = create_test_db(50)?;
    let info = db.catalog.create_table("accounts", accounts_schema())?;

    let setup = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let tuple = Tuple::from_values(&account_row(1, "alice", 100), &info.schema)?;
    let rid = info.table.insert_tuple(&tuple, &setup)?;
    db.txn_manager.commit(&setup)?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    info.table.mark_delete(rid, &txn)?;
    assert!(live_rows(&info.table)?.is_empty());
    db.txn_manager.abort(&txn)?;

    // The deleted row is restored at its old record id.
    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "alice", 100)]);
    assert_eq!(
        info.table.get_tuple(rid)?.values()?,
        account_row(1, "alice", 100)
    );
    Ok(())
}

#[test]
fn test_abort_undoes_update() -> Result<()> {
    let db = create_test_db(50)?;
    let info = db.catalog.create_table("accounts", accounts_schema())?;

    let setup = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let tuple = Tuple::from_values(&account_row(1, "alice", 100), &info.schema)?;
    let rid = info.table.insert_tuple(&tuple, &setup)?;
    db.txn_manager.commit(&setup)?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let updated = Tuple::from_values(&account_row(1, "alice", 50), &info.schema)?;
    info.table.update_tuple(&updated, rid, &txn)?;
    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "alice", 50)]);
    db.txn_manager.abort(&txn)?;

    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "alice", 100)]);
    Ok(())
}

#[test]
fn test_abort_undoes_interleaved_writes_in_reverse() -> Result<()> {
    let db = create_test_db(50)?;
    let info = db.catalog.create_table("accounts", accounts_schema())?;

    let setup = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let original = Tuple::from_values(&account_row(1, "alice", 100), &info.schema)?;
    let rid = info.table.insert_tuple(&original, &setup)?;
    db.txn_manager.commit(&setup)?;

    // Update the same row twice, then delete it: undo must walk the
    // records backwards to land on the original value.
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let first = Tuple::from_values(&account_row(1, "alice", 70), &info.schema)?;
    info.table.update_tuple(&first, rid, &txn)?;
    let second = Tuple::from_values(&account_row(1, "alice", 40), &info.schema)?;
    info.table.update_tuple(&second, rid, &txn)?;
    info.table.mark_delete(rid, &txn)?;
    db.txn_manager.abort(&txn)?;

    assert_eq!(live_rows(&info.table)?, vec![account_row(1, "alice", 100)]);
    Ok(())
}

#[test]
fn test_double_commit_rejected() -> Result<()> {
    let db = create_test_db(50)?;
    let txn = db.txn_manager.begin(IsolationLevel::ReadCommitted);
    db.txn_manager.commit(&txn)?;
    assert!(db.txn_manager.commit(&txn).is_err());
    Ok(())
}
