use std::sync::Arc;
use anyhow::Result;

use minnowdb::common::types::{Rid, INVALID_PAGE_ID};
use minnowdb::index::btree::BPlusTree;
use minnowdb::transaction::{IsolationLevel, Transaction};

mod common;
use common::create_test_buffer_pool;

fn rid(n: u32) -> Rid {
    Rid::new(1, n)
}

fn txn() -> Transaction {
    Transaction::new(1, IsolationLevel::RepeatableRead)
}

#[test]
fn test_empty_tree() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(20)?;
    let tree = BPlusTree::<i32>::new("idx_empty", buffer_pool, 4, 4)?;

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
    assert!(tree.get(&7)?.is_empty());

    // Removing from an empty tree is a no-op.
    tree.remove(&7, &txn())?;
    Ok(())
}

#[test]
fn test_insert_get_remove_round_trip() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(50)?;
    let tree = BPlusTree::<i32>::new("idx_rt", buffer_pool, 4, 4)?;
    let txn = txn();

    assert!(tree.insert(42, rid(42), &txn)?);
    assert_eq!(tree.get(&42)?, vec![rid(42)]);

    tree.remove(&42, &txn)?;
    assert!(tree.get(&42)?.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
    Ok(())
}

#[test]
fn test_duplicate_insert_rejected() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(50)?;
    let tree = BPlusTree::<i32>::new("idx_dup", buffer_pool, 4, 4)?;
    let txn = txn();

    assert!(tree.insert(1, rid(1), &txn)?);
    assert!(!tree.insert(1, rid(99), &txn)?);
    assert_eq!(tree.get(&1)?, vec![rid(1)]);
    Ok(())
}

#[test]
fn test_split_and_merge_sequence() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(50)?;
    let tree = BPlusTree::<i32>::new("idx_seq", buffer_pool, 4, 4)?;
    let txn = txn();

    for key in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
        assert!(tree.insert(key, rid(key as u32), &txn)?);
    }
    for key in [1, 9, 5] {
        tree.remove(&key, &txn)?;
    }

    let mut iter = tree.iter()?;
    let mut keys = Vec::new();
    while let Some((key, value)) = iter.next()? {
        assert_eq!(value, rid(key as u32));
        keys.push(key);
    }
    assert_eq!(keys, vec![2, 3, 4, 6, 7, 8]);
    Ok(())
}

#[test]
fn test_permutation_insert_then_reverse_remove_empties_tree() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(100)?;
    let tree = BPlusTree::<i32>::new("idx_perm", buffer_pool, 4, 4)?;
    let txn = txn();

    // 7 is coprime with 50, so this visits every key exactly once.
    let permutation: Vec<i32> = (0..50).map(|i| (i * 7) % 50).collect();

    for &key in &permutation {
        assert!(tree.insert(key, rid(key as u32), &txn)?);
    }
    for &key in permutation.iter().rev() {
        tree.remove(&key, &txn)?;
    }

    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
    Ok(())
}

#[test]
fn test_mixed_workload_with_odd_max_sizes() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(200)?;
    // Odd sizes give leaves and internal nodes different occupancy
    // minimums, exercising the rebalance triggers the even case hides.
    let tree = BPlusTree::<i32>::new("idx_odd", buffer_pool, 5, 5)?;
    let txn = txn();

    let permutation: Vec<i32> = (0..80).map(|i| (i * 13) % 80).collect();
    for &key in &permutation {
        assert!(tree.insert(key, rid(key as u32), &txn)?);
    }
    for key in (0..80).filter(|k| k % 4 != 1) {
        tree.remove(&key, &txn)?;
    }

    let expected: Vec<i32> = (0..80).filter(|k| k % 4 == 1).collect();
    let mut iter = tree.iter()?;
    let mut keys = Vec::new();
    while let Some((key, value)) = iter.next()? {
        assert_eq!(value, rid(key as u32));
        keys.push(key);
    }
    assert_eq!(keys, expected);

    for &key in &expected {
        assert_eq!(tree.get(&key)?, vec![rid(key as u32)]);
        tree.remove(&key, &txn)?;
    }
    assert!(tree.is_empty());
    assert_eq!(tree.root_page_id(), INVALID_PAGE_ID);
    Ok(())
}

#[test]
fn test_iterator_yields_sorted_keys_after_mixed_workload() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(200)?;
    let tree = BPlusTree::<i32>::new("idx_mixed", buffer_pool, 4, 4)?;
    let txn = txn();

    let permutation: Vec<i32> = (0..100).map(|i| (i * 37) % 100).collect();
    for &key in &permutation {
        tree.insert(key, rid(key as u32), &txn)?;
    }
    for key in (0..100).filter(|k| k % 3 == 0) {
        tree.remove(&key, &txn)?;
    }

    let expected: Vec<i32> = (0..100).filter(|k| k % 3 != 0).collect();

    let mut iter = tree.iter()?;
    let mut keys = Vec::new();
    while let Some((key, _)) = iter.next()? {
        keys.push(key);
    }
    assert_eq!(keys, expected);

    for &key in &expected {
        assert_eq!(tree.get(&key)?, vec![rid(key as u32)]);
    }
    Ok(())
}

#[test]
fn test_iter_from_lower_bound() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(100)?;
    let tree = BPlusTree::<i32>::new("idx_from", buffer_pool, 4, 4)?;
    let txn = txn();

    for key in (0..40).step_by(2) {
        tree.insert(key, rid(key as u32), &txn)?;
    }

    // 11 is absent; iteration starts at the next larger key.
    let mut iter = tree.iter_from(&11)?;
    let mut keys = Vec::new();
    while let Some((key, _)) = iter.next()? {
        keys.push(key);
    }
    assert_eq!(keys, (12..40).step_by(2).collect::<Vec<_>>());

    // Lower bound past the end yields nothing.
    let mut iter = tree.iter_from(&100)?;
    assert!(iter.next()?.is_none());
    Ok(())
}

#[test]
fn test_reopen_finds_root_through_header_page() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(100)?;

    {
        let tree = BPlusTree::<i32>::new("idx_durable", Arc::clone(&buffer_pool), 4, 4)?;
        let txn = txn();
        for key in 0..20 {
            tree.insert(key, rid(key as u32), &txn)?;
        }
    }

    // A new handle on the same name picks the root up from page 0.
    let reopened = BPlusTree::<i32>::new("idx_durable", buffer_pool, 4, 4)?;
    assert!(!reopened.is_empty());
    for key in 0..20 {
        assert_eq!(reopened.get(&key)?, vec![rid(key as u32)]);
    }
    Ok(())
}

#[test]
fn test_concurrent_disjoint_inserts() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(200)?;
    let tree = Arc::new(BPlusTree::<i32>::new("idx_conc", buffer_pool, 4, 4)?);

    let mut handles = Vec::new();
    for thread_id in 0..4 {
        let tree = Arc::clone(&tree);
        handles.push(std::thread::spawn(move || {
            let txn = Transaction::new(thread_id as u32 + 1, IsolationLevel::RepeatableRead);
            for i in 0..50 {
                let key = thread_id * 50 + i;
                tree.insert(key, rid(key as u32), &txn).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut iter = tree.iter()?;
    let mut keys = Vec::new();
    while let Some((key, _)) = iter.next()? {
        keys.push(key);
    }
    assert_eq!(keys, (0..200).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_string_keys() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(100)?;
    let tree = BPlusTree::<String>::new("idx_text", buffer_pool, 4, 4)?;
    let txn = txn();

    let words = ["pear", "apple", "quince", "fig", "banana", "cherry", "date"];
    for (i, word) in words.iter().enumerate() {
        tree.insert(word.to_string(), rid(i as u32), &txn)?;
    }

    let mut iter = tree.iter()?;
    let mut sorted = Vec::new();
    while let Some((key, _)) = iter.next()? {
        sorted.push(key);
    }
    let mut expected: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    expected.sort();
    assert_eq!(sorted, expected);
    Ok(())
}
