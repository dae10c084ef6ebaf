use byteorder::{ByteOrder, LittleEndian};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{Page, PageId, Rid, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, NodeType};

// On-page node header:
//   node_type: u8, current_size: u16, max_size: u16,
//   parent_page_id: i32, page_id: i32, next_page_id: i32
pub(crate) const NODE_HEADER_SIZE: usize = 17;

const TYPE_LEAF: u8 = 1;
const TYPE_INTERNAL: u8 = 2;

const PARENT_OFFSET: usize = 5;

/// Serialize a node image into its page buffer.
pub fn serialize_node<K>(node: &BTreeNode<K>, page: &mut Page) -> Result<(), BTreeError>
where
    K: Clone + Ord + Serialize,
{
    page.data.fill(0);

    page.data[0] = match node.node_type {
        NodeType::Leaf => TYPE_LEAF,
        NodeType::Internal => TYPE_INTERNAL,
    };
    LittleEndian::write_u16(&mut page.data[1..3], node.size() as u16);
    LittleEndian::write_u16(&mut page.data[3..5], node.max_size as u16);
    LittleEndian::write_i32(&mut page.data[5..9], node.parent_page_id);
    LittleEndian::write_i32(&mut page.data[9..13], node.page_id);
    LittleEndian::write_i32(&mut page.data[13..17], node.next_page_id);

    let mut offset = NODE_HEADER_SIZE;

    match node.node_type {
        NodeType::Leaf => {
            for (key, rid) in node.keys.iter().zip(node.values.iter()) {
                offset = write_key(page, offset, key)?;
                if offset + 8 > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_i32(&mut page.data[offset..offset + 4], rid.page_id);
                LittleEndian::write_u32(&mut page.data[offset + 4..offset + 8], rid.slot_num);
                offset += 8;
            }
        }
        NodeType::Internal => {
            for child in &node.children {
                if offset + 4 > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_i32(&mut page.data[offset..offset + 4], *child);
                offset += 4;
            }
            for key in &node.keys {
                offset = write_key(page, offset, key)?;
            }
        }
    }

    Ok(())
}

/// Decode the node image stored in a page buffer.
pub fn deserialize_node<K>(page: &Page) -> Result<BTreeNode<K>, BTreeError>
where
    K: Clone + Ord + DeserializeOwned,
{
    let node_type = match page.data[0] {
        TYPE_LEAF => NodeType::Leaf,
        TYPE_INTERNAL => NodeType::Internal,
        _ => return Err(BTreeError::InvalidPageFormat),
    };

    let size = LittleEndian::read_u16(&page.data[1..3]) as usize;
    let max_size = LittleEndian::read_u16(&page.data[3..5]) as usize;
    let parent_page_id = LittleEndian::read_i32(&page.data[5..9]);
    let page_id = LittleEndian::read_i32(&page.data[9..13]);
    let next_page_id = LittleEndian::read_i32(&page.data[13..17]);

    let mut offset = NODE_HEADER_SIZE;
    let mut keys = Vec::new();
    let mut values = Vec::new();
    let mut children = Vec::new();

    match node_type {
        NodeType::Leaf => {
            keys.reserve(size);
            values.reserve(size);
            for _ in 0..size {
                let (key, next_offset) = read_key(page, offset)?;
                offset = next_offset;
                let rid_page = LittleEndian::read_i32(&page.data[offset..offset + 4]);
                let rid_slot = LittleEndian::read_u32(&page.data[offset + 4..offset + 8]);
                offset += 8;
                keys.push(key);
                values.push(Rid::new(rid_page, rid_slot));
            }
        }
        NodeType::Internal => {
            children.reserve(size);
            for _ in 0..size {
                children.push(LittleEndian::read_i32(&page.data[offset..offset + 4]));
                offset += 4;
            }
            if size > 0 {
                keys.reserve(size - 1);
                for _ in 0..size - 1 {
                    let (key, next_offset) = read_key(page, offset)?;
                    offset = next_offset;
                    keys.push(key);
                }
            }
        }
    }

    Ok(BTreeNode {
        node_type,
        page_id,
        parent_page_id,
        max_size,
        next_page_id,
        keys,
        values,
        children,
    })
}

/// Rewrite just the parent link of a serialized node, leaving the rest
/// of the page untouched. Used when splits and merges reassign children.
pub(crate) fn write_parent_page_id(page: &mut Page, parent_page_id: PageId) {
    LittleEndian::write_i32(
        &mut page.data[PARENT_OFFSET..PARENT_OFFSET + 4],
        parent_page_id,
    );
}

fn write_key<K: Serialize>(page: &mut Page, offset: usize, key: &K) -> Result<usize, BTreeError> {
    let bytes = bincode::serialize(key)
        .map_err(|e| BTreeError::SerializationError(e.to_string()))?;
    if offset + 2 + bytes.len() > PAGE_SIZE {
        return Err(BTreeError::NodeTooLarge);
    }
    LittleEndian::write_u16(&mut page.data[offset..offset + 2], bytes.len() as u16);
    page.data[offset + 2..offset + 2 + bytes.len()].copy_from_slice(&bytes);
    Ok(offset + 2 + bytes.len())
}

fn read_key<K: DeserializeOwned>(page: &Page, offset: usize) -> Result<(K, usize), BTreeError> {
    if offset + 2 > PAGE_SIZE {
        return Err(BTreeError::DeserializationError(
            "key length out of bounds".to_string(),
        ));
    }
    let len = LittleEndian::read_u16(&page.data[offset..offset + 2]) as usize;
    let start = offset + 2;
    if start + len > PAGE_SIZE {
        return Err(BTreeError::DeserializationError(
            "key bytes out of bounds".to_string(),
        ));
    }
    let key = bincode::deserialize(&page.data[start..start + len])
        .map_err(|e| BTreeError::DeserializationError(e.to_string()))?;
    Ok((key, start + len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::INVALID_PAGE_ID;

    #[test]
    fn test_leaf_round_trip() {
        let mut node = BTreeNode::<i64>::new_leaf(5, 2, 8);
        node.next_page_id = 6;
        for k in [3i64, 7, 11] {
            node.insert_into_leaf(k, Rid::new(1, k as u32));
        }

        let mut page = Page::new(5);
        serialize_node(&node, &mut page).unwrap();
        let decoded = deserialize_node::<i64>(&page).unwrap();

        assert_eq!(decoded.node_type, NodeType::Leaf);
        assert_eq!(decoded.page_id, 5);
        assert_eq!(decoded.parent_page_id, 2);
        assert_eq!(decoded.max_size, 8);
        assert_eq!(decoded.next_page_id, 6);
        assert_eq!(decoded.keys, vec![3, 7, 11]);
        assert_eq!(decoded.values[2], Rid::new(1, 11));
    }

    #[test]
    fn test_internal_round_trip() {
        let mut node = BTreeNode::<String>::new_internal(9, INVALID_PAGE_ID, 6);
        node.children = vec![10, 11, 12];
        node.keys = vec!["delta".to_string(), "kilo".to_string()];

        let mut page = Page::new(9);
        serialize_node(&node, &mut page).unwrap();
        let decoded = deserialize_node::<String>(&page).unwrap();

        assert_eq!(decoded.node_type, NodeType::Internal);
        assert_eq!(decoded.children, vec![10, 11, 12]);
        assert_eq!(decoded.keys, vec!["delta".to_string(), "kilo".to_string()]);
        assert!(decoded.is_root());
    }

    #[test]
    fn test_parent_pointer_patch() {
        let node = BTreeNode::<i64>::new_leaf(5, 2, 8);
        let mut page = Page::new(5);
        serialize_node(&node, &mut page).unwrap();

        write_parent_page_id(&mut page, 42);
        let decoded = deserialize_node::<i64>(&page).unwrap();
        assert_eq!(decoded.parent_page_id, 42);
    }

    #[test]
    fn test_garbage_page_rejected() {
        let mut page = Page::new(1);
        page.data[0] = 0xEE;
        assert!(matches!(
            deserialize_node::<i64>(&page),
            Err(BTreeError::InvalidPageFormat)
        ));
    }
}
