use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;
use crate::index::btree::serialization::deserialize_node;
use crate::index::btree::tree::PageReadGuard;
use crate::storage::buffer::BufferPoolManager;

/// Forward iterator over leaf pairs in ascending key order.
///
/// The iterator keeps its current leaf pinned and read-latched for its
/// whole stay on that leaf; stepping past the last slot couples to the
/// next leaf through `next_page_id` before the previous latch drops.
/// An exhausted iterator holds nothing.
pub struct TreeIterator<K> {
    buffer_pool: Arc<BufferPoolManager>,
    current: Option<LeafPosition<K>>,
}

struct LeafPosition<K> {
    page_id: PageId,
    // Held for as long as we sit on this leaf; the decoded image below
    // stays valid because of it.
    _guard: PageReadGuard,
    node: BTreeNode<K>,
    index: usize,
}

impl<K> TreeIterator<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn new(
        buffer_pool: Arc<BufferPoolManager>,
        page_id: PageId,
        guard: PageReadGuard,
        index: usize,
    ) -> Result<Self, BTreeError> {
        let node = deserialize_node::<K>(&guard)?;
        Ok(Self {
            buffer_pool,
            current: Some(LeafPosition {
                page_id,
                _guard: guard,
                node,
                index,
            }),
        })
    }

    pub(crate) fn empty(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            current: None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Yield the next (key, rid) pair, following the leaf chain as
    /// needed. Returns `None` once the rightmost leaf is drained, at
    /// which point no latch or pin is held any more.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<(K, Rid)>, BTreeError> {
        loop {
            let position = match self.current.as_mut() {
                Some(position) => position,
                None => return Ok(None),
            };

            if position.index < position.node.keys.len() {
                let key = position.node.keys[position.index].clone();
                let rid = position.node.values[position.index];
                position.index += 1;
                return Ok(Some((key, rid)));
            }

            let next_page_id = position.node.next_page_id;
            if next_page_id == INVALID_PAGE_ID {
                self.release()?;
                return Ok(None);
            }

            // Latch-couple onto the next leaf before letting go of the
            // current one.
            let next_page = self.buffer_pool.fetch_page(next_page_id)?;
            let next_guard = next_page.read_arc();
            let next_node = match deserialize_node::<K>(&next_guard) {
                Ok(node) => node,
                Err(e) => {
                    drop(next_guard);
                    self.buffer_pool.unpin_page(next_page_id, false)?;
                    self.release()?;
                    return Err(e);
                }
            };

            let previous = self.current.replace(LeafPosition {
                page_id: next_page_id,
                _guard: next_guard,
                node: next_node,
                index: 0,
            });
            if let Some(previous) = previous {
                let page_id = previous.page_id;
                drop(previous);
                self.buffer_pool.unpin_page(page_id, false)?;
            }
        }
    }

    /// Drop the held latch and pin.
    fn release(&mut self) -> Result<(), BTreeError> {
        if let Some(position) = self.current.take() {
            let page_id = position.page_id;
            drop(position);
            self.buffer_pool.unpin_page(page_id, false)?;
        }
        Ok(())
    }
}

impl<K> Drop for TreeIterator<K> {
    fn drop(&mut self) {
        if let Some(position) = self.current.take() {
            let page_id = position.page_id;
            drop(position);
            // Nothing to do about an unpin failure during drop.
            let _ = self.buffer_pool.unpin_page(page_id, false);
        }
    }
}
