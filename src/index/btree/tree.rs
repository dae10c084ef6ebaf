use std::marker::PhantomData;
use std::sync::Arc;
use parking_lot::lock_api::{ArcMutexGuard, ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawMutex, RawRwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{Page, PageId, PagePtr, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::iterator::TreeIterator;
use crate::index::btree::node::{BTreeNode, TreeOp};
use crate::index::btree::serialization::{deserialize_node, serialize_node, write_parent_page_id};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::page::{HeaderPage, PageError};
use crate::transaction::transaction::Transaction;

pub(crate) type PageReadGuard = ArcRwLockReadGuard<RawRwLock, Page>;
pub(crate) type PageWriteGuard = ArcRwLockWriteGuard<RawRwLock, Page>;
type RootGuard = ArcMutexGuard<RawMutex, PageId>;

/// Latches accumulated by an exclusive descent: the root guard plus
/// the chain of ancestor page latches, in root-to-leaf order. Released
/// in one pass as soon as a safe child proves the structural change
/// cannot propagate further up.
struct WriteContext {
    root_guard: Option<RootGuard>,
    ancestors: Vec<(PageId, PageWriteGuard)>,
}

impl WriteContext {
    fn new(root_guard: RootGuard) -> Self {
        Self {
            root_guard: Some(root_guard),
            ancestors: Vec::new(),
        }
    }

    fn pop_ancestor(&mut self) -> Option<(PageId, PageWriteGuard)> {
        self.ancestors.pop()
    }

    /// Drop every held ancestor latch (unpinning the pages) and the
    /// root guard.
    fn release(&mut self, buffer_pool: &BufferPoolManager) -> Result<(), BTreeError> {
        for (page_id, guard) in self.ancestors.drain(..) {
            drop(guard);
            buffer_pool.unpin_page(page_id, false)?;
        }
        self.root_guard = None;
        Ok(())
    }
}

/// A concurrent B+tree mapping keys to record ids, one node per page.
///
/// Readers crab down with shared latches, holding at most parent and
/// child at a time. Writers keep the chain of exclusive ancestor
/// latches until the child is safe for the operation. The root page id
/// sits behind its own mutex and is mirrored into the header page
/// record for this index on every root change.
pub struct BPlusTree<K> {
    name: String,
    buffer_pool: Arc<BufferPoolManager>,
    root: Arc<Mutex<PageId>>,
    leaf_max_size: usize,
    internal_max_size: usize,
    _phantom: PhantomData<K>,
}

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open the named index, registering it on the header page when it
    /// does not exist yet. A fresh index starts empty with an invalid
    /// root.
    pub fn new(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        debug_assert!(leaf_max_size >= 3 && internal_max_size >= 3);
        let name = name.into();

        let header = HeaderPage::new();
        let page = buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        let existing = {
            let page_guard = page.read();
            header.get_root(&page_guard, &name)
        };

        let root_id = match existing {
            Some(root_id) => {
                buffer_pool.unpin_page(HEADER_PAGE_ID, false)?;
                root_id
            }
            None => {
                let result = {
                    let mut page_guard = page.write();
                    header.insert_record(&mut page_guard, &name, INVALID_PAGE_ID)
                };
                buffer_pool.unpin_page(HEADER_PAGE_ID, result.is_ok())?;
                result?;
                INVALID_PAGE_ID
            }
        };

        Ok(Self {
            name,
            buffer_pool,
            root: Arc::new(Mutex::new(root_id)),
            leaf_max_size,
            internal_max_size,
            _phantom: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        *self.root.lock() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root.lock()
    }

    /// Point lookup. Returns the record ids mapped to `key` (at most
    /// one, keys are unique).
    pub fn get(&self, key: &K) -> Result<Vec<Rid>, BTreeError> {
        let root_guard = self.root.lock();
        let root_id = *root_guard;
        if root_id == INVALID_PAGE_ID {
            return Ok(Vec::new());
        }

        let page = self.buffer_pool.fetch_page(root_id)?;
        let mut guard = page.read_arc();
        drop(root_guard);
        let mut current_id = root_id;

        loop {
            let node = match deserialize_node::<K>(&guard) {
                Ok(node) => node,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    return Err(e);
                }
            };

            if node.is_leaf() {
                let result = node.lookup(key).map(|rid| vec![rid]).unwrap_or_default();
                drop(guard);
                self.buffer_pool.unpin_page(current_id, false)?;
                return Ok(result);
            }

            let child_id = node.children[node.child_index(key)];
            let child_page = match self.buffer_pool.fetch_page(child_id) {
                Ok(page) => page,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    return Err(e.into());
                }
            };
            let child_guard = child_page.read_arc();
            drop(guard);
            self.buffer_pool.unpin_page(current_id, false)?;

            guard = child_guard;
            current_id = child_id;
        }
    }

    /// Index contract lookup used by executors.
    pub fn scan_key(&self, key: &K, _txn: &Transaction) -> Result<Vec<Rid>, BTreeError> {
        self.get(key)
    }

    /// Insert a key/rid pair. Returns false when the key already
    /// exists; the tree only stores unique keys. The descent's latch
    /// chain lives in an internal context; the transaction only comes
    /// into play for removals, which schedule page deletions on it.
    pub fn insert(&self, key: K, rid: Rid, _txn: &Transaction) -> Result<bool, BTreeError> {
        let mut ctx = WriteContext::new(self.root.lock_arc());
        let root_id = **ctx
            .root_guard
            .as_ref()
            .expect("root guard held at descent start");

        if root_id == INVALID_PAGE_ID {
            self.start_new_tree(key, rid, &mut ctx)?;
            ctx.release(&self.buffer_pool)?;
            return Ok(true);
        }

        let (leaf_id, mut leaf_guard, mut leaf) =
            self.find_leaf_write(&key, TreeOp::Insert, &mut ctx)?;

        if leaf.lookup(&key).is_some() {
            drop(leaf_guard);
            self.buffer_pool.unpin_page(leaf_id, false)?;
            ctx.release(&self.buffer_pool)?;
            return Ok(false);
        }

        leaf.insert_into_leaf(key, rid);

        if leaf.size() == self.leaf_max_size {
            log::debug!("btree {}: splitting leaf {}", self.name, leaf_id);
            let (new_page, new_id) = self.buffer_pool.new_page()?;
            let (sibling, separator) = leaf.split_leaf(new_id);
            self.insert_into_parent(
                leaf_id, leaf_guard, leaf, separator, new_id, new_page, sibling, &mut ctx,
            )?;
        } else {
            serialize_node(&leaf, &mut *leaf_guard)?;
            drop(leaf_guard);
            self.buffer_pool.unpin_page(leaf_id, true)?;
        }

        ctx.release(&self.buffer_pool)?;
        Ok(true)
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &K, txn: &Transaction) -> Result<(), BTreeError> {
        let mut ctx = WriteContext::new(self.root.lock_arc());
        let root_id = **ctx
            .root_guard
            .as_ref()
            .expect("root guard held at descent start");

        if root_id == INVALID_PAGE_ID {
            ctx.release(&self.buffer_pool)?;
            return Ok(());
        }

        let (leaf_id, mut leaf_guard, mut leaf) =
            self.find_leaf_write(key, TreeOp::Remove, &mut ctx)?;

        if !leaf.remove_from_leaf(key) {
            drop(leaf_guard);
            self.buffer_pool.unpin_page(leaf_id, false)?;
            ctx.release(&self.buffer_pool)?;
            return Ok(());
        }

        if leaf.size() < leaf.min_size() || leaf.is_root() {
            self.coalesce_or_redistribute(leaf_id, leaf_guard, leaf, &mut ctx, txn)?;
        } else {
            serialize_node(&leaf, &mut *leaf_guard)?;
            drop(leaf_guard);
            self.buffer_pool.unpin_page(leaf_id, true)?;
        }

        ctx.release(&self.buffer_pool)?;
        self.delete_pages(txn)?;
        Ok(())
    }

    /// Forward iterator from the leftmost leaf.
    pub fn iter(&self) -> Result<TreeIterator<K>, BTreeError> {
        match self.find_leaf_read(None)? {
            Some((page_id, guard)) => {
                TreeIterator::new(self.buffer_pool.clone(), page_id, guard, 0)
            }
            None => Ok(TreeIterator::empty(self.buffer_pool.clone())),
        }
    }

    /// Forward iterator positioned at the first key >= `key`.
    pub fn iter_from(&self, key: &K) -> Result<TreeIterator<K>, BTreeError> {
        match self.find_leaf_read(Some(key))? {
            Some((page_id, guard)) => {
                let index = deserialize_node::<K>(&guard)?.lower_bound(key);
                TreeIterator::new(self.buffer_pool.clone(), page_id, guard, index)
            }
            None => Ok(TreeIterator::empty(self.buffer_pool.clone())),
        }
    }

    // Descent helpers

    /// Shared-latch descent to a leaf: latch the child, then release
    /// the parent. `target` of `None` follows the leftmost spine.
    fn find_leaf_read(
        &self,
        target: Option<&K>,
    ) -> Result<Option<(PageId, PageReadGuard)>, BTreeError> {
        let root_guard = self.root.lock();
        let root_id = *root_guard;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let page = self.buffer_pool.fetch_page(root_id)?;
        let mut guard = page.read_arc();
        drop(root_guard);
        let mut current_id = root_id;

        loop {
            let node = match deserialize_node::<K>(&guard) {
                Ok(node) => node,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    return Err(e);
                }
            };

            if node.is_leaf() {
                return Ok(Some((current_id, guard)));
            }

            let child_id = match target {
                Some(key) => node.children[node.child_index(key)],
                None => node.children[0],
            };
            let child_page = match self.buffer_pool.fetch_page(child_id) {
                Ok(page) => page,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    return Err(e.into());
                }
            };
            let child_guard = child_page.read_arc();
            drop(guard);
            self.buffer_pool.unpin_page(current_id, false)?;

            guard = child_guard;
            current_id = child_id;
        }
    }

    /// Exclusive-latch descent. Ancestor latches stay in `ctx` until a
    /// child proves safe under `op`, at which point all of them (and
    /// the root guard) are released in one pass. Returns the latched,
    /// pinned leaf.
    fn find_leaf_write(
        &self,
        key: &K,
        op: TreeOp,
        ctx: &mut WriteContext,
    ) -> Result<(PageId, PageWriteGuard, BTreeNode<K>), BTreeError> {
        let root_id = **ctx
            .root_guard
            .as_ref()
            .expect("root guard held at descent start");

        let page = self.buffer_pool.fetch_page(root_id)?;
        let mut guard = page.write_arc();
        let mut current_id = root_id;
        let mut node = match deserialize_node::<K>(&guard) {
            Ok(node) => node,
            Err(e) => {
                drop(guard);
                self.buffer_pool.unpin_page(current_id, false)?;
                return Err(e);
            }
        };

        if node.is_safe(op) {
            ctx.release(&self.buffer_pool)?;
        }

        loop {
            if node.is_leaf() {
                return Ok((current_id, guard, node));
            }

            let child_id = node.children[node.child_index(key)];
            let child_page = match self.buffer_pool.fetch_page(child_id) {
                Ok(page) => page,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    ctx.release(&self.buffer_pool)?;
                    return Err(e.into());
                }
            };
            let child_guard = child_page.write_arc();
            let child_node = match deserialize_node::<K>(&child_guard) {
                Ok(node) => node,
                Err(e) => {
                    drop(child_guard);
                    self.buffer_pool.unpin_page(child_id, false)?;
                    drop(guard);
                    self.buffer_pool.unpin_page(current_id, false)?;
                    ctx.release(&self.buffer_pool)?;
                    return Err(e);
                }
            };

            ctx.ancestors.push((current_id, guard));
            if child_node.is_safe(op) {
                ctx.release(&self.buffer_pool)?;
            }

            guard = child_guard;
            node = child_node;
            current_id = child_id;
        }
    }

    // Insertion internals

    /// First pair of an empty tree: allocate a leaf root and point the
    /// header record at it. The root guard is still held.
    fn start_new_tree(&self, key: K, rid: Rid, ctx: &mut WriteContext) -> Result<(), BTreeError> {
        let (page, page_id) = self.buffer_pool.new_page()?;

        let mut root = BTreeNode::new_leaf(page_id, INVALID_PAGE_ID, self.leaf_max_size);
        root.insert_into_leaf(key, rid);
        {
            let mut page_guard = page.write();
            serialize_node(&root, &mut page_guard)?;
        }
        self.buffer_pool.unpin_page(page_id, true)?;
        self.set_root(ctx, page_id)?;

        Ok(())
    }

    /// Propagate a split upward. `old` is still latched; `new` is the
    /// freshly allocated sibling, pinned but unlatched (it is invisible
    /// until the latched parent links it). Splits cascade through the
    /// ancestor chain until a node absorbs the separator, or a new root
    /// is grown.
    #[allow(clippy::too_many_arguments)]
    fn insert_into_parent(
        &self,
        mut old_id: PageId,
        mut old_guard: PageWriteGuard,
        mut old_node: BTreeNode<K>,
        mut separator: K,
        mut new_id: PageId,
        mut new_page: PagePtr,
        mut new_node: BTreeNode<K>,
        ctx: &mut WriteContext,
    ) -> Result<(), BTreeError> {
        loop {
            if old_node.is_root() {
                // Grow a new root above the split pair.
                let (root_page, root_id) = self.buffer_pool.new_page()?;
                let mut root =
                    BTreeNode::new_internal(root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.keys.push(separator);
                root.children.push(old_id);
                root.children.push(new_id);
                {
                    let mut root_guard = root_page.write();
                    serialize_node(&root, &mut root_guard)?;
                }
                self.buffer_pool.unpin_page(root_id, true)?;

                old_node.parent_page_id = root_id;
                new_node.parent_page_id = root_id;
                serialize_node(&old_node, &mut *old_guard)?;
                drop(old_guard);
                self.buffer_pool.unpin_page(old_id, true)?;
                {
                    let mut new_guard = new_page.write();
                    serialize_node(&new_node, &mut new_guard)?;
                }
                self.buffer_pool.unpin_page(new_id, true)?;

                log::debug!("btree {}: new root {}", self.name, root_id);
                self.set_root(ctx, root_id)?;
                return Ok(());
            }

            let (parent_id, mut parent_guard) = ctx.pop_ancestor().ok_or_else(|| {
                BTreeError::Corrupted("unsafe node without a latched parent".to_string())
            })?;
            let mut parent = deserialize_node::<K>(&parent_guard)?;

            // The split pair is settled under this parent.
            new_node.parent_page_id = parent_id;
            serialize_node(&old_node, &mut *old_guard)?;
            drop(old_guard);
            self.buffer_pool.unpin_page(old_id, true)?;
            {
                let mut new_guard = new_page.write();
                serialize_node(&new_node, &mut new_guard)?;
            }
            self.buffer_pool.unpin_page(new_id, true)?;

            parent.insert_after(old_id, separator, new_id);

            if parent.size() < self.internal_max_size {
                serialize_node(&parent, &mut *parent_guard)?;
                drop(parent_guard);
                self.buffer_pool.unpin_page(parent_id, true)?;
                return Ok(());
            }

            // Parent overflows in turn.
            log::debug!("btree {}: splitting internal {}", self.name, parent_id);
            let (right_page, right_id) = self.buffer_pool.new_page()?;
            let (right, push_up) = parent.split_internal(right_id);
            for &child in &right.children {
                self.reparent(child, right_id)?;
            }

            old_id = parent_id;
            old_guard = parent_guard;
            old_node = parent;
            separator = push_up;
            new_id = right_id;
            new_page = right_page;
            new_node = right;
        }
    }

    // Deletion internals

    /// Rebalance an underfull node: merge with a sibling when the pair
    /// fits in one page, otherwise borrow one entry. Merging removes a
    /// separator from the parent, which may cascade. `guard` and the
    /// node's pin are consumed.
    fn coalesce_or_redistribute(
        &self,
        mut id: PageId,
        mut guard: PageWriteGuard,
        mut node: BTreeNode<K>,
        ctx: &mut WriteContext,
        txn: &Transaction,
    ) -> Result<(), BTreeError> {
        loop {
            if node.is_root() {
                self.adjust_root(id, guard, node, ctx, txn)?;
                return Ok(());
            }

            let (parent_id, mut parent_guard) = ctx.pop_ancestor().ok_or_else(|| {
                BTreeError::Corrupted("unsafe node without a latched parent".to_string())
            })?;
            let mut parent = deserialize_node::<K>(&parent_guard)?;

            let position = parent.child_position(id).ok_or_else(|| {
                BTreeError::Corrupted("node missing from its parent".to_string())
            })?;
            // The leftmost child pairs with its right sibling, everyone
            // else with the left one.
            let sibling_position = if position > 0 { position - 1 } else { 1 };
            let sibling_id = parent.children[sibling_position];

            let sibling_page = self.buffer_pool.fetch_page(sibling_id)?;
            let mut sibling_guard = sibling_page.write_arc();
            let mut sibling = deserialize_node::<K>(&sibling_guard)?;

            let merged = sibling.size() + node.size() <= node.max_size - 1;
            if merged {
                if position == 0 {
                    // Right sibling drains into this node.
                    let separator = parent.separator_at(1).clone();
                    self.merge_into(&mut node, sibling, separator)?;
                    parent.remove_child(1);

                    serialize_node(&node, &mut *guard)?;
                    drop(guard);
                    self.buffer_pool.unpin_page(id, true)?;
                    drop(sibling_guard);
                    self.buffer_pool.unpin_page(sibling_id, true)?;
                    txn.add_deleted_page(sibling_id);
                    log::debug!("btree {}: merged {} into {}", self.name, sibling_id, id);
                } else {
                    // This node drains into its left sibling.
                    let separator = parent.separator_at(position).clone();
                    self.merge_into(&mut sibling, node, separator)?;
                    parent.remove_child(position);

                    serialize_node(&sibling, &mut *sibling_guard)?;
                    drop(sibling_guard);
                    self.buffer_pool.unpin_page(sibling_id, true)?;
                    drop(guard);
                    self.buffer_pool.unpin_page(id, true)?;
                    txn.add_deleted_page(id);
                    log::debug!("btree {}: merged {} into {}", self.name, id, sibling_id);
                }

                if parent.is_root() || parent.size() < parent.min_size() {
                    id = parent_id;
                    guard = parent_guard;
                    node = parent;
                    continue;
                }

                serialize_node(&parent, &mut *parent_guard)?;
                drop(parent_guard);
                self.buffer_pool.unpin_page(parent_id, true)?;
                return Ok(());
            }

            // Redistribute one entry from the sibling.
            if position == 0 {
                self.borrow_from_right(&mut node, &mut sibling, &mut parent)?;
            } else {
                self.borrow_from_left(&mut node, &mut sibling, &mut parent, position)?;
            }

            serialize_node(&node, &mut *guard)?;
            drop(guard);
            self.buffer_pool.unpin_page(id, true)?;
            serialize_node(&sibling, &mut *sibling_guard)?;
            drop(sibling_guard);
            self.buffer_pool.unpin_page(sibling_id, true)?;
            serialize_node(&parent, &mut *parent_guard)?;
            drop(parent_guard);
            self.buffer_pool.unpin_page(parent_id, true)?;
            return Ok(());
        }
    }

    /// Move everything from `from` (the right participant) into `into`
    /// (the left). Internal merges pull the parent separator down;
    /// leaf merges splice the sibling chain.
    fn merge_into(
        &self,
        into: &mut BTreeNode<K>,
        from: BTreeNode<K>,
        separator: K,
    ) -> Result<(), BTreeError> {
        if into.is_leaf() {
            into.keys.extend(from.keys);
            into.values.extend(from.values);
            into.next_page_id = from.next_page_id;
        } else {
            into.keys.push(separator);
            into.keys.extend(from.keys);
            for &child in &from.children {
                self.reparent(child, into.page_id)?;
            }
            into.children.extend(from.children);
        }
        Ok(())
    }

    fn borrow_from_right(
        &self,
        node: &mut BTreeNode<K>,
        sibling: &mut BTreeNode<K>,
        parent: &mut BTreeNode<K>,
    ) -> Result<(), BTreeError> {
        if node.is_leaf() {
            let key = sibling.keys.remove(0);
            let value = sibling.values.remove(0);
            node.keys.push(key);
            node.values.push(value);
            parent.set_separator(1, sibling.keys[0].clone());
        } else {
            // Rotate through the parent separator.
            let moved_child = sibling.children.remove(0);
            node.keys.push(parent.separator_at(1).clone());
            node.children.push(moved_child);
            parent.set_separator(1, sibling.keys.remove(0));
            self.reparent(moved_child, node.page_id)?;
        }
        Ok(())
    }

    fn borrow_from_left(
        &self,
        node: &mut BTreeNode<K>,
        sibling: &mut BTreeNode<K>,
        parent: &mut BTreeNode<K>,
        position: usize,
    ) -> Result<(), BTreeError> {
        if node.is_leaf() {
            let key = sibling
                .keys
                .pop()
                .ok_or_else(|| BTreeError::Corrupted("empty sibling".to_string()))?;
            let value = sibling
                .values
                .pop()
                .ok_or_else(|| BTreeError::Corrupted("empty sibling".to_string()))?;
            node.keys.insert(0, key.clone());
            node.values.insert(0, value);
            parent.set_separator(position, key);
        } else {
            let moved_child = sibling
                .children
                .pop()
                .ok_or_else(|| BTreeError::Corrupted("empty sibling".to_string()))?;
            let rotated = sibling
                .keys
                .pop()
                .ok_or_else(|| BTreeError::Corrupted("empty sibling".to_string()))?;
            node.keys.insert(0, parent.separator_at(position).clone());
            node.children.insert(0, moved_child);
            parent.set_separator(position, rotated);
            self.reparent(moved_child, node.page_id)?;
        }
        Ok(())
    }

    /// Shrink the tree at the top: an internal root left with a single
    /// child promotes that child; an empty leaf root empties the tree.
    fn adjust_root(
        &self,
        id: PageId,
        mut guard: PageWriteGuard,
        node: BTreeNode<K>,
        ctx: &mut WriteContext,
        txn: &Transaction,
    ) -> Result<(), BTreeError> {
        if !node.is_leaf() && node.size() == 1 {
            let child_id = node.children[0];
            self.reparent(child_id, INVALID_PAGE_ID)?;
            drop(guard);
            self.buffer_pool.unpin_page(id, true)?;
            txn.add_deleted_page(id);
            log::debug!("btree {}: root collapsed to {}", self.name, child_id);
            self.set_root(ctx, child_id)?;
        } else if node.is_leaf() && node.size() == 0 {
            drop(guard);
            self.buffer_pool.unpin_page(id, true)?;
            txn.add_deleted_page(id);
            log::debug!("btree {}: tree is now empty", self.name);
            self.set_root(ctx, INVALID_PAGE_ID)?;
        } else {
            serialize_node(&node, &mut *guard)?;
            drop(guard);
            self.buffer_pool.unpin_page(id, true)?;
        }
        Ok(())
    }

    // Shared plumbing

    /// Patch a child's parent link on its own page.
    fn reparent(&self, child_id: PageId, parent_id: PageId) -> Result<(), BTreeError> {
        let page = self.buffer_pool.fetch_page(child_id)?;
        {
            let mut page_guard = page.write();
            write_parent_page_id(&mut page_guard, parent_id);
        }
        self.buffer_pool.unpin_page(child_id, true)?;
        Ok(())
    }

    /// Rewrite the root page id under the held root guard and mirror it
    /// into the header page record.
    fn set_root(&self, ctx: &mut WriteContext, root_id: PageId) -> Result<(), BTreeError> {
        let root_guard = ctx.root_guard.as_mut().ok_or_else(|| {
            BTreeError::Corrupted("root changed without the root guard".to_string())
        })?;
        **root_guard = root_id;
        self.update_header_record(root_id)
    }

    fn update_header_record(&self, root_id: PageId) -> Result<(), BTreeError> {
        let header = HeaderPage::new();
        let page = self.buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        let result = {
            let mut page_guard = page.write();
            match header.update_record(&mut page_guard, &self.name, root_id) {
                Err(PageError::RecordNotFound) => {
                    header.insert_record(&mut page_guard, &self.name, root_id)
                }
                other => other,
            }
        };
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, result.is_ok())?;
        result?;
        Ok(())
    }

    /// Drop the pages a remove scheduled for deletion, now that every
    /// latch is released.
    fn delete_pages(&self, txn: &Transaction) -> Result<(), BTreeError> {
        for page_id in txn.take_deleted_pages() {
            self.buffer_pool.delete_page(page_id)?;
        }
        Ok(())
    }
}
