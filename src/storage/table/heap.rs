use std::sync::Arc;
use thiserror::Error;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager};
use crate::storage::page::{PageError, PageManager, HEADER_SIZE, SLOT_SIZE};
use crate::storage::table::tuple::{Tuple, TupleError};
use crate::transaction::transaction::{TableWriteOp, TableWriteRecord, Transaction};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Tuple of {0} bytes does not fit in a page")]
    TupleTooLarge(usize),
    #[error("Page error: {0}")]
    Page(#[from] PageError),
    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
    #[error("Tuple error: {0}")]
    Tuple(#[from] TupleError),
}

/// A heap file: a doubly linked chain of slotted pages. Inserts walk
/// the chain and grow it when every page is full; deletes mark slots so
/// record ids stay stable. Mutations append write records onto the
/// owning transaction, which the abort path replays in reverse.
pub struct TableHeap {
    buffer_pool: Arc<BufferPoolManager>,
    page_manager: PageManager,
    first_page_id: PageId,
}

impl TableHeap {
    /// Create a heap with one empty page.
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Result<Self, TableError> {
        let page_manager = PageManager::new();
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut page_guard = page.write();
            page_manager.init_page(&mut page_guard);
        }
        buffer_pool.unpin_page(page_id, true)?;

        Ok(Self {
            buffer_pool,
            page_manager,
            first_page_id: page_id,
        })
    }

    /// Reattach to an existing heap by its first page.
    pub fn open(buffer_pool: Arc<BufferPoolManager>, first_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            page_manager: PageManager::new(),
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub(crate) fn page_manager(&self) -> &PageManager {
        &self.page_manager
    }

    pub(crate) fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    /// Insert a tuple, extending the page chain when needed. Returns
    /// the new record id.
    pub fn insert_tuple(
        self: &Arc<Self>,
        tuple: &Tuple,
        txn: &Transaction,
    ) -> Result<Rid, TableError> {
        if tuple.data().len() + SLOT_SIZE > PAGE_SIZE - HEADER_SIZE {
            return Err(TableError::TupleTooLarge(tuple.data().len()));
        }

        let mut page_id = self.first_page_id;
        loop {
            let page = self.buffer_pool.fetch_page(page_id)?;

            let insert_result = {
                let mut page_guard = page.write();
                self.page_manager.insert_record(&mut page_guard, tuple.data())
            };

            match insert_result {
                Ok(slot) => {
                    self.buffer_pool.unpin_page(page_id, true)?;
                    let rid = Rid::new(page_id, slot);
                    txn.append_table_write_record(TableWriteRecord {
                        rid,
                        op: TableWriteOp::Insert,
                        table: Arc::clone(self),
                    });
                    return Ok(rid);
                }
                Err(PageError::InsufficientSpace) => {
                    let next_page_id = {
                        let page_guard = page.read();
                        self.page_manager.get_header(&page_guard).next_page_id
                    };

                    if next_page_id != INVALID_PAGE_ID {
                        self.buffer_pool.unpin_page(page_id, false)?;
                        page_id = next_page_id;
                        continue;
                    }

                    // Chain exhausted: grow it by one page.
                    let (new_page, new_page_id) = self.buffer_pool.new_page()?;
                    {
                        let mut new_guard = new_page.write();
                        self.page_manager.init_page(&mut new_guard);
                        let mut new_header = self.page_manager.get_header(&new_guard);
                        new_header.prev_page_id = page_id;
                        self.page_manager.set_header(&mut new_guard, &new_header);
                    }
                    {
                        let mut page_guard = page.write();
                        let mut header = self.page_manager.get_header(&page_guard);
                        header.next_page_id = new_page_id;
                        self.page_manager.set_header(&mut page_guard, &header);
                    }
                    self.buffer_pool.unpin_page(page_id, true)?;
                    self.buffer_pool.unpin_page(new_page_id, true)?;
                    page_id = new_page_id;
                }
                Err(e) => {
                    self.buffer_pool.unpin_page(page_id, false)?;
                    return Err(e.into());
                }
            }
        }
    }

    /// Read the tuple at the given record id.
    pub fn get_tuple(&self, rid: Rid) -> Result<Tuple, TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let record = {
            let page_guard = page.read();
            self.page_manager.get_record(&page_guard, rid.slot_num)
        };
        self.buffer_pool.unpin_page(rid.page_id, false)?;

        let mut tuple = Tuple::from_bytes(record?);
        tuple.set_rid(rid);
        Ok(tuple)
    }

    /// Delete the tuple at `rid`, remembering its bytes for undo.
    pub fn mark_delete(self: &Arc<Self>, rid: Rid, txn: &Transaction) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager
                .get_record(&page_guard, rid.slot_num)
                .and_then(|old| {
                    self.page_manager.delete_record(&mut page_guard, rid.slot_num)?;
                    Ok(old)
                })
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;

        let old = result?;
        txn.append_table_write_record(TableWriteRecord {
            rid,
            op: TableWriteOp::Delete { old },
            table: Arc::clone(self),
        });
        Ok(())
    }

    /// Replace the tuple at `rid`, remembering the old bytes for undo.
    pub fn update_tuple(
        self: &Arc<Self>,
        new_tuple: &Tuple,
        rid: Rid,
        txn: &Transaction,
    ) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager
                .get_record(&page_guard, rid.slot_num)
                .and_then(|old| {
                    self.page_manager
                        .update_record(&mut page_guard, rid.slot_num, new_tuple.data())?;
                    Ok(old)
                })
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;

        let old = result?;
        txn.append_table_write_record(TableWriteRecord {
            rid,
            op: TableWriteOp::Update { old },
            table: Arc::clone(self),
        });
        Ok(())
    }

    // Abort-path helpers. These rewrite the heap without appending new
    // write records.

    pub(crate) fn undo_insert(&self, rid: Rid) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager.delete_record(&mut page_guard, rid.slot_num)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }

    pub(crate) fn undo_delete(&self, rid: Rid, old: &[u8]) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager
                .insert_record_at(&mut page_guard, rid.slot_num, old)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }

    pub(crate) fn undo_update(&self, rid: Rid, old: &[u8]) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager
                .update_record(&mut page_guard, rid.slot_num, old)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }
}
