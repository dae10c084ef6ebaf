use std::sync::Arc;

use crate::common::types::{PageId, Rid, SlotId, INVALID_PAGE_ID};
use crate::storage::page::PageError;
use crate::storage::table::heap::{TableError, TableHeap};
use crate::storage::table::tuple::Tuple;

/// Forward iterator over the live tuples of a heap, in page-chain then
/// slot order. Deleted slots are skipped; each step pins the current
/// page only for the duration of the read.
pub struct TableIterator {
    heap: Arc<TableHeap>,
    current_page_id: PageId,
    current_slot: SlotId,
}

impl TableIterator {
    pub fn new(heap: Arc<TableHeap>) -> Self {
        let current_page_id = heap.first_page_id();
        Self {
            heap,
            current_page_id,
            current_slot: 0,
        }
    }

    /// Advance to the next live tuple, or `None` at end of heap.
    pub fn next(&mut self) -> Result<Option<(Tuple, Rid)>, TableError> {
        loop {
            if self.current_page_id == INVALID_PAGE_ID {
                return Ok(None);
            }

            let buffer_pool = self.heap.buffer_pool().clone();
            let page_manager = self.heap.page_manager();
            let page = buffer_pool.fetch_page(self.current_page_id)?;

            let scan_result = {
                let page_guard = page.read();
                let record_count = page_manager.record_count(&page_guard);

                let mut found = None;
                while self.current_slot < record_count {
                    let slot = self.current_slot;
                    self.current_slot += 1;

                    match page_manager.get_record(&page_guard, slot) {
                        Ok(data) => {
                            found = Some(Ok((data, slot)));
                            break;
                        }
                        Err(PageError::RecordNotFound) => continue,
                        Err(e) => {
                            found = Some(Err(e));
                            break;
                        }
                    }
                }

                match found {
                    Some(result) => Some(result),
                    None => {
                        // Page exhausted: remember where to go next.
                        let header = page_manager.get_header(&page_guard);
                        self.current_page_id = header.next_page_id;
                        self.current_slot = 0;
                        None
                    }
                }
            };

            let page_id = page.read().page_id;
            buffer_pool.unpin_page(page_id, false)?;

            match scan_result {
                Some(Ok((data, slot))) => {
                    let rid = Rid::new(page_id, slot);
                    let mut tuple = Tuple::from_bytes(data);
                    tuple.set_rid(rid);
                    return Ok(Some((tuple, rid)));
                }
                Some(Err(e)) => return Err(e.into()),
                None => continue,
            }
        }
    }
}
