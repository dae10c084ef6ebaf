use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type. Page 0 is the header page that maps index names to
/// their root pages; negative values never name a real page.
pub type PageId = i32;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = -1;

/// The header page holding (index name, root page id) records.
pub const HEADER_PAGE_ID: PageId = 0;

/// Transaction ID type
pub type TxnId = u32;

/// Buffer pool frame ID type
pub type FrameId = u32;

/// Slot number within a slotted page
pub type SlotId = u32;

/// Record ID: locates a tuple in the heap by (page, slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: SlotId,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: SlotId) -> Self {
        Self { page_id, slot_num }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}

/// Page structure: a fixed-size byte buffer plus the id of the disk
/// page currently resident in it. The surrounding `RwLock` is the page
/// latch manipulated by the index and heap layers.
#[derive(Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
    pub page_id: PageId,
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            data: [0; PAGE_SIZE],
            page_id,
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page").field("page_id", &self.page_id).finish()
    }
}

/// Smart pointer to a latched page
pub type PagePtr = Arc<RwLock<Page>>;

/// Buffer pool frame metadata. `pin_count` and `is_dirty` live under
/// the buffer pool's guard; the page latch is inside `page` itself.
#[derive(Debug)]
pub struct Frame {
    pub page: PagePtr,
    pub pin_count: u32,
    pub is_dirty: bool,
}

impl Frame {
    pub fn new(page: PagePtr) -> Self {
        Self {
            page,
            pin_count: 0,
            is_dirty: false,
        }
    }
}
