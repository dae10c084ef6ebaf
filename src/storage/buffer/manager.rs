use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use parking_lot::{Mutex, MutexGuard};

use crate::common::types::{Frame, FrameId, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;
use crate::storage::disk::DiskManager;

/// Everything the pool guard protects: the frame metadata, the page
/// table, the free list and the replacer. The hot contention is on the
/// page table and replacer, so one coarse mutex covers them all; the
/// per-page reader/writer latches live inside the pages themselves and
/// are taken above this layer.
struct PoolInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruReplacer,
}

pub struct BufferPoolManager {
    pool_size: usize,
    disk_manager: Arc<DiskManager>,
    inner: Mutex<PoolInner>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, db_path: impl AsRef<Path>) -> Result<Self, BufferPoolError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        Ok(Self::with_disk_manager(pool_size, disk_manager))
    }

    pub fn with_disk_manager(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            frames.push(Frame::new(Arc::new(parking_lot::RwLock::new(Page::new(
                INVALID_PAGE_ID,
            )))));
            free_list.push_back(i as FrameId);
        }

        Self {
            pool_size,
            disk_manager,
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::new(),
                free_list,
                replacer: LruReplacer::new(pool_size),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page, pinning its frame. The caller must balance this
    /// with exactly one `unpin_page` on every exit path.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id < 0 {
            return Err(BufferPoolError::InvalidOperation(format!(
                "cannot fetch page {}",
                page_id
            )));
        }

        let mut inner = self.inner.lock();

        // Already resident: bump the pin count and shield the frame
        // from eviction.
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id as usize].pin_count += 1;
            inner.replacer.pin(frame_id);
            return Ok(inner.frames[frame_id as usize].page.clone());
        }

        let frame_id = self.take_victim_frame(&mut inner)?;

        // Read the page into the reclaimed frame. The frame has
        // pin_count 0, so nobody holds its page latch.
        {
            let page = inner.frames[frame_id as usize].page.clone();
            let mut page_guard = page.write();
            self.disk_manager.read_page(page_id, &mut page_guard)?;
        }

        let frame = &mut inner.frames[frame_id as usize];
        frame.pin_count = 1;
        frame.is_dirty = false;
        inner.page_table.insert(page_id, frame_id);
        inner.replacer.pin(frame_id);

        Ok(inner.frames[frame_id as usize].page.clone())
    }

    /// Allocate a brand new zeroed page, pinned once.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = self.take_victim_frame(&mut inner)?;
        let page_id = self.disk_manager.allocate_page();

        {
            let page = inner.frames[frame_id as usize].page.clone();
            let mut page_guard = page.write();
            page_guard.data.fill(0);
            page_guard.page_id = page_id;
        }

        let frame = &mut inner.frames[frame_id as usize];
        frame.pin_count = 1;
        frame.is_dirty = true;
        inner.page_table.insert(page_id, frame_id);
        inner.replacer.pin(frame_id);

        Ok((inner.frames[frame_id as usize].page.clone(), page_id))
    }

    /// Drop one pin, or-ing in the dirty flag. The frame becomes
    /// evictable when the count reaches zero. Unpinning a page that is
    /// not resident or not pinned is a caller bug and reported as such.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = *inner
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &mut inner.frames[frame_id as usize];
        if frame.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        frame.pin_count -= 1;
        if is_dirty {
            frame.is_dirty = true;
        }

        if frame.pin_count == 0 {
            inner.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Write a resident page back to disk and clear its dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = *inner
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        self.write_back(&mut inner, frame_id)?;
        Ok(())
    }

    /// Write every dirty resident page back to disk.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_ids: Vec<FrameId> = inner.page_table.values().copied().collect();
        for frame_id in frame_ids {
            if inner.frames[frame_id as usize].is_dirty {
                self.write_back(&mut inner, frame_id)?;
            }
        }
        Ok(())
    }

    /// Remove a page from the pool and hand its frame back to the free
    /// list. Deleting a page that is not resident succeeds; deleting a
    /// pinned page fails.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                self.disk_manager.deallocate_page(page_id);
                return Ok(());
            }
        };

        if inner.frames[frame_id as usize].pin_count > 0 {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        // Dirty pages go back to disk before the frame is recycled.
        if inner.frames[frame_id as usize].is_dirty {
            self.write_back(&mut inner, frame_id)?;
        }

        inner.page_table.remove(&page_id);
        inner.replacer.pin(frame_id);

        {
            let page = inner.frames[frame_id as usize].page.clone();
            let mut page_guard = page.write();
            page_guard.data.fill(0);
            page_guard.page_id = INVALID_PAGE_ID;
        }
        inner.frames[frame_id as usize].is_dirty = false;
        inner.free_list.push_back(frame_id);

        self.disk_manager.deallocate_page(page_id);
        Ok(())
    }

    /// Claim a frame from the free list, or evict the replacer's victim
    /// (writing it back first when dirty). Fails when every frame is
    /// pinned.
    fn take_victim_frame(
        &self,
        inner: &mut MutexGuard<'_, PoolInner>,
    ) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = inner
            .replacer
            .victim()
            .ok_or(BufferPoolError::BufferPoolFull)?;

        if inner.frames[frame_id as usize].is_dirty {
            self.write_back(inner, frame_id)?;
        }

        let old_page_id = inner.frames[frame_id as usize].page.read().page_id;
        if old_page_id != INVALID_PAGE_ID {
            log::trace!("evicting page {} from frame {}", old_page_id, frame_id);
            inner.page_table.remove(&old_page_id);
        }

        Ok(frame_id)
    }

    fn write_back(
        &self,
        inner: &mut MutexGuard<'_, PoolInner>,
        frame_id: FrameId,
    ) -> Result<(), BufferPoolError> {
        {
            let page = inner.frames[frame_id as usize].page.clone();
            let page_guard = page.read();
            self.disk_manager.write_page(&page_guard)?;
        }
        inner.frames[frame_id as usize].is_dirty = false;
        Ok(())
    }
}
