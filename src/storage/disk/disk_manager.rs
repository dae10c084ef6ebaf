use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Page, PageId, INVALID_PAGE_ID, PAGE_SIZE};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
}

/// DiskManager handles block-addressable page I/O over a single data
/// file. A page lives at offset `page_id * PAGE_SIZE`; page 0 is the
/// header page. Page ids are handed out monotonically; deallocation is
/// bookkeeping only, reuse happens through the buffer pool's free list.
pub struct DiskManager {
    db_file: Mutex<File>,
    next_page_id: AtomicI32,
}

impl DiskManager {
    /// Open (or create) the database file at the given path.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DiskManagerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_path)?;

        // Page 0 is reserved for the header page, so allocation starts
        // at 1 even on a fresh file.
        let file_size = file.metadata()?.len();
        let next_page_id = std::cmp::max(1, (file_size / PAGE_SIZE as u64) as PageId);

        Ok(Self {
            db_file: Mutex::new(file),
            next_page_id: AtomicI32::new(next_page_id),
        })
    }

    /// Read a page from disk. A read past the end of the file yields a
    /// zeroed buffer, so freshly allocated pages come back empty.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        if page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page_id));
        }

        let offset = self.page_offset(page_id);
        let mut file = self.db_file.lock();

        let file_size = file.metadata()?.len();
        if offset >= file_size {
            page.data.fill(0);
            page.page_id = page_id;
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut page.data)?;
        page.page_id = page_id;

        Ok(())
    }

    /// Write a page back to disk at its fixed offset.
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        if page.page_id < 0 {
            return Err(DiskManagerError::InvalidPageId(page.page_id));
        }

        let offset = self.page_offset(page.page_id);
        let mut file = self.db_file.lock();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data)?;
        file.flush()?;

        Ok(())
    }

    /// Hand out the next page id. The file itself grows lazily when the
    /// page is first written.
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Deallocation is a no-op: freed frames cycle through the buffer
    /// pool's free list, the file never shrinks.
    pub fn deallocate_page(&self, page_id: PageId) {
        debug_assert!(page_id != INVALID_PAGE_ID);
        log::trace!("deallocate page {}", page_id);
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_then_read_page() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let mut page = Page::new(2);
        page.data[0] = 0xAB;
        page.data[PAGE_SIZE - 1] = 0xCD;
        disk.write_page(&page).unwrap();

        let mut read_back = Page::new(INVALID_PAGE_ID);
        disk.read_page(2, &mut read_back).unwrap();
        assert_eq!(read_back.page_id, 2);
        assert_eq!(read_back.data[0], 0xAB);
        assert_eq!(read_back.data[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_read_past_eof_returns_zeroed_page() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let mut page = Page::new(INVALID_PAGE_ID);
        page.data.fill(0xFF);
        disk.read_page(7, &mut page).unwrap();

        assert_eq!(page.page_id, 7);
        assert!(page.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_is_monotonic_and_skips_header() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let first = disk.allocate_page();
        let second = disk.allocate_page();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let file = NamedTempFile::new().unwrap();
        let disk = DiskManager::new(file.path()).unwrap();

        let mut page = Page::new(INVALID_PAGE_ID);
        assert!(disk.read_page(INVALID_PAGE_ID, &mut page).is_err());
    }
}
