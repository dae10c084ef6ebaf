use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, PageId};
use crate::storage::page::error::PageError;

const RECORD_COUNT_SIZE: usize = 4;
const NAME_LEN_SIZE: usize = 2;
const ROOT_ID_SIZE: usize = 4;
const MAX_NAME_LEN: usize = 64;

/// View over page 0, the header page: a packed sequence of
/// (name, root_page_id) records locating index roots by name.
///
/// Layout: `record_count: u32`, then per record `name_len: u16`,
/// `name` bytes, `root_page_id: i32`. A zeroed page reads as an empty
/// directory, so a fresh database file needs no initialization.
pub struct HeaderPage;

impl Default for HeaderPage {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderPage {
    pub fn new() -> Self {
        Self
    }

    pub fn record_count(&self, page: &Page) -> u32 {
        LittleEndian::read_u32(&page.data[0..RECORD_COUNT_SIZE])
    }

    /// Register a new (name, root) record. Fails on duplicate names.
    pub fn insert_record(&self, page: &mut Page, name: &str, root: PageId) -> Result<(), PageError> {
        if name.len() > MAX_NAME_LEN {
            return Err(PageError::NameTooLong);
        }
        if self.find(page, name).is_some() {
            return Err(PageError::DuplicateRecord);
        }

        let count = self.record_count(page);
        let offset = self.end_offset(page);
        let record_size = NAME_LEN_SIZE + name.len() + ROOT_ID_SIZE;
        if offset + record_size > page.data.len() {
            return Err(PageError::InsufficientSpace);
        }

        LittleEndian::write_u16(&mut page.data[offset..offset + 2], name.len() as u16);
        page.data[offset + 2..offset + 2 + name.len()].copy_from_slice(name.as_bytes());
        let root_pos = offset + 2 + name.len();
        LittleEndian::write_i32(&mut page.data[root_pos..root_pos + 4], root);

        LittleEndian::write_u32(&mut page.data[0..RECORD_COUNT_SIZE], count + 1);
        Ok(())
    }

    /// Rewrite the root page id of an existing record.
    pub fn update_record(&self, page: &mut Page, name: &str, root: PageId) -> Result<(), PageError> {
        match self.find(page, name) {
            Some((_, root_pos)) => {
                LittleEndian::write_i32(&mut page.data[root_pos..root_pos + 4], root);
                Ok(())
            }
            None => Err(PageError::RecordNotFound),
        }
    }

    pub fn get_root(&self, page: &Page, name: &str) -> Option<PageId> {
        self.find(page, name)
            .map(|(_, root_pos)| LittleEndian::read_i32(&page.data[root_pos..root_pos + 4]))
    }

    /// Walk the packed records; returns (record offset, root field offset).
    fn find(&self, page: &Page, name: &str) -> Option<(usize, usize)> {
        let count = self.record_count(page);
        let mut offset = RECORD_COUNT_SIZE;

        for _ in 0..count {
            let name_len = LittleEndian::read_u16(&page.data[offset..offset + 2]) as usize;
            let name_bytes = &page.data[offset + 2..offset + 2 + name_len];
            let root_pos = offset + 2 + name_len;
            if name_bytes == name.as_bytes() {
                return Some((offset, root_pos));
            }
            offset = root_pos + ROOT_ID_SIZE;
        }
        None
    }

    fn end_offset(&self, page: &Page) -> usize {
        let count = self.record_count(page);
        let mut offset = RECORD_COUNT_SIZE;
        for _ in 0..count {
            let name_len = LittleEndian::read_u16(&page.data[offset..offset + 2]) as usize;
            offset += NAME_LEN_SIZE + name_len + ROOT_ID_SIZE;
        }
        offset
    }
}
