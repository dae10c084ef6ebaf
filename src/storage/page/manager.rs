use crate::common::types::{Page, SlotId, PAGE_SIZE};
use crate::storage::page::error::PageError;
use crate::storage::page::header::PageHeader;
use crate::storage::page::layout::{RecordLocation, HEADER_SIZE, SLOT_SIZE};

/// Slotted-page record operations. Slot entries are stored from the end
/// of the page; record data grows from the front, after the header.
/// Deleting a record zeroes its slot length so slot numbers (and with
/// them record ids) stay stable.
pub struct PageManager;

impl Default for PageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageManager {
    pub fn new() -> Self {
        Self
    }

    /// Stamp a fresh header onto a zeroed page.
    pub fn init_page(&self, page: &mut Page) {
        let header = PageHeader::new();
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    pub fn get_header(&self, page: &Page) -> PageHeader {
        PageHeader::from_bytes(&page.data[0..HEADER_SIZE])
    }

    pub fn set_header(&self, page: &mut Page, header: &PageHeader) {
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    pub fn record_count(&self, page: &Page) -> u32 {
        self.get_header(page).record_count
    }

    pub fn free_space(&self, page: &Page) -> u32 {
        self.get_header(page).free_space_size
    }

    /// Append a record, returning the slot it landed in.
    pub fn insert_record(&self, page: &mut Page, data: &[u8]) -> Result<SlotId, PageError> {
        let mut header = self.get_header(page);

        let record_size = data.len() as u32;
        let total_needed = record_size + SLOT_SIZE as u32;
        if header.free_space_size < total_needed {
            return Err(PageError::InsufficientSpace);
        }

        let slot = header.record_count;
        let slot_pos = Self::slot_position(slot);

        let location = RecordLocation {
            offset: header.free_space_offset,
            length: record_size,
        };

        let start = header.free_space_offset as usize;
        page.data[start..start + data.len()].copy_from_slice(data);
        page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&location.to_bytes());

        header.free_space_offset += record_size;
        header.free_space_size -= total_needed;
        header.record_count += 1;
        self.set_header(page, &header);

        Ok(slot)
    }

    /// Mark a record deleted by zeroing its slot length. The dead bytes
    /// are not reclaimed until compaction.
    pub fn delete_record(&self, page: &mut Page, slot: SlotId) -> Result<(), PageError> {
        let header = self.get_header(page);
        let mut location = self.slot_location(page, slot, &header)?;

        if location.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        location.length = 0;
        let slot_pos = Self::slot_position(slot);
        page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&location.to_bytes());

        Ok(())
    }

    /// Overwrite a record in place; a growing record is relocated to the
    /// free area, keeping its slot number.
    pub fn update_record(&self, page: &mut Page, slot: SlotId, data: &[u8]) -> Result<(), PageError> {
        let mut header = self.get_header(page);
        let location = self.slot_location(page, slot, &header)?;

        if location.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        let new_size = data.len() as u32;
        let slot_pos = Self::slot_position(slot);

        if new_size > location.length {
            let extra = new_size - location.length;
            if header.free_space_size < extra {
                return Err(PageError::InsufficientSpace);
            }

            let new_offset = header.free_space_offset;
            let start = new_offset as usize;
            page.data[start..start + data.len()].copy_from_slice(data);

            let new_location = RecordLocation {
                offset: new_offset,
                length: new_size,
            };
            page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&new_location.to_bytes());

            header.free_space_offset += new_size;
            header.free_space_size -= extra;
            self.set_header(page, &header);
            return Ok(());
        }

        let start = location.offset as usize;
        page.data[start..start + data.len()].copy_from_slice(data);

        if new_size < location.length {
            let new_location = RecordLocation {
                offset: location.offset,
                length: new_size,
            };
            page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&new_location.to_bytes());
        }

        Ok(())
    }

    pub fn get_record(&self, page: &Page, slot: SlotId) -> Result<Vec<u8>, PageError> {
        let header = self.get_header(page);
        let location = self.slot_location(page, slot, &header)?;

        if location.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        let start = location.offset as usize;
        let end = start + location.length as usize;
        Ok(page.data[start..end].to_vec())
    }

    pub fn is_deleted(&self, page: &Page, slot: SlotId) -> Result<bool, PageError> {
        let header = self.get_header(page);
        let location = self.slot_location(page, slot, &header)?;
        Ok(location.length == 0)
    }

    /// Restore a record into a previously deleted slot. Used by the
    /// transaction abort path to undo a delete.
    pub fn insert_record_at(&self, page: &mut Page, slot: SlotId, data: &[u8]) -> Result<(), PageError> {
        let mut header = self.get_header(page);
        let location = self.slot_location(page, slot, &header)?;

        if location.length > 0 {
            return Err(PageError::DuplicateRecord);
        }

        let record_size = data.len() as u32;
        if header.free_space_size < record_size {
            return Err(PageError::InsufficientSpace);
        }

        let new_offset = header.free_space_offset;
        let start = new_offset as usize;
        page.data[start..start + data.len()].copy_from_slice(data);

        let new_location = RecordLocation {
            offset: new_offset,
            length: record_size,
        };
        let slot_pos = Self::slot_position(slot);
        page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&new_location.to_bytes());

        header.free_space_offset += record_size;
        header.free_space_size -= record_size;
        self.set_header(page, &header);

        Ok(())
    }

    fn slot_location(
        &self,
        page: &Page,
        slot: SlotId,
        header: &PageHeader,
    ) -> Result<RecordLocation, PageError> {
        if slot >= header.record_count {
            return Err(PageError::InvalidSlot);
        }
        let slot_pos = Self::slot_position(slot);
        Ok(RecordLocation::from_bytes(
            &page.data[slot_pos..slot_pos + SLOT_SIZE],
        ))
    }

    fn slot_position(slot: SlotId) -> usize {
        PAGE_SIZE - SLOT_SIZE * (slot as usize + 1)
    }
}
