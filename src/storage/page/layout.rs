use byteorder::{ByteOrder, LittleEndian};

/// Slotted page layout: a fixed header at the front, record bytes
/// growing forward from the header, and the slot array growing backward
/// from the page tail.
pub const HEADER_SIZE: usize = 20;

/// A slot holds a record's offset and length, 4 bytes each.
pub const SLOT_SIZE: usize = 8;

/// One entry of the slot array. A zero length marks a deleted record;
/// the slot itself is never reused so record ids stay stable.
#[derive(Debug, Clone, Copy)]
pub struct RecordLocation {
    pub offset: u32,
    pub length: u32,
}

impl RecordLocation {
    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.offset);
        LittleEndian::write_u32(&mut bytes[4..8], self.length);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            offset: LittleEndian::read_u32(&bytes[0..4]),
            length: LittleEndian::read_u32(&bytes[4..8]),
        }
    }
}
