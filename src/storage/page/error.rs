use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Record not found")]
    RecordNotFound,
    #[error("Invalid slot number")]
    InvalidSlot,
    #[error("Record already exists at this slot")]
    DuplicateRecord,
    #[error("Record name too long")]
    NameTooLong,
}
