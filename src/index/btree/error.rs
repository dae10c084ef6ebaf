use thiserror::Error;

use crate::storage::buffer::BufferPoolError;
use crate::storage::page::PageError;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Node too large for page")]
    NodeTooLarge,

    #[error("Invalid page format")]
    InvalidPageFormat,

    #[error("Tree invariant violated: {0}")]
    Corrupted(String),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Header page error: {0}")]
    HeaderPage(#[from] PageError),
}
