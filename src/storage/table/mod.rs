mod heap;
mod iterator;
mod tuple;

pub use heap::{TableError, TableHeap};
pub use iterator::TableIterator;
pub use tuple::{Tuple, TupleError};
