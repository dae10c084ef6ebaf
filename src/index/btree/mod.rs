pub mod error;
pub mod iterator;
pub mod node;
pub mod serialization;
pub mod tree;

pub use error::BTreeError;
pub use iterator::TreeIterator;
pub use node::{BTreeNode, NodeType, TreeOp};
pub use serialization::{deserialize_node, serialize_node};
pub use tree::BPlusTree;
