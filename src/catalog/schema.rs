// Schema Management Module
//
// Defines the DataType enum and the Schema type: an ordered list of
// columns with name-based lookup.

use std::fmt;
use serde::{Deserialize, Serialize};

use super::column::Column;

/// Data types supported by the storage core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Text => write!(f, "TEXT"),
        }
    }
}

/// An ordered list of columns. Executors treat schemas as static per
/// plan node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find a column's position by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Build the schema of a projection over the given column indices,
    /// e.g. the key schema of an index.
    pub fn project(&self, attrs: &[usize]) -> Schema {
        let columns = attrs
            .iter()
            .filter_map(|&i| self.columns.get(i).cloned())
            .collect();
        Schema { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lookup() {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Text),
        ]);

        assert_eq!(schema.column_count(), 2);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert_eq!(schema.column_at(0).unwrap().data_type(), DataType::Integer);
    }

    #[test]
    fn test_projection() {
        let schema = Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Boolean),
            Column::new("c", DataType::Text),
        ]);

        let key_schema = schema.project(&[2, 0]);
        assert_eq!(key_schema.column_count(), 2);
        assert_eq!(key_schema.column_at(0).unwrap().name(), "c");
        assert_eq!(key_schema.column_at(1).unwrap().name(), "a");
    }
}
