use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::catalog::value::{CompositeKey, Value};
use crate::common::types::Rid;

#[derive(Error, Debug)]
pub enum TupleError {
    #[error("Expected {expected} values, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },
    #[error("Value for column {0} has the wrong type")]
    TypeMismatch(usize),
    #[error("Column index {0} out of range")]
    ColumnOutOfRange(usize),
    #[error("Tuple codec error: {0}")]
    Codec(String),
}

/// A tuple is an opaque byte payload plus the record id it was read
/// from or inserted at. The payload is a bincode-encoded `Vec<Value>`;
/// the schema that gives the bytes meaning travels separately with the
/// plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    data: Vec<u8>,
    rid: Option<Rid>,
}

impl Tuple {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Tuple { data, rid: None }
    }

    /// Encode a row of typed values, checking arity and column types
    /// against the schema.
    pub fn from_values(values: &[Value], schema: &Schema) -> Result<Self, TupleError> {
        if values.len() != schema.column_count() {
            return Err(TupleError::SchemaMismatch {
                expected: schema.column_count(),
                actual: values.len(),
            });
        }
        for (i, (value, column)) in values.iter().zip(schema.columns()).enumerate() {
            if !value.matches_type(column.data_type()) {
                return Err(TupleError::TypeMismatch(i));
            }
        }

        let data = bincode::serialize(values).map_err(|e| TupleError::Codec(e.to_string()))?;
        Ok(Tuple { data, rid: None })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Rid) {
        self.rid = Some(rid);
    }

    /// Decode the full row.
    pub fn values(&self) -> Result<Vec<Value>, TupleError> {
        bincode::deserialize(&self.data).map_err(|e| TupleError::Codec(e.to_string()))
    }

    /// Decode a single column.
    pub fn value_at(&self, index: usize) -> Result<Value, TupleError> {
        let mut values = self.values()?;
        if index >= values.len() {
            return Err(TupleError::ColumnOutOfRange(index));
        }
        Ok(values.swap_remove(index))
    }

    /// Project this tuple onto the key columns of an index.
    pub fn key_from_tuple(&self, key_attrs: &[usize]) -> Result<CompositeKey, TupleError> {
        let values = self.values()?;
        let mut key = Vec::with_capacity(key_attrs.len());
        for &attr in key_attrs {
            let value = values
                .get(attr)
                .cloned()
                .ok_or(TupleError::ColumnOutOfRange(attr))?;
            key.push(value);
        }
        Ok(CompositeKey::new(key))
    }
}
