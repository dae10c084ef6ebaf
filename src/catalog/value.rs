use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

use super::schema::DataType;

/// A typed value inside a tuple. Executors evaluate predicates over
/// these; the storage layer only ever sees their bincode encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Discriminant first so different types never collide.
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl PartialOrd for Value {
    /// Comparison used by predicate evaluation: NULL and mixed types
    /// (other than integer/float) are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Text(_) => Some(DataType::Text),
        }
    }

    /// Whether this value can be stored in a column of the given type.
    pub fn matches_type(&self, data_type: DataType) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(_) => data_type == DataType::Boolean,
            Value::Integer(_) => matches!(data_type, DataType::Integer | DataType::Float),
            Value::Float(_) => data_type == DataType::Float,
            Value::Text(_) => data_type == DataType::Text,
        }
    }

    /// Total order used by index keys, where `partial_cmp` is not
    /// enough. NULL sorts first, then booleans, numbers, text; floats
    /// compare by `total_cmp`.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) | Value::Float(_) => 2,
                Value::Text(_) => 3,
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

/// An index key: the projection of a tuple onto the key columns.
/// Ordered by `Value::total_cmp` column by column, which is the
/// comparator every B+tree built by the catalog runs under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey(pub Vec<Value>);

impl CompositeKey {
    pub fn new(values: Vec<Value>) -> Self {
        CompositeKey(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ord_mixed_numeric() {
        assert!(Value::Integer(1) < Value::Float(1.5));
        assert!(Value::Float(2.5) > Value::Integer(2));
        assert_eq!(
            Value::Null.partial_cmp(&Value::Integer(0)),
            None
        );
        assert_eq!(
            Value::Text("a".into()).partial_cmp(&Value::Integer(0)),
            None
        );
    }

    #[test]
    fn test_composite_key_ordering() {
        let a = CompositeKey::new(vec![Value::Integer(1), Value::Text("b".into())]);
        let b = CompositeKey::new(vec![Value::Integer(1), Value::Text("c".into())]);
        let c = CompositeKey::new(vec![Value::Integer(2), Value::Text("a".into())]);

        assert!(a < b);
        assert!(b < c);

        let mut keys = vec![c.clone(), a.clone(), b.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_type_check() {
        assert!(Value::Integer(7).matches_type(DataType::Integer));
        assert!(Value::Null.matches_type(DataType::Text));
        assert!(!Value::Boolean(true).matches_type(DataType::Integer));
    }
}
