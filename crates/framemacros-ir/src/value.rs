//! Runtime values flowing through synthesized functions
//!
//! `Value::Null` is the missing sentinel. Collections are either flat
//! lists (shape `[n]`) or n-dimensional grids stored column-major.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::spec::ColumnSpec;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Grid(Grid),
    Record(Record),
    Spec(ColumnSpec),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "missing",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Grid(_) => "grid",
            Value::Record(_) => "record",
            Value::Spec(_) => "column specifier",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Broadcasting shape: scalars are `[]`, lists `[n]`, grids their own shape.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::List(items) => vec![items.len()],
            Value::Grid(grid) => grid.shape.clone(),
            _ => Vec::new(),
        }
    }

    /// Ordering between numbers (across int/float), strings and bools.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Grid(_))
    }

    /// Flatten into column-major elements; a scalar is its own single element.
    pub fn into_elements(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            Value::Grid(grid) => grid.data,
            other => vec![other],
        }
    }

    /// Rebuild a value from a broadcast result shape and its elements.
    pub fn from_shape(shape: &[usize], mut data: Vec<Value>) -> Value {
        match shape.len() {
            0 => data.pop().unwrap_or(Value::Null),
            1 => Value::List(data),
            _ => Value::Grid(Grid {
                shape: shape.to_vec(),
                data,
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "missing"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Grid(grid) => write!(f, "{:?}-grid{:?}", grid.shape, grid.data),
            Value::Record(record) => {
                write!(f, "(")?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, ")")
            }
            Value::Spec(spec) => write!(f, "{}", spec),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ColumnSpec> for Value {
    fn from(spec: ColumnSpec) -> Self {
        Value::Spec(spec)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(Record {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
        }
    }
}

/// N-dimensional array of values in column-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    shape: Vec<usize>,
    data: Vec<Value>,
}

impl Grid {
    pub fn new(shape: Vec<usize>, data: Vec<Value>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        Some(Self { shape, data })
    }

    /// Build a 2-D grid from rows, as written in `[a b; c d]`.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Option<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map(Vec::len)?;
        if rows.iter().any(|row| row.len() != ncols) {
            return None;
        }
        let mut data = Vec::with_capacity(nrows * ncols);
        for col in 0..ncols {
            for row in &rows {
                data.push(row[col].clone());
            }
        }
        Some(Self {
            shape: vec![nrows, ncols],
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Value> {
        self.data
    }

    /// Element at a zero-based multi-index.
    pub fn get(&self, index: &[usize]) -> Option<&Value> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        let mut stride = 1;
        for (&idx, &dim) in index.iter().zip(&self.shape) {
            if idx >= dim {
                return None;
            }
            offset += idx * stride;
            stride *= dim;
        }
        self.data.get(offset)
    }

    /// Swap the two axes of a matrix.
    pub fn transposed(&self) -> Option<Grid> {
        let &[rows, cols] = self.shape.as_slice() else {
            return None;
        };
        let mut data = Vec::with_capacity(self.data.len());
        for r in 0..rows {
            for c in 0..cols {
                data.push(self.data[c * rows + r].clone());
            }
        }
        Some(Grid {
            shape: vec![cols, rows],
            data,
        })
    }
}

/// Ordered field-name to value mapping; the record-valued function output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_from_rows_is_column_major() {
        // ["a" "c"; "b" "d"]
        let grid = Grid::from_rows(vec![
            vec![Value::from("a"), Value::from("c")],
            vec![Value::from("b"), Value::from("d")],
        ])
        .unwrap();
        assert_eq!(grid.shape(), &[2, 2]);
        let flat: Vec<String> = grid.data().iter().map(|v| v.to_string()).collect();
        assert_eq!(flat, vec!["a", "b", "c", "d"]);
        assert_eq!(grid.get(&[0, 1]), Some(&Value::from("c")));
    }

    #[test]
    fn test_compare_across_numeric_types() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3)]];
        assert!(Grid::from_rows(rows).is_none());
    }

    #[test]
    fn test_transpose() {
        let grid = Grid::new(vec![2, 1], vec![Value::Int(1), Value::Int(2)]).unwrap();
        let t = grid.transposed().unwrap();
        assert_eq!(t.shape(), &[1, 2]);
        assert_eq!(t.get(&[0, 1]), Some(&Value::Int(2)));
    }

    #[test]
    fn test_record_serializes_in_field_order() {
        let mut record = Record::new();
        record.push("last", Value::from("Smith"));
        record.push("first", Value::from("Alice"));
        let json = serde_json::to_string(&Value::Record(record)).unwrap();
        assert_eq!(json, r#"{"last":"Smith","first":"Alice"}"#);
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(serde_json::json!([1, 2.5, "x", null]));
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Null
            ])
        );
    }
}
