//! Column specifiers and their resolution against a table schema
//!
//! A specifier describes zero, one or many columns. Resolution is
//! deterministic and follows schema order, except for explicit
//! collections which keep the caller's order.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::TableSchema;
use crate::types::TypeFilter;
use crate::value::Value;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecError {
    #[error("Column not found: {0}")]
    UnknownColumn(String),

    #[error("Column position {index} out of range for a table with {len} columns")]
    PositionOutOfRange { index: i64, len: usize },

    #[error("Expected a single column, got {0}")]
    NotSingle(String),

    #[error("A {0} value cannot be used as a column specifier")]
    NotASpecifier(&'static str),

    #[error("Grid shape {shape:?} does not match {len} items")]
    BadGrid { shape: Vec<usize>, len: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSpec {
    Name { name: String },
    /// 1-based position in the schema.
    Position { index: i64 },
    Collection { items: Vec<ColumnSpec> },
    Grid { shape: Vec<usize>, items: Vec<ColumnSpec> },
    Predicate { predicate: NamePredicate },
    Range { from: Box<ColumnSpec>, to: Box<ColumnSpec> },
    TypeFilter { filter: TypeFilter },
    All,
    Not { inner: Box<ColumnSpec> },
}

/// Concrete column names with the broadcasting shape they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub names: Vec<String>,
    pub shape: Vec<usize>,
}

impl Selection {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            shape: Vec::new(),
        }
    }

    pub fn vector(names: Vec<String>) -> Self {
        let shape = vec![names.len()];
        Self { names, shape }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ColumnSpec {
    pub fn name(name: impl Into<String>) -> Self {
        ColumnSpec::Name { name: name.into() }
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSpec::Collection {
            items: names.into_iter().map(ColumnSpec::name).collect(),
        }
    }

    pub fn resolve(&self, schema: &TableSchema) -> Result<Selection, SpecError> {
        match self {
            ColumnSpec::Name { .. } | ColumnSpec::Position { .. } => {
                Ok(Selection::scalar(self.resolve_single(schema)?))
            }
            ColumnSpec::Collection { items } => {
                let names = items
                    .iter()
                    .map(|item| item.resolve_single(schema))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Selection::vector(names))
            }
            ColumnSpec::Grid { shape, items } => {
                if shape.iter().product::<usize>() != items.len() {
                    return Err(SpecError::BadGrid {
                        shape: shape.clone(),
                        len: items.len(),
                    });
                }
                let names = items
                    .iter()
                    .map(|item| item.resolve_single(schema))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Selection {
                    names,
                    shape: shape.clone(),
                })
            }
            ColumnSpec::Predicate { predicate } => Ok(Selection::vector(
                schema
                    .column_names()
                    .filter(|name| predicate.matches(name))
                    .map(str::to_string)
                    .collect(),
            )),
            ColumnSpec::Range { from, to } => {
                let start = schema
                    .index_of(&from.resolve_single(schema)?)
                    .ok_or_else(|| SpecError::UnknownColumn(from.to_string()))?;
                let end = schema
                    .index_of(&to.resolve_single(schema)?)
                    .ok_or_else(|| SpecError::UnknownColumn(to.to_string()))?;
                let names = if start <= end {
                    schema.column_names().skip(start).take(end - start + 1).map(str::to_string).collect()
                } else {
                    Vec::new()
                };
                Ok(Selection::vector(names))
            }
            ColumnSpec::TypeFilter { filter } => Ok(Selection::vector(
                schema
                    .columns
                    .iter()
                    .filter(|col| filter.matches(col.data_type))
                    .map(|col| col.name.clone())
                    .collect(),
            )),
            ColumnSpec::All => Ok(Selection::vector(
                schema.column_names().map(str::to_string).collect(),
            )),
            ColumnSpec::Not { inner } => {
                let excluded = inner.resolve(schema)?.names;
                Ok(Selection::vector(
                    schema
                        .column_names()
                        .filter(|name| !excluded.iter().any(|e| e == name))
                        .map(str::to_string)
                        .collect(),
                ))
            }
        }
    }

    /// Resolve a specifier that must name exactly one existing column.
    pub fn resolve_single(&self, schema: &TableSchema) -> Result<String, SpecError> {
        match self {
            ColumnSpec::Name { name } => {
                if schema.index_of(name).is_some() {
                    Ok(name.clone())
                } else {
                    Err(SpecError::UnknownColumn(name.clone()))
                }
            }
            ColumnSpec::Position { index } => {
                let len = schema.columns.len();
                usize::try_from(*index)
                    .ok()
                    .filter(|&i| i >= 1 && i <= len)
                    .map(|i| schema.columns[i - 1].name.clone())
                    .ok_or(SpecError::PositionOutOfRange { index: *index, len })
            }
            other => Err(SpecError::NotSingle(other.to_string())),
        }
    }
}

impl TryFrom<Value> for ColumnSpec {
    type Error = SpecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(ColumnSpec::Name { name }),
            Value::Int(index) => Ok(ColumnSpec::Position { index }),
            Value::List(items) => Ok(ColumnSpec::Collection {
                items: items
                    .into_iter()
                    .map(ColumnSpec::try_from)
                    .collect::<Result<_, _>>()?,
            }),
            Value::Grid(grid) => {
                let shape = grid.shape().to_vec();
                let items = grid
                    .into_data()
                    .into_iter()
                    .map(ColumnSpec::try_from)
                    .collect::<Result<_, _>>()?;
                Ok(ColumnSpec::Grid { shape, items })
            }
            Value::Spec(spec) => Ok(spec),
            other => Err(SpecError::NotASpecifier(other.type_name())),
        }
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Name { name } => write!(f, ":{}", name),
            ColumnSpec::Position { index } => write!(f, "${}", index),
            ColumnSpec::Collection { items } | ColumnSpec::Grid { items, .. } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ColumnSpec::Predicate { predicate } => write!(f, "{}", predicate),
            ColumnSpec::Range { from, to } => write!(f, "between({}, {})", from, to),
            ColumnSpec::TypeFilter { filter } => write!(f, "{:?}", filter),
            ColumnSpec::All => write!(f, "all()"),
            ColumnSpec::Not { inner } => write!(f, "not({})", inner),
        }
    }
}

/// Opaque `name -> bool` selection.
#[derive(Debug, Clone, PartialEq)]
pub enum NamePredicate {
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Custom(CustomPredicate),
}

impl NamePredicate {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePredicate::StartsWith(prefix) => name.starts_with(prefix.as_str()),
            NamePredicate::EndsWith(suffix) => name.ends_with(suffix.as_str()),
            NamePredicate::Contains(needle) => name.contains(needle.as_str()),
            NamePredicate::Custom(custom) => (custom.func)(name),
        }
    }
}

impl fmt::Display for NamePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamePredicate::StartsWith(s) => write!(f, "startswith({:?})", s),
            NamePredicate::EndsWith(s) => write!(f, "endswith({:?})", s),
            NamePredicate::Contains(s) => write!(f, "contains({:?})", s),
            NamePredicate::Custom(custom) => write!(f, "{}", custom.label),
        }
    }
}

impl Serialize for NamePredicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Caller-supplied predicate; two custom predicates are equal only if they
/// share the same function object.
#[derive(Clone)]
pub struct CustomPredicate {
    pub label: String,
    func: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl CustomPredicate {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPredicate")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomPredicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnInfo;
    use crate::types::DataType;

    fn titanic() -> TableSchema {
        TableSchema::new(
            "titanic",
            vec![
                ColumnInfo::new("Name", DataType::String),
                ColumnInfo::new("Sex", DataType::String),
                ColumnInfo::new("Age", DataType::Float),
                ColumnInfo::new("Survived", DataType::Int),
                ColumnInfo::new("Pclass", DataType::Int),
            ],
        )
    }

    #[test]
    fn test_single_name() {
        let sel = ColumnSpec::name("Age").resolve(&titanic()).unwrap();
        assert_eq!(sel.names, vec!["Age"]);
        assert!(sel.shape.is_empty());
    }

    #[test]
    fn test_unknown_name() {
        let err = ColumnSpec::name("Fare").resolve(&titanic()).unwrap_err();
        assert_eq!(err, SpecError::UnknownColumn("Fare".to_string()));
    }

    #[test]
    fn test_position_is_one_based() {
        let schema = titanic();
        let spec = ColumnSpec::Position { index: 2 };
        assert_eq!(spec.resolve_single(&schema).unwrap(), "Sex");
        let bad = ColumnSpec::Position { index: 0 };
        assert!(matches!(
            bad.resolve(&schema),
            Err(SpecError::PositionOutOfRange { index: 0, len: 5 })
        ));
    }

    #[test]
    fn test_collection_keeps_caller_order() {
        let spec = ColumnSpec::names(["Pclass", "Name"]);
        let sel = spec.resolve(&titanic()).unwrap();
        assert_eq!(sel.names, vec!["Pclass", "Name"]);
        assert_eq!(sel.shape, vec![2]);
    }

    #[test]
    fn test_predicate_follows_schema_order() {
        let spec = ColumnSpec::Predicate {
            predicate: NamePredicate::EndsWith("e".to_string()),
        };
        let sel = spec.resolve(&titanic()).unwrap();
        assert_eq!(sel.names, vec!["Name", "Age"]);
    }

    #[test]
    fn test_range_and_not() {
        let schema = titanic();
        let range = ColumnSpec::Range {
            from: Box::new(ColumnSpec::name("Sex")),
            to: Box::new(ColumnSpec::name("Survived")),
        };
        assert_eq!(range.resolve(&schema).unwrap().names, vec!["Sex", "Age", "Survived"]);

        let not = ColumnSpec::Not {
            inner: Box::new(ColumnSpec::names(["Name", "Pclass"])),
        };
        assert_eq!(not.resolve(&schema).unwrap().names, vec!["Sex", "Age", "Survived"]);
    }

    #[test]
    fn test_type_filter() {
        let spec = ColumnSpec::TypeFilter {
            filter: TypeFilter::Number,
        };
        let sel = spec.resolve(&titanic()).unwrap();
        assert_eq!(sel.names, vec!["Age", "Survived", "Pclass"]);
    }

    #[test]
    fn test_custom_predicate() {
        let spec = ColumnSpec::Predicate {
            predicate: NamePredicate::Custom(CustomPredicate::new("short", |n: &str| n.len() <= 3)),
        };
        assert_eq!(spec.resolve(&titanic()).unwrap().names, vec!["Sex", "Age"]);
    }

    #[test]
    fn test_from_value() {
        let spec = ColumnSpec::try_from(Value::List(vec![Value::from("Age"), Value::Int(1)])).unwrap();
        assert_eq!(spec.resolve(&titanic()).unwrap().names, vec!["Age", "Name"]);
        assert_eq!(
            ColumnSpec::try_from(Value::Bool(true)),
            Err(SpecError::NotASpecifier("bool"))
        );
    }
}
