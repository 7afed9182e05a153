//! Schema provider trait and types for table metadata lookup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::DataType;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default = "unknown_type")]
    pub data_type: DataType,
    #[serde(default)]
    pub nullable: bool,
}

fn unknown_type() -> DataType {
    DataType::Unknown
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Ordered, distinct column names of one table (plus their element types).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Schema with untyped columns, for callers that only know names.
    pub fn from_names<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            names
                .into_iter()
                .map(|n| ColumnInfo::new(n, DataType::Unknown))
                .collect(),
        )
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Trait for resolving table schemas at bind time
pub trait SchemaProvider {
    /// Get schema for a table by name
    fn get_table_schema(&self, table_name: &str) -> Result<TableSchema, SchemaError>;
}

/// In-memory schema provider
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    tables: HashMap<String, TableSchema>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn get_table_schema(&self, table_name: &str) -> Result<TableSchema, SchemaError> {
        self.tables
            .get(table_name)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound(table_name.to_string()))
    }
}
