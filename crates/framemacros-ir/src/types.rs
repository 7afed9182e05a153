//! Column element types and the type filters that select on them

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Date,
    Unknown,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

/// Element-type test used by `$Real`-style column selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    Any,
    Number,
    Integer,
    Float,
    String,
    Bool,
}

impl TypeFilter {
    /// Look up a filter by one of its type names (`Real`, `AbstractString`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let filter = match name {
            "Any" => TypeFilter::Any,
            "Real" | "Number" => TypeFilter::Number,
            "Integer" | "Int" | "Int64" => TypeFilter::Integer,
            "AbstractFloat" | "Float64" | "Float32" => TypeFilter::Float,
            "AbstractString" | "String" => TypeFilter::String,
            "Bool" => TypeFilter::Bool,
            _ => return None,
        };
        Some(filter)
    }

    pub fn matches(&self, data_type: DataType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Number => data_type.is_numeric(),
            TypeFilter::Integer => data_type == DataType::Int,
            TypeFilter::Float => data_type == DataType::Float,
            TypeFilter::String => data_type == DataType::String,
            TypeFilter::Bool => data_type == DataType::Bool,
        }
    }
}
