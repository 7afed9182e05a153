//! FrameMacros Intermediate Representation (IR)
//!
//! Canonical data model shared by the parser, the rewriter and the server:
//! runtime values, column specifiers, table schemas and the JSON plan
//! summary. Plan summaries serialize deterministically for caching.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod kind;
mod schema;
mod spec;
mod types;
mod value;

pub use kind::*;
pub use schema::*;
pub use spec::*;
pub use types::*;
pub use value::*;

/// Serializable view of a bound pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub kind: TransformKind,
    pub operation: Operation,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<(String, serde_json::Value)>,

    pub triples: Vec<TripleSummary>,
}

impl PlanSummary {
    /// Calculate fingerprint (SHA-256) for deterministic caching
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// One `sources => function => sink` unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleSummary {
    pub argument: usize,
    pub sources: Vec<String>,
    pub function: FunctionSummary,
    pub sink: SinkSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub params: Vec<String>,
    pub body: String,
    pub mode: EvaluationMode,
    #[serde(default)]
    pub null_propagating: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkSummary {
    Column { name: String },
    ExpandRecord,
}
