//! Transformation kinds and their evaluation defaults

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a synthesized function is invoked by the table engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Once per row with scalar inputs.
    RowWise,
    /// Exactly once with whole columns.
    ColumnWise,
}

/// The table operation a transformation call is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Transform,
    TransformInPlace,
    Select,
    SelectInPlace,
    GroupBy,
    Combine,
    Subset,
    SubsetInPlace,
    Sort,
    SortInPlace,
    Unique,
}

/// What the external execution primitive produces for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    NewTable,
    InPlace,
    Grouped,
    Aggregate,
    RowMask,
    RowMaskInPlace,
    Ordering,
    OrderingInPlace,
    DedupKey,
}

impl TransformKind {
    pub const ALL: [TransformKind; 11] = [
        TransformKind::Transform,
        TransformKind::TransformInPlace,
        TransformKind::Select,
        TransformKind::SelectInPlace,
        TransformKind::GroupBy,
        TransformKind::Combine,
        TransformKind::Subset,
        TransformKind::SubsetInPlace,
        TransformKind::Sort,
        TransformKind::SortInPlace,
        TransformKind::Unique,
    ];

    /// Only aggregation works on whole columns by default.
    pub fn default_mode(&self) -> EvaluationMode {
        match self {
            TransformKind::Combine => EvaluationMode::ColumnWise,
            _ => EvaluationMode::RowWise,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            TransformKind::Transform | TransformKind::Select => Operation::NewTable,
            TransformKind::TransformInPlace | TransformKind::SelectInPlace => Operation::InPlace,
            TransformKind::GroupBy => Operation::Grouped,
            TransformKind::Combine => Operation::Aggregate,
            TransformKind::Subset => Operation::RowMask,
            TransformKind::SubsetInPlace => Operation::RowMaskInPlace,
            TransformKind::Sort => Operation::Ordering,
            TransformKind::SortInPlace => Operation::OrderingInPlace,
            TransformKind::Unique => Operation::DedupKey,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::Transform => "transform",
            TransformKind::TransformInPlace => "transform!",
            TransformKind::Select => "select",
            TransformKind::SelectInPlace => "select!",
            TransformKind::GroupBy => "groupby",
            TransformKind::Combine => "combine",
            TransformKind::Subset => "subset",
            TransformKind::SubsetInPlace => "subset!",
            TransformKind::Sort => "sort",
            TransformKind::SortInPlace => "sort!",
            TransformKind::Unique => "unique",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("Unknown transformation kind: {}", s))
    }
}
