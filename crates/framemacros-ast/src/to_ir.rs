//! Lower parsed leaves to IR values

use framemacros_ir::{self as ir};
use thiserror::Error;

use crate::ast::*;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("Unknown transformation kind: @{0}")]
pub struct UnknownKind(pub String);

impl TransformCall {
    pub fn transform_kind(&self) -> Result<ir::TransformKind, UnknownKind> {
        self.kind
            .parse()
            .map_err(|_| UnknownKind(self.kind.clone()))
    }
}

impl Literal {
    pub fn to_value(&self) -> ir::Value {
        match self {
            Literal::Null => ir::Value::Null,
            Literal::Bool(b) => ir::Value::Bool(*b),
            Literal::Int(i) => ir::Value::Int(*i),
            Literal::Float(x) => ir::Value::Float(*x),
            Literal::String(s) => ir::Value::String(s.clone()),
        }
    }
}

impl ColumnIdent {
    pub fn to_spec(&self) -> ir::ColumnSpec {
        match self {
            ColumnIdent::Name(name) => ir::ColumnSpec::name(name.clone()),
            ColumnIdent::Position(index) => ir::ColumnSpec::Position { index: *index },
        }
    }
}
