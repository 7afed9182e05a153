//! Builtin kernels

use framemacros_ir::Value;

use crate::{FunctionError, FunctionRegistry};

mod aggregates;
mod collections;
mod math;
mod selectors;
mod strings;

pub(crate) fn register_builtins(registry: &mut FunctionRegistry) {
    math::register(registry);
    strings::register(registry);
    collections::register(registry);
    aggregates::register(registry);
    selectors::register(registry);
}

fn mismatch(expected: &'static str, actual: &Value) -> FunctionError {
    FunctionError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

fn expect_str(value: &Value) -> Result<&str, FunctionError> {
    value.as_str().ok_or_else(|| mismatch("string", value))
}

fn expect_f64(value: &Value) -> Result<f64, FunctionError> {
    value.as_f64().ok_or_else(|| mismatch("number", value))
}

fn expect_int(value: &Value) -> Result<i64, FunctionError> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(mismatch("int", other)),
    }
}

/// Elements of a list or grid, column-major.
fn expect_elements(value: &Value) -> Result<&[Value], FunctionError> {
    match value {
        Value::List(items) => Ok(items),
        Value::Grid(grid) => Ok(grid.data()),
        other => Err(mismatch("collection", other)),
    }
}
