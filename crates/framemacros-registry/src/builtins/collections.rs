//! Collection kernels and missing-value predicates

use framemacros_ir::{Grid, Value};

use super::{expect_elements, expect_int, mismatch};
use crate::{Arity, FunctionError, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_native("ismissing", Arity::Exact(1), |args| Ok(Value::Bool(args[0].is_null())));
    registry.register_native("isnothing", Arity::Exact(1), |args| Ok(Value::Bool(args[0].is_null())));
    registry.register_native("coalesce", Arity::AtLeast(1), |args| {
        Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
    });
    registry.register_native("iseven", Arity::Exact(1), |args| parity(&args[0], 0));
    registry.register_native("isodd", Arity::Exact(1), |args| parity(&args[0], 1));

    registry.register_native("first", Arity::Exact(1), |args| end_element(&args[0], true));
    registry.register_native("last", Arity::Exact(1), |args| end_element(&args[0], false));

    registry.register_native("collect", Arity::Exact(1), |args| match &args[0] {
        Value::String(s) => Ok(Value::List(s.chars().map(|c| Value::String(c.to_string())).collect())),
        other => Ok(Value::List(expect_elements(other)?.to_vec())),
    });
    registry.register_native("vec", Arity::Exact(1), |args| {
        Ok(Value::List(expect_elements(&args[0])?.to_vec()))
    });
    registry.register_native("reverse", Arity::Exact(1), |args| match &args[0] {
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::List(items) => Ok(Value::List(items.iter().rev().cloned().collect())),
        other => Err(mismatch("list or string", other)),
    });
    registry.register_native("permutedims", Arity::Exact(1), |args| match &args[0] {
        Value::List(items) => Grid::new(vec![1, items.len()], items.clone())
            .map(Value::Grid)
            .ok_or_else(|| FunctionError::Domain("cannot reshape list".to_string())),
        Value::Grid(grid) => grid
            .transposed()
            .map(Value::Grid)
            .ok_or_else(|| FunctionError::Domain("permutedims needs a matrix".to_string())),
        other => Err(mismatch("list or matrix", other)),
    });
    registry.register_native("skipmissing", Arity::Exact(1), |args| {
        Ok(Value::List(
            expect_elements(&args[0])?
                .iter()
                .filter(|v| !v.is_null())
                .cloned()
                .collect(),
        ))
    });
}

fn parity(value: &Value, rem: i64) -> Result<Value, FunctionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(expect_int(value)?.rem_euclid(2) == rem))
}

fn end_element(value: &Value, front: bool) -> Result<Value, FunctionError> {
    let found = match value {
        Value::String(s) => {
            let c = if front { s.chars().next() } else { s.chars().last() };
            c.map(|c| Value::String(c.to_string()))
        }
        other => {
            let items = expect_elements(other)?;
            let item = if front { items.first() } else { items.last() };
            item.cloned()
        }
    };
    found.ok_or_else(|| FunctionError::Domain("collection must be non-empty".to_string()))
}

#[cfg(test)]
mod tests {
    use crate::FunctionRegistry;
    use framemacros_ir::Value;

    #[test]
    fn test_permutedims_makes_row() {
        let registry = FunctionRegistry::default();
        let row = registry
            .call("permutedims", &[Value::List(vec![Value::from("a"), Value::from("b")])])
            .unwrap();
        assert_eq!(row.shape(), vec![1, 2]);
    }

    #[test]
    fn test_parity_and_coalesce() {
        let registry = FunctionRegistry::default();
        assert_eq!(registry.call("iseven", &[Value::Int(-4)]).unwrap(), Value::Bool(true));
        assert_eq!(registry.call("isodd", &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(
            registry.call("coalesce", &[Value::Null, Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_first_of_empty_fails() {
        let registry = FunctionRegistry::default();
        assert!(registry.call("first", &[Value::List(Vec::new())]).is_err());
        assert_eq!(registry.call("last", &[Value::from("abc")]).unwrap(), Value::from("c"));
    }
}
