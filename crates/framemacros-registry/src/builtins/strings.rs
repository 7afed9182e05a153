//! String kernels

use framemacros_ir::Value;

use super::{expect_elements, expect_str, mismatch};
use crate::{Arity, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_native("uppercase", Arity::Exact(1), |args| {
        Ok(Value::String(expect_str(&args[0])?.to_uppercase()))
    });
    registry.register_native("lowercase", Arity::Exact(1), |args| {
        Ok(Value::String(expect_str(&args[0])?.to_lowercase()))
    });
    registry.register_native("uppercasefirst", Arity::Exact(1), |args| {
        let s = expect_str(&args[0])?;
        let mut chars = s.chars();
        let out = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Ok(Value::String(out))
    });
    registry.register_native("strip", Arity::Exact(1), |args| {
        Ok(Value::String(expect_str(&args[0])?.trim().to_string()))
    });

    registry.register_native("split", Arity::Range(1, 2), |args| {
        let s = expect_str(&args[0])?;
        let parts: Vec<Value> = match args.get(1) {
            Some(delim) => s.split(expect_str(delim)?).map(Value::from).collect(),
            None => s.split_whitespace().map(Value::from).collect(),
        };
        Ok(Value::List(parts))
    });
    registry.register_native("join", Arity::Range(1, 2), |args| {
        let sep = match args.get(1) {
            Some(sep) => expect_str(sep)?,
            None => "",
        };
        let parts: Vec<String> = expect_elements(&args[0])?
            .iter()
            .map(|v| v.to_string())
            .collect();
        Ok(Value::String(parts.join(sep)))
    });
    registry.register_native("length", Arity::Exact(1), |args| {
        let len = match &args[0] {
            Value::String(s) => s.chars().count(),
            Value::Record(record) => record.len(),
            other => expect_elements(other)?.len(),
        };
        Ok(Value::Int(len as i64))
    });
    registry.register_native("replace", Arity::Exact(3), |args| {
        let s = expect_str(&args[0])?;
        Ok(Value::String(s.replace(expect_str(&args[1])?, expect_str(&args[2])?)))
    });

    registry.register_native("startswith", Arity::Exact(2), |args| {
        Ok(Value::Bool(expect_str(&args[0])?.starts_with(expect_str(&args[1])?)))
    });
    registry.register_native("endswith", Arity::Exact(2), |args| {
        Ok(Value::Bool(expect_str(&args[0])?.ends_with(expect_str(&args[1])?)))
    });
    registry.register_native("contains", Arity::Exact(2), |args| match &args[0] {
        Value::String(s) => Ok(Value::Bool(s.contains(expect_str(&args[1])?))),
        other => Err(mismatch("string", other)),
    });
}
