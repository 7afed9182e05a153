//! Numeric kernels; all of them pass `missing` through

use framemacros_ir::Value;

use super::{expect_f64, mismatch};
use crate::{Arity, FunctionError, FunctionRegistry};

pub(super) fn register(registry: &mut FunctionRegistry) {
    unary(registry, "abs", |v| match v {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        other => Ok(Value::Float(expect_f64(other)?.abs())),
    });
    unary(registry, "sqrt", |v| {
        let x = expect_f64(v)?;
        if x < 0.0 {
            return Err(FunctionError::Domain(format!("sqrt of negative number {}", x)));
        }
        Ok(Value::Float(x.sqrt()))
    });
    unary(registry, "exp", |v| Ok(Value::Float(expect_f64(v)?.exp())));
    unary(registry, "log", |v| {
        let x = expect_f64(v)?;
        if x < 0.0 {
            return Err(FunctionError::Domain(format!("log of negative number {}", x)));
        }
        Ok(Value::Float(x.ln()))
    });
    unary(registry, "round", |v| rounding(v, f64::round));
    unary(registry, "floor", |v| rounding(v, f64::floor));
    unary(registry, "ceil", |v| rounding(v, f64::ceil));

    for name in ["float", "Float64", "Float32"] {
        unary(registry, name, |v| match v {
            Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            other => Ok(Value::Float(expect_f64(other)?)),
        });
    }
    for name in ["int", "Int"] {
        unary(registry, name, to_int);
    }

    registry.register_native("string", Arity::AtLeast(1), |args| {
        Ok(Value::String(args.iter().map(|v| v.to_string()).collect()))
    });
}

fn unary<F>(registry: &mut FunctionRegistry, name: &str, f: F)
where
    F: Fn(&Value) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    registry.register_native(name, Arity::Exact(1), move |args| match &args[0] {
        Value::Null => Ok(Value::Null),
        other => f(other),
    });
}

fn rounding(value: &Value, f: fn(f64) -> f64) -> Result<Value, FunctionError> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) => Ok(Value::Float(f(*x))),
        other => Err(mismatch("number", other)),
    }
}

fn to_int(value: &Value) -> Result<Value, FunctionError> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(x) if x.fract() == 0.0 && x.is_finite() => Ok(Value::Int(*x as i64)),
        Value::Float(x) => Err(FunctionError::Domain(format!("{} is not an exact integer", x))),
        other => Err(mismatch("number", other)),
    }
}
