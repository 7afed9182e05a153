//! Whole-column reductions
//!
//! A `missing` element poisons the result, as in the host language;
//! wrap the argument in `skipmissing` to drop them first.

use framemacros_ir::Value;
use std::cmp::Ordering;

use super::{expect_elements, expect_f64, mismatch};
use crate::{FunctionError, FunctionRegistry, FunctionSignature};

pub(super) fn register(registry: &mut FunctionRegistry) {
    reduce(registry, "sum", |items| {
        if items.iter().all(|v| matches!(v, Value::Int(_))) {
            let mut total: i64 = 0;
            for item in items {
                if let Value::Int(i) = item {
                    total = total
                        .checked_add(*i)
                        .ok_or_else(|| FunctionError::Domain("integer overflow in sum".to_string()))?;
                }
            }
            return Ok(Value::Int(total));
        }
        Ok(Value::Float(numbers(items)?.iter().sum()))
    });
    reduce(registry, "mean", |items| {
        let xs = non_empty(numbers(items)?, "mean")?;
        Ok(Value::Float(mean(&xs)))
    });
    reduce(registry, "median", |items| {
        let mut xs = non_empty(numbers(items)?, "median")?;
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = xs.len() / 2;
        let median = if xs.len() % 2 == 0 {
            (xs[mid - 1] + xs[mid]) / 2.0
        } else {
            xs[mid]
        };
        Ok(Value::Float(median))
    });
    reduce(registry, "minimum", |items| extreme(items, Ordering::Less));
    reduce(registry, "maximum", |items| extreme(items, Ordering::Greater));
    reduce(registry, "var", |items| Ok(Value::Float(variance(&numbers(items)?)?)));
    reduce(registry, "std", |items| Ok(Value::Float(variance(&numbers(items)?)?.sqrt())));

    registry.register(FunctionSignature::aggregate("count"), |args| {
        let mut n = 0;
        for item in expect_elements(&args[0])? {
            match item {
                Value::Bool(true) => n += 1,
                Value::Bool(false) => {}
                other => return Err(mismatch("bool", other)),
            }
        }
        Ok(Value::Int(n))
    });
}

fn reduce<F>(registry: &mut FunctionRegistry, name: &str, f: F)
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    registry.register(FunctionSignature::aggregate(name), move |args| {
        let items = expect_elements(&args[0])?;
        if items.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        f(items)
    });
}

fn numbers(items: &[Value]) -> Result<Vec<f64>, FunctionError> {
    items.iter().map(expect_f64).collect()
}

fn non_empty(xs: Vec<f64>, name: &str) -> Result<Vec<f64>, FunctionError> {
    if xs.is_empty() {
        return Err(FunctionError::Domain(format!("{} of empty collection", name)));
    }
    Ok(xs)
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (n - 1 denominator).
fn variance(xs: &[f64]) -> Result<f64, FunctionError> {
    if xs.len() < 2 {
        return Err(FunctionError::Domain(
            "variance needs at least two values".to_string(),
        ));
    }
    let m = mean(xs);
    Ok(xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64)
}

fn extreme(items: &[Value], wanted: Ordering) -> Result<Value, FunctionError> {
    let mut best: Option<&Value> = None;
    for item in items {
        best = match best {
            None => Some(item),
            Some(current) => match item.compare(current) {
                Some(ord) if ord == wanted => Some(item),
                Some(_) => Some(current),
                None => return Err(mismatch(current.type_name(), item)),
            },
        };
    }
    best.cloned()
        .ok_or_else(|| FunctionError::Domain("reduction over empty collection".to_string()))
}
