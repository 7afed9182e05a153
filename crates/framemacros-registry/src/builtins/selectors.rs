//! Column selector constructors, usable inside `$(...)`

use framemacros_ir::{ColumnSpec, NamePredicate, Value};

use super::expect_str;
use crate::{Arity, FunctionError, FunctionRegistry, FunctionSignature};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(FunctionSignature::selector("all", Arity::Exact(0)), |_| {
        Ok(Value::Spec(ColumnSpec::All))
    });
    registry.register(FunctionSignature::selector("not", Arity::Exact(1)), |args| {
        Ok(Value::Spec(ColumnSpec::Not {
            inner: Box::new(to_spec(&args[0])?),
        }))
    });
    registry.register(FunctionSignature::selector("between", Arity::Exact(2)), |args| {
        Ok(Value::Spec(ColumnSpec::Range {
            from: Box::new(to_spec(&args[0])?),
            to: Box::new(to_spec(&args[1])?),
        }))
    });
    registry.register(FunctionSignature::selector("cols", Arity::AtLeast(1)), |args| {
        if let [single] = args {
            return Ok(Value::Spec(to_spec(single)?));
        }
        let items = args.iter().map(to_spec).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Spec(ColumnSpec::Collection { items }))
    });

    predicate(registry, "startswith", NamePredicate::StartsWith);
    predicate(registry, "endswith", NamePredicate::EndsWith);
    predicate(registry, "contains", NamePredicate::Contains);
}

fn predicate(registry: &mut FunctionRegistry, name: &str, make: fn(String) -> NamePredicate) {
    registry.register(FunctionSignature::selector(name, Arity::Exact(1)), move |args| {
        Ok(Value::Spec(ColumnSpec::Predicate {
            predicate: make(expect_str(&args[0])?.to_string()),
        }))
    });
}

fn to_spec(value: &Value) -> Result<ColumnSpec, FunctionError> {
    Ok(ColumnSpec::try_from(value.clone())?)
}

#[cfg(test)]
mod tests {
    use crate::FunctionRegistry;
    use framemacros_ir::{ColumnSpec, TableSchema, Value};

    #[test]
    fn test_between_resolves() {
        let registry = FunctionRegistry::default();
        let spec = registry
            .call("between", &[Value::from("b"), Value::Int(4)])
            .unwrap();
        let Value::Spec(spec) = spec else {
            panic!("expected a specifier");
        };
        let schema = TableSchema::from_names("t", ["a", "b", "c", "d", "e"]);
        assert_eq!(spec.resolve(&schema).unwrap().names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_not_of_list() {
        let registry = FunctionRegistry::default();
        let excluded = Value::List(vec![Value::from("a")]);
        let spec = registry.call("not", &[excluded]).unwrap();
        assert!(matches!(spec, Value::Spec(ColumnSpec::Not { .. })));
    }

    #[test]
    fn test_invalid_selector_argument() {
        let registry = FunctionRegistry::default();
        assert!(registry.call("not", &[Value::Bool(true)]).is_err());
    }
}
