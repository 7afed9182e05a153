//! Function synthesis: a rewritten body plus its calling convention

use framemacros_ast::Expr;
use framemacros_ir::{EvaluationMode, FunctionSummary, Value};
use framemacros_registry::FunctionRegistry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EvalError, RewriteError};
use crate::eval::{Env, Evaluator, Mode};
use crate::scope::Scope;
use crate::walk::{map_children, visit};

/// Marker used when a sink name has to be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoName {
    /// The body is a bare column reference; the sink keeps the source name.
    Identity,
    Marker(String),
}

impl AutoName {
    /// `source_source_marker`; the marker alone when nothing is read.
    pub fn sink_name(&self, sources: &[String]) -> String {
        match self {
            AutoName::Identity if sources.len() == 1 => sources[0].clone(),
            AutoName::Identity => Self::function().sink_name(sources),
            AutoName::Marker(marker) if sources.is_empty() => marker.clone(),
            AutoName::Marker(marker) => format!("{}_{}", sources.join("_"), marker),
        }
    }

    fn function() -> Self {
        AutoName::Marker("function".to_string())
    }
}

/// Schema-independent description of a synthesized function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTemplate {
    pub params: Vec<String>,
    pub body: Expr,
    pub mode: EvaluationMode,
    pub null_propagate: bool,
    /// Free identifiers captured from the caller scope at bind time.
    pub captures: Vec<String>,
    pub naming: AutoName,
}

impl FunctionTemplate {
    pub fn new(params: Vec<String>, body: Expr, mode: EvaluationMode, null_propagate: bool) -> Self {
        let captures = free_identifiers(&body, &params);
        let naming = auto_name(&body, &params);
        Self {
            params,
            body,
            mode,
            null_propagate,
            captures,
            naming,
        }
    }

    /// Drop parameters listed in `aliases`, renaming their uses to the kept one.
    pub fn merge_params(&self, aliases: &HashMap<String, String>) -> FunctionTemplate {
        if aliases.is_empty() {
            return self.clone();
        }
        FunctionTemplate {
            params: self
                .params
                .iter()
                .filter(|p| !aliases.contains_key(*p))
                .cloned()
                .collect(),
            body: rename(self.body.clone(), aliases),
            mode: self.mode,
            null_propagate: self.null_propagate,
            captures: self.captures.clone(),
            naming: self.naming.clone(),
        }
    }

    /// Capture free identifiers from `scope` and produce the callable.
    pub fn instantiate(
        &self,
        registry: Arc<FunctionRegistry>,
        scope: &Scope,
    ) -> Result<SynthesizedFn, RewriteError> {
        let captured = self
            .captures
            .iter()
            .map(|name| {
                scope
                    .get(name)
                    .cloned()
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| RewriteError::AmbiguousReference { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SynthesizedFn {
            params: self.params.clone(),
            body: self.body.clone(),
            mode: self.mode,
            null_propagate: self.null_propagate,
            captured,
            registry,
        })
    }
}

/// Callable produced for one argument. Immutable and shareable across
/// threads; each invocation only reads its own arguments.
#[derive(Debug)]
pub struct SynthesizedFn {
    params: Vec<String>,
    body: Expr,
    mode: EvaluationMode,
    null_propagate: bool,
    captured: Vec<(String, Value)>,
    registry: Arc<FunctionRegistry>,
}

impl SynthesizedFn {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn is_null_propagating(&self) -> bool {
        self.null_propagate
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// One invocation. In row mode with missing propagation a `missing`
    /// argument short-circuits to `missing` without running the body; in
    /// column mode the flag is left to the table engine.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        if args.len() != self.params.len() {
            return Err(EvalError::ArityMismatch {
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        if self.null_propagate
            && self.mode == EvaluationMode::RowWise
            && args.iter().any(Value::is_null)
        {
            return Ok(Value::Null);
        }

        let mut env = Env::new();
        for (name, value) in &self.captured {
            env.push(name.clone(), value.clone());
        }
        for (param, value) in self.params.iter().zip(args) {
            env.push(param.clone(), value.clone());
        }
        Evaluator::new(&self.registry, Mode::Body).eval(&self.body, &mut env)
    }

    /// Run over whole columns the way the table engine does: once per row
    /// in row mode (returning the output column), exactly once otherwise.
    pub fn apply(&self, columns: &[Value], nrows: usize) -> Result<Value, EvalError> {
        match self.mode {
            EvaluationMode::ColumnWise => self.call(columns),
            EvaluationMode::RowWise => {
                let mut rows = Vec::with_capacity(columns.len());
                for column in columns {
                    match column {
                        Value::List(items) if items.len() == nrows => rows.push(items),
                        other => {
                            return Err(EvalError::ShapeMismatch {
                                shapes: vec![other.shape(), vec![nrows]],
                            })
                        }
                    }
                }
                let mut out = Vec::with_capacity(nrows);
                for row in 0..nrows {
                    let args: Vec<Value> = rows.iter().map(|items| items[row].clone()).collect();
                    out.push(self.call(&args)?);
                }
                Ok(Value::List(out))
            }
        }
    }

    pub fn summary(&self) -> FunctionSummary {
        FunctionSummary {
            params: self.params.clone(),
            body: self.body.to_string(),
            mode: self.mode,
            null_propagating: self.null_propagate,
        }
    }
}

/// Names bound by assignments anywhere in `body`.
fn local_names(body: &Expr) -> Vec<&str> {
    let mut locals = Vec::new();
    visit(body, &mut |node| {
        if let Expr::Assignment { target, .. } = node {
            let targets: Vec<&Expr> = match target.as_ref() {
                Expr::Tuple(items) => items.iter().collect(),
                single => vec![single],
            };
            for target in targets {
                if let Expr::Ident(name) | Expr::Splat(name) = target {
                    locals.push(name.as_str());
                }
            }
        }
    });
    locals
}

fn free_identifiers(body: &Expr, params: &[String]) -> Vec<String> {
    let locals = local_names(body);
    let mut free: Vec<String> = Vec::new();
    visit(body, &mut |node| {
        if let Expr::Ident(name) = node {
            let known = params.iter().any(|p| p == name) || locals.contains(&name.as_str());
            if !known && !free.contains(name) {
                free.push(name.clone());
            }
        }
    });
    free
}

fn auto_name(body: &Expr, params: &[String]) -> AutoName {
    let is_param = |expr: &Expr| matches!(expr, Expr::Ident(name) if params.contains(name));
    match body {
        expr if is_param(expr) => AutoName::Identity,
        Expr::Call {
            func,
            args,
            broadcast: false,
        } if !args.is_empty() && args.iter().all(is_param) => AutoName::Marker(func.clone()),
        _ => AutoName::function(),
    }
}

fn rename(expr: Expr, aliases: &HashMap<String, String>) -> Expr {
    match expr {
        Expr::Ident(name) => Expr::Ident(aliases.get(&name).cloned().unwrap_or(name)),
        other => {
            let mapped: Result<Expr, std::convert::Infallible> =
                map_children(other, &mut |child| Ok(rename(child, aliases)));
            match mapped {
                Ok(expr) => expr,
                Err(never) => match never {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Resolver;
    use framemacros_ast::parse_expr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn template(source: &str, mode: EvaluationMode, null_propagate: bool) -> FunctionTemplate {
        let mut resolver = Resolver::new();
        let body = resolver.replace_references(parse_expr(source).unwrap());
        let params = resolver.bindings().iter().map(|b| b.param.clone()).collect();
        FunctionTemplate::new(params, body, mode, null_propagate)
    }

    fn registry() -> Arc<FunctionRegistry> {
        Arc::new(FunctionRegistry::default())
    }

    #[test]
    fn test_auto_naming_markers() {
        let single_call = template("uppercase(:name)", EvaluationMode::RowWise, false);
        assert_eq!(
            single_call.naming.sink_name(&["name".to_string()]),
            "name_uppercase"
        );

        let expression = template(":a + :b", EvaluationMode::RowWise, false);
        assert_eq!(
            expression.naming.sink_name(&["a".to_string(), "b".to_string()]),
            "a_b_function"
        );

        let identity = template(":a", EvaluationMode::RowWise, false);
        assert_eq!(identity.naming.sink_name(&["a".to_string()]), "a");

        let constant = template("1", EvaluationMode::RowWise, false);
        assert_eq!(constant.naming.sink_name(&[]), "function");
    }

    #[test]
    fn test_captures_exclude_locals_and_params() {
        let t = template(
            "begin s = split(:name, sep); s[idx] end",
            EvaluationMode::RowWise,
            false,
        );
        assert_eq!(t.captures, vec!["sep", "idx"]);
    }

    #[test]
    fn test_missing_capture_is_ambiguous() {
        let t = template(":x + offset", EvaluationMode::RowWise, false);
        assert_eq!(
            t.instantiate(registry(), &Scope::new()).unwrap_err(),
            RewriteError::AmbiguousReference {
                name: "offset".to_string()
            }
        );

        let f = t
            .instantiate(registry(), &Scope::new().with("offset", 10i64))
            .unwrap();
        assert_eq!(f.call(&[Value::Int(1)]).unwrap(), Value::Int(11));
    }

    #[test]
    fn test_row_mode_calls_once_per_row() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = FunctionRegistry::default();
        registry.register_native("tick", framemacros_registry::Arity::Exact(1), move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(args[0].clone())
        });

        let t = template("tick(:x)", EvaluationMode::RowWise, false);
        let f = t.instantiate(Arc::new(registry), &Scope::new()).unwrap();
        let column = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let out = f.apply(&[column.clone()], 3).unwrap();

        assert_eq!(out, column);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_null_propagation_only_in_row_mode() {
        let row = template("uppercase(:x)", EvaluationMode::RowWise, true)
            .instantiate(registry(), &Scope::new())
            .unwrap();
        assert_eq!(row.call(&[Value::Null]).unwrap(), Value::Null);

        let column = template("ismissing(:x)", EvaluationMode::ColumnWise, true)
            .instantiate(registry(), &Scope::new())
            .unwrap();
        assert_eq!(column.call(&[Value::Null]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_merge_params() {
        let t = template("$a + :x", EvaluationMode::RowWise, false);
        let aliases = HashMap::from([("%col2".to_string(), "%col1".to_string())]);
        let merged = t.merge_params(&aliases);

        assert_eq!(merged.params, vec!["%col1"]);
        assert_eq!(merged.body.to_string(), "(%col1 + %col1)");
    }

    #[test]
    fn test_arity_checked() {
        let f = template(":x", EvaluationMode::RowWise, false)
            .instantiate(registry(), &Scope::new())
            .unwrap();
        assert_eq!(
            f.call(&[]),
            Err(EvalError::ArityMismatch {
                expected: 1,
                actual: 0
            })
        );
    }
}
