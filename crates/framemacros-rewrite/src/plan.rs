//! Rewriter entry point: transformation call -> plan -> bound pipeline
//!
//! Rewriting is schema independent and yields a [`RewritePlan`]. Binding
//! the plan to a table schema and a caller scope resolves every column
//! specifier, instantiates the synthesized functions and expands
//! multi-column arguments into one [`PipelineTriple`] per broadcast element.

use framemacros_ast::{Expr, TransformCall};
use framemacros_ir::{
    ColumnSpec, EvaluationMode, Operation, PlanSummary, Selection, SinkSummary, TableSchema,
    TransformKind, TripleSummary, Value,
};
use framemacros_registry::FunctionRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::broadcast::expand;
use crate::classify::DirectiveSet;
use crate::collect::collect_assignments;
use crate::directive::{expand_block_arguments, peel, Peeled};
use crate::error::{EvalError, PlanError, RewriteError};
use crate::eval::{Env, Evaluator, Mode};
use crate::resolve::{Binding, Reference, Resolver};
use crate::scope::Scope;
use crate::synth::{FunctionTemplate, SynthesizedFn};
use crate::walk::{find, visit};

/// Turns transformation calls into rewrite plans.
#[derive(Debug, Clone)]
pub struct Rewriter {
    registry: Arc<FunctionRegistry>,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::default()))
    }
}

impl Rewriter {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn rewrite_call(&self, call: &TransformCall) -> Result<RewritePlan, PlanError> {
        self.rewrite(call.transform_kind()?, &call.args, &call.kwargs)
    }

    /// Rewrite every argument of one call. The first failing argument
    /// aborts the call; its index is reported after block expansion.
    pub fn rewrite(
        &self,
        kind: TransformKind,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<RewritePlan, PlanError> {
        let args = expand_block_arguments(args)?;
        let arguments = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| {
                self.rewrite_argument(kind, index, arg)
                    .map_err(|source| PlanError::Argument { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            kind = %kind,
            arguments = arguments.len(),
            options = kwargs.len(),
            "Rewrote transformation call"
        );

        Ok(RewritePlan {
            kind,
            arguments,
            options: kwargs.to_vec(),
            registry: self.registry.clone(),
        })
    }

    fn rewrite_argument(
        &self,
        kind: TransformKind,
        index: usize,
        arg: Expr,
    ) -> Result<ArgumentPlan, RewriteError> {
        let source = arg.to_string();
        let Peeled {
            directives,
            target,
            body,
        } = peel(&arg)?;
        let mode = directives.mode(kind.default_mode())?;

        let (body, target) = if directives.collect {
            let collected = collect_assignments(body)?;
            (
                collected.body,
                Target::ExpandRecord {
                    fields: collected.fields,
                },
            )
        } else {
            (body, target.map_or(Target::Auto, Target::Explicit))
        };

        reject_column_assignments(&body)?;

        let mut resolver = Resolver::new();
        let body = resolver.replace_references(body);
        let bindings = resolver.into_bindings();
        check_functions(&self.registry, &body)?;

        let params = bindings.iter().map(|b| b.param.clone()).collect();
        let template = FunctionTemplate::new(params, body, mode, directives.passmissing);

        trace!(
            index,
            source = %source,
            directives = %directives.letters(),
            bindings = bindings.len(),
            captures = ?template.captures,
            "Rewrote argument"
        );

        Ok(ArgumentPlan {
            index,
            source,
            directives,
            bindings,
            template,
            target,
        })
    }
}

/// Where the results of one argument go.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// No target given; names are derived from sources and function.
    Auto,
    /// Expression evaluated at bind time into one or many sink names.
    Explicit(Expr),
    /// `@t`: one column per field of the returned record.
    ExpandRecord { fields: Vec<String> },
}

/// One rewritten argument, not yet tied to a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentPlan {
    pub index: usize,
    /// Argument as written, for diagnostics.
    pub source: String,
    pub directives: DirectiveSet,
    pub bindings: Vec<Binding>,
    pub template: FunctionTemplate,
    pub target: Target,
}

#[derive(Debug, Clone)]
pub struct RewritePlan {
    kind: TransformKind,
    arguments: Vec<ArgumentPlan>,
    options: Vec<(String, Expr)>,
    registry: Arc<FunctionRegistry>,
}

impl RewritePlan {
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn arguments(&self) -> &[ArgumentPlan] {
        &self.arguments
    }

    pub fn options(&self) -> &[(String, Expr)] {
        &self.options
    }

    /// Resolve against `schema`, capturing free identifiers from `scope`.
    pub fn bind(&self, schema: &TableSchema, scope: &Scope) -> Result<Pipeline, PlanError> {
        let mut triples = Vec::new();
        for argument in &self.arguments {
            let bound = argument
                .bind(&self.registry, schema, scope)
                .map_err(|source| PlanError::Argument {
                    index: argument.index,
                    source,
                })?;
            triples.extend(bound);
        }

        let options = self
            .options
            .iter()
            .map(|(name, expr)| {
                evaluate_in_sink_mode(&self.registry, expr, schema, scope)
                    .map(|value| (name.clone(), value))
                    .map_err(|source| PlanError::Option {
                        name: name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            kind = %self.kind,
            table = %schema.name,
            triples = triples.len(),
            "Bound rewrite plan"
        );

        Ok(Pipeline {
            kind: self.kind,
            triples,
            options,
        })
    }
}

impl ArgumentPlan {
    fn bind(
        &self,
        registry: &Arc<FunctionRegistry>,
        schema: &TableSchema,
        scope: &Scope,
    ) -> Result<Vec<PipelineTriple>, RewriteError> {
        // Parameters reading the same columns collapse into one.
        let mut sources: Vec<(String, Selection)> = Vec::with_capacity(self.bindings.len());
        let mut aliases = HashMap::new();
        for binding in &self.bindings {
            let selection = resolve_reference(&binding.reference, registry, schema, scope)?;
            match sources.iter().find(|(_, kept)| *kept == selection) {
                Some((kept, _)) => {
                    aliases.insert(binding.param.clone(), kept.clone());
                }
                None => sources.push((binding.param.clone(), selection)),
            }
        }

        let template = self.template.merge_params(&aliases);
        let function = Arc::new(template.instantiate(registry.clone(), scope)?);

        let sink = match &self.target {
            Target::Explicit(expr) => {
                let value = evaluate_in_sink_mode(registry, expr, schema, scope)?;
                Some(sink_selection(value, expr, schema)?)
            }
            Target::Auto | Target::ExpandRecord { .. } => None,
        };

        let selections: Vec<Selection> = sources.into_iter().map(|(_, s)| s).collect();
        let pairing = expand(&selections, sink.as_ref())?;

        trace!(
            index = self.index,
            shape = ?pairing.shape,
            elements = pairing.sources.len(),
            "Expanded argument"
        );

        let triples = pairing
            .sources
            .into_iter()
            .enumerate()
            .map(|(element, names)| {
                let sink = match (&self.target, &pairing.sinks) {
                    (Target::ExpandRecord { .. }, _) => Sink::ExpandRecord,
                    (_, Some(sinks)) => Sink::Column(sinks[element].clone()),
                    (_, None) => Sink::Column(template.naming.sink_name(&names)),
                };
                PipelineTriple {
                    argument: self.index,
                    sources: names,
                    function: function.clone(),
                    sink,
                }
            })
            .collect();
        Ok(triples)
    }
}

/// Bound plan handed to the table engine.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub kind: TransformKind,
    pub triples: Vec<PipelineTriple>,
    pub options: Vec<(String, Value)>,
}

impl Pipeline {
    pub fn operation(&self) -> Operation {
        self.kind.operation()
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn summary(&self) -> Result<PlanSummary, serde_json::Error> {
        let options = self
            .options
            .iter()
            .map(|(name, value)| Ok((name.clone(), serde_json::to_value(value)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        Ok(PlanSummary {
            kind: self.kind,
            operation: self.operation(),
            options,
            triples: self.triples.iter().map(PipelineTriple::summary).collect(),
        })
    }
}

/// `sources => function => sink`
#[derive(Debug, Clone)]
pub struct PipelineTriple {
    /// Index of the argument this triple came from.
    pub argument: usize,
    pub sources: Vec<String>,
    pub function: Arc<SynthesizedFn>,
    pub sink: Sink,
}

impl PipelineTriple {
    pub fn mode(&self) -> EvaluationMode {
        self.function.mode()
    }

    pub fn summary(&self) -> TripleSummary {
        TripleSummary {
            argument: self.argument,
            sources: self.sources.clone(),
            function: self.function.summary(),
            sink: self.sink.summary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Column(String),
    /// Output columns are the fields of the returned record.
    ExpandRecord,
}

impl Sink {
    /// Output column names for a function result. Row-wise results are a
    /// column of records; the first record decides the names.
    pub fn columns_for(&self, output: &Value) -> Result<Vec<String>, EvalError> {
        match self {
            Sink::Column(name) => Ok(vec![name.clone()]),
            Sink::ExpandRecord => {
                let record = match output {
                    Value::Record(record) => Some(record),
                    Value::List(items) => items.iter().find_map(|item| match item {
                        Value::Record(record) => Some(record),
                        _ => None,
                    }),
                    _ => None,
                };
                record
                    .map(|r| r.names().map(str::to_string).collect())
                    .ok_or_else(|| EvalError::TypeMismatch {
                        op: "expand record".to_string(),
                        types: vec![output.type_name()],
                    })
            }
        }
    }

    pub fn summary(&self) -> SinkSummary {
        match self {
            Sink::Column(name) => SinkSummary::Column { name: name.clone() },
            Sink::ExpandRecord => SinkSummary::ExpandRecord,
        }
    }
}

fn resolve_reference(
    reference: &Reference,
    registry: &FunctionRegistry,
    schema: &TableSchema,
    scope: &Scope,
) -> Result<Selection, RewriteError> {
    let spec = match reference {
        Reference::Static(spec) => spec.clone(),
        Reference::Deferred(expr) => {
            let shown = Expr::Interpolated(Box::new(expr.clone()));
            let value = Evaluator::new(registry, Mode::Selector { scope })
                .eval(expr, &mut Env::new())
                .map_err(|err| RewriteError::from_scope_eval(err, &shown))?;
            ColumnSpec::try_from(value).map_err(|err| RewriteError::UnresolvableColumnSpecifier {
                spec: shown.to_string(),
                reason: err.to_string(),
            })?
        }
    };
    spec.resolve(schema)
        .map_err(|err| RewriteError::UnresolvableColumnSpecifier {
            spec: spec.to_string(),
            reason: err.to_string(),
        })
}

fn evaluate_in_sink_mode(
    registry: &FunctionRegistry,
    expr: &Expr,
    schema: &TableSchema,
    scope: &Scope,
) -> Result<Value, RewriteError> {
    Evaluator::new(registry, Mode::Sink { scope, schema })
        .eval(expr, &mut Env::new())
        .map_err(|err| RewriteError::from_scope_eval(err, expr))
}

/// Sink names from an evaluated target: a name, or a list/grid of names.
fn sink_selection(
    value: Value,
    expr: &Expr,
    schema: &TableSchema,
) -> Result<Selection, RewriteError> {
    let unresolvable = |reason: String| RewriteError::UnresolvableColumnSpecifier {
        spec: expr.to_string(),
        reason,
    };
    let shape = value.shape();
    match value {
        Value::String(name) => Ok(Selection::scalar(name)),
        Value::Spec(spec) => spec.resolve(schema).map_err(|err| unresolvable(err.to_string())),
        Value::List(_) | Value::Grid(_) => {
            let names = value
                .into_elements()
                .into_iter()
                .map(|element| match element {
                    Value::String(name) => Ok(name),
                    Value::Spec(spec) => spec
                        .resolve_single(schema)
                        .map_err(|err| unresolvable(err.to_string())),
                    other => Err(unresolvable(format!(
                        "a {} cannot name a column",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Selection { names, shape })
        }
        other => Err(unresolvable(format!(
            "a {} cannot name a column",
            other.type_name()
        ))),
    }
}

/// Column assignments are only meaningful as the argument target or in `@t`.
fn reject_column_assignments(body: &Expr) -> Result<(), RewriteError> {
    let offending = find(body, &|node| match node {
        Expr::Assignment { target, .. } => find(target, &Expr::is_reference).is_some(),
        _ => false,
    });
    match offending {
        Some(Expr::Assignment { target, .. }) => Err(RewriteError::UnexpectedAssignment {
            target: target.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Unknown functions and impossible arities fail at rewrite time.
fn check_functions(registry: &FunctionRegistry, body: &Expr) -> Result<(), RewriteError> {
    let mut failure = None;
    visit(body, &mut |node| {
        if let Expr::Call { func, args, .. } = node {
            if failure.is_none() {
                if let Err(err) = registry.lookup(func, args.len()) {
                    failure = Some(err);
                }
            }
        }
    });
    match failure {
        Some(err) => Err(RewriteError::Evaluation(EvalError::Registry(err))),
        None => Ok(()),
    }
}
