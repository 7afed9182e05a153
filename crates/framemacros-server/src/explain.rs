//! Explain a transformation call against a catalog table
//!
//! Parses the call, rewrites it, binds it to the table schema and the
//! request scope, and returns the plan summary. Nothing is executed.

use framemacros_ast::{parse_call, ParseError};
use framemacros_ir::{PlanSummary, SchemaError, SchemaProvider, Value};
use framemacros_rewrite::{PlanError, Rewriter, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Rewrite error: {0}")]
    Plan(#[from] PlanError),

    #[error("Summary error: {0}")]
    Summary(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainRequest {
    pub table: String,
    /// Full call, e.g. `@transform(:y = :x + 1)`
    pub call: String,
    /// Caller variables for interpolations and captured identifiers.
    #[serde(default)]
    pub scope: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainResponse {
    pub request_id: String,
    pub fingerprint: String,
    pub plan: PlanSummary,
}

pub fn explain(
    rewriter: &Rewriter,
    schemas: &dyn SchemaProvider,
    request: ExplainRequest,
    request_id: String,
) -> Result<ExplainResponse, ExplainError> {
    let call = parse_call(&request.call)?;
    let schema = schemas.get_table_schema(&request.table)?;
    let scope: Scope = request
        .scope
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect::<HashMap<_, _>>()
        .into();

    let plan = rewriter.rewrite_call(&call)?.bind(&schema, &scope)?.summary()?;
    debug!(
        request_id = %request_id,
        table = %schema.name,
        kind = %plan.kind,
        triples = plan.triples.len(),
        "Explained call"
    );

    Ok(ExplainResponse {
        request_id,
        fingerprint: plan.fingerprint(),
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use framemacros_ir::{SinkSummary, TableSchema};
    use framemacros_rewrite::RewriteError;

    fn catalog() -> Catalog {
        Catalog::new([TableSchema::from_names("people", ["name", "age", "height"])])
    }

    fn request(call: &str) -> ExplainRequest {
        ExplainRequest {
            table: "people".to_string(),
            call: call.to_string(),
            scope: HashMap::new(),
        }
    }

    #[test]
    fn test_explain_summary() {
        let response = explain(
            &Rewriter::default(),
            &catalog(),
            request("@transform(:bmi = :age / :height ^ 2, @t :a, :b = split(:name))"),
            "req-1".to_string(),
        )
        .unwrap();

        assert_eq!(response.request_id, "req-1");
        assert_eq!(response.fingerprint, response.plan.fingerprint());
        assert_eq!(response.plan.triples.len(), 2);
        assert_eq!(response.plan.triples[0].sources, vec!["age", "height"]);
        assert_eq!(response.plan.triples[1].sink, SinkSummary::ExpandRecord);
    }

    #[test]
    fn test_scope_values_reach_interpolation() {
        let mut req = request("@select($cols)");
        req.scope
            .insert("cols".to_string(), serde_json::json!(["age", "name"]));

        let response = explain(&Rewriter::default(), &catalog(), req, "r".to_string()).unwrap();
        let sinks: Vec<_> = response.plan.triples.iter().map(|t| t.sink.clone()).collect();
        assert_eq!(
            sinks,
            vec![
                SinkSummary::Column {
                    name: "age".to_string()
                },
                SinkSummary::Column {
                    name: "name".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_errors_are_typed() {
        let rewriter = Rewriter::default();

        let parse = explain(&rewriter, &catalog(), request("@transform(:y = "), "r".into());
        assert!(matches!(parse, Err(ExplainError::Parse(_))));

        let mut missing = request("@transform(:y = :age)");
        missing.table = "cars".to_string();
        let schema = explain(&rewriter, &catalog(), missing, "r".into());
        assert!(matches!(schema, Err(ExplainError::Schema(_))));

        let plan = explain(&rewriter, &catalog(), request("@transform(:y = :weight)"), "r".into());
        match plan {
            Err(ExplainError::Plan(err)) => assert!(matches!(
                err.rewrite_error(),
                Some(RewriteError::UnresolvableColumnSpecifier { .. })
            )),
            other => panic!("expected a plan error, got {:?}", other),
        }
    }
}
