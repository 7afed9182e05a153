//! Multi-assignment collection for `@t`
//!
//! `:name = value` statements become locals, and a record of all of them is
//! appended as the block's result. Other statements stay in place so later
//! assignments can use earlier helpers.

use framemacros_ast::{ColumnIdent, Expr};

use crate::error::RewriteError;

#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    /// Block ending in the record expression.
    pub body: Expr,
    /// Record fields in first-assignment order.
    pub fields: Vec<String>,
}

pub fn collect_assignments(body: Expr) -> Result<Collected, RewriteError> {
    let stmts = match body {
        Expr::Block(stmts) => stmts,
        assignment @ Expr::Assignment { .. } => vec![assignment],
        other => {
            return Err(invalid_target(
                &other,
                "expected a begin ... end block or an assignment",
            ))
        }
    };

    let mut fields = Vec::new();
    let mut rewritten = Vec::with_capacity(stmts.len() + 1);
    for stmt in stmts {
        match stmt {
            Expr::Assignment { target, value } => {
                let target = collect_target(*target, &mut fields)?;
                rewritten.push(Expr::Assignment {
                    target: Box::new(target),
                    value,
                });
            }
            other => rewritten.push(other),
        }
    }

    if fields.is_empty() {
        return Err(invalid_target(
            &Expr::Block(rewritten),
            "no column assignments to collect",
        ));
    }

    rewritten.push(Expr::Record(
        fields
            .iter()
            .map(|name| (name.clone(), Expr::Ident(field_local(name))))
            .collect(),
    ));
    Ok(Collected {
        body: Expr::Block(rewritten),
        fields,
    })
}

/// Local variable holding a collected field until the record is built.
pub fn field_local(name: &str) -> String {
    format!("%t:{}", name)
}

fn collect_target(target: Expr, fields: &mut Vec<String>) -> Result<Expr, RewriteError> {
    match target {
        Expr::ColumnRef(ColumnIdent::Name(name)) => add_field(name, fields),
        Expr::Tuple(items) => {
            let items = items
                .into_iter()
                .map(|item| match item {
                    Expr::ColumnRef(ColumnIdent::Name(name)) => add_field(name, fields),
                    local @ (Expr::Ident(_) | Expr::Splat(_)) => Ok(local),
                    other => Err(invalid_target(&other, "destructuring targets must be :names or locals")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Tuple(items))
        }
        local @ Expr::Ident(_) => Ok(local),
        other => Err(invalid_target(&other, "collected targets must be column names like :name")),
    }
}

fn add_field(name: String, fields: &mut Vec<String>) -> Result<Expr, RewriteError> {
    if fields.contains(&name) {
        return Err(RewriteError::DuplicateTarget { name });
    }
    let local = Expr::Ident(field_local(&name));
    fields.push(name);
    Ok(local)
}

fn invalid_target(target: &Expr, reason: &str) -> RewriteError {
    RewriteError::InvalidDirectiveTarget {
        directive: "t".to_string(),
        target: target.to_string(),
        reason: reason.to_string(),
    }
}
