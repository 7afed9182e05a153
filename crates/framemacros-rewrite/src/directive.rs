//! Directive handling: peel the outermost directive off an argument

use framemacros_ast::Expr;

use crate::classify::{classify, DirectiveSet, NodeClass};
use crate::error::{PlanError, RewriteError};
use crate::walk::visit;

/// An argument split into its optional target and function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Peeled {
    pub directives: DirectiveSet,
    pub target: Option<Expr>,
    pub body: Expr,
}

/// Directives may wrap the whole argument or the right-hand side of its
/// top-level assignment. `@t` only wraps whole arguments.
pub fn peel(arg: &Expr) -> Result<Peeled, RewriteError> {
    let peeled = match classify(arg)? {
        NodeClass::Directive { directives, inner } => match classify(inner)? {
            NodeClass::Assignment { target, value } if !directives.collect => Peeled {
                directives,
                target: Some(target.clone()),
                body: value.clone(),
            },
            _ => Peeled {
                directives,
                target: None,
                body: inner.clone(),
            },
        },
        NodeClass::Assignment { target, value } => match classify(value)? {
            NodeClass::Directive { directives, inner } => {
                if directives.collect {
                    return Err(RewriteError::InvalidDirectiveTarget {
                        directive: "t".to_string(),
                        target: inner.to_string(),
                        reason: format!(
                            "the assignment target {} already names the sink; @t must wrap the whole argument",
                            target
                        ),
                    });
                }
                Peeled {
                    directives,
                    target: Some(target.clone()),
                    body: inner.clone(),
                }
            }
            _ => Peeled {
                directives: DirectiveSet::default(),
                target: Some(target.clone()),
                body: value.clone(),
            },
        },
        _ => Peeled {
            directives: DirectiveSet::default(),
            target: None,
            body: arg.clone(),
        },
    };

    reject_inner_directives(&peeled)?;
    Ok(peeled)
}

/// Any directive left below the argument position is misplaced. Misplaced
/// row and column letters together still count as a conflict.
fn reject_inner_directives(peeled: &Peeled) -> Result<(), RewriteError> {
    let mut found = Vec::new();
    for root in peeled.target.iter().chain(std::iter::once(&peeled.body)) {
        visit(root, &mut |node| {
            if let Expr::DirectiveWrapped { directives, .. } = node {
                found.push(directives.as_str());
            }
        });
    }
    if found.is_empty() {
        return Ok(());
    }

    let mut combined = peeled.directives;
    for letters in &found {
        combined = combined.union(DirectiveSet::parse(letters)?);
    }
    if combined.is_conflicting() {
        return Err(RewriteError::ConflictingDirective {
            directives: combined.letters(),
        });
    }
    Err(RewriteError::MalformedDirective {
        directives: found.join(""),
        reason: "directives must wrap a whole argument or the right-hand side of its assignment"
            .to_string(),
    })
}

/// Block arguments without directives stand for one argument per statement.
pub fn expand_block_arguments(args: &[Expr]) -> Result<Vec<Expr>, PlanError> {
    let mut expanded = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let class = classify(arg).map_err(|source| PlanError::Argument { index, source })?;
        match class {
            NodeClass::MultiAssignment(stmts) => expanded.extend(stmts.iter().cloned()),
            _ => expanded.push(arg.clone()),
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ast::parse_expr;

    fn peel_str(source: &str) -> Result<Peeled, RewriteError> {
        peel(&parse_expr(source).unwrap())
    }

    #[test]
    fn test_directive_on_whole_argument() {
        let peeled = peel_str("@c :y = :x .- mean(:x)").unwrap();
        assert!(peeled.directives.column);
        assert_eq!(peeled.target, Some(Expr::column("y")));
    }

    #[test]
    fn test_directive_on_right_hand_side() {
        let peeled = peel_str(":y = @m uppercase(:x)").unwrap();
        assert!(peeled.directives.passmissing);
        assert_eq!(peeled.body.to_string(), "uppercase(:x)");
    }

    #[test]
    fn test_collect_keeps_assignment_as_body() {
        let peeled = peel_str("@t :a = :x").unwrap();
        assert!(peeled.target.is_none());
        assert!(matches!(peeled.body, Expr::Assignment { .. }));
    }

    #[test]
    fn test_nested_directive_is_malformed() {
        assert!(matches!(
            peel_str("@m @m :x"),
            Err(RewriteError::MalformedDirective { .. })
        ));
        assert!(matches!(
            peel_str(":y = f(@c :x)"),
            Err(RewriteError::MalformedDirective { .. })
        ));
    }

    #[test]
    fn test_plain_argument_and_unknown_letters() {
        let peeled = peel_str(":x + 1").unwrap();
        assert_eq!(peeled.directives, DirectiveSet::default());
        assert!(peeled.target.is_none());
        assert_eq!(peeled.body.to_string(), "(:x + 1)");

        match peel_str(":y = @q :x") {
            Err(RewriteError::MalformedDirective { reason, .. }) => {
                assert_eq!(reason, "unknown directive `q`")
            }
            other => panic!("expected a malformed directive, got {:?}", other),
        }
    }

    #[test]
    fn test_split_row_and_column_conflict() {
        assert!(matches!(
            peel_str("@r @c :x"),
            Err(RewriteError::ConflictingDirective { .. })
        ));
    }

    #[test]
    fn test_collect_on_right_hand_side_rejected() {
        assert!(matches!(
            peel_str(":y = @t :a = :x"),
            Err(RewriteError::InvalidDirectiveTarget { .. })
        ));
    }

    #[test]
    fn test_block_argument_expands() {
        let block = parse_expr("begin :y = :x + 1; :z = :x * 2 end").unwrap();
        let expanded = expand_block_arguments(&[block, Expr::column("w")]).unwrap();
        assert_eq!(expanded.len(), 3);
    }
}
