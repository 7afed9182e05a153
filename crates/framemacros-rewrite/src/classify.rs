//! Node classification and directive letters

use framemacros_ast::{ColumnIdent, Expr};
use framemacros_ir::EvaluationMode;

use crate::error::RewriteError;

/// What role a sub-tree plays for the rewriter.
#[derive(Debug, PartialEq)]
pub enum NodeClass<'a> {
    PlainValue,
    ColumnReference(&'a ColumnIdent),
    Interpolated(&'a Expr),
    Directive {
        directives: DirectiveSet,
        inner: &'a Expr,
    },
    MultiAssignment(&'a [Expr]),
    Assignment {
        target: &'a Expr,
        value: &'a Expr,
    },
}

/// Classify one node. Fails only on unrecognized directive letters.
pub fn classify(expr: &Expr) -> Result<NodeClass<'_>, RewriteError> {
    let class = match expr {
        Expr::ColumnRef(ident) => NodeClass::ColumnReference(ident),
        Expr::Interpolated(inner) => NodeClass::Interpolated(inner),
        Expr::DirectiveWrapped { directives, inner } => NodeClass::Directive {
            directives: DirectiveSet::parse(directives)?,
            inner,
        },
        Expr::Block(stmts) => NodeClass::MultiAssignment(stmts),
        Expr::Assignment { target, value } => NodeClass::Assignment { target, value },
        Expr::Literal(_)
        | Expr::Ident(_)
        | Expr::Call { .. }
        | Expr::BinaryOp { .. }
        | Expr::UnaryOp { .. }
        | Expr::Index { .. }
        | Expr::Conditional { .. }
        | Expr::Vector(_)
        | Expr::Matrix(_)
        | Expr::Tuple(_)
        | Expr::Splat(_)
        | Expr::Record(_) => NodeClass::PlainValue,
    };
    Ok(class)
}

/// Parsed directive letters: `r` row mode, `c` column mode,
/// `m` missing propagation, `t` collect assignments into a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    pub row: bool,
    pub column: bool,
    pub passmissing: bool,
    pub collect: bool,
}

impl DirectiveSet {
    pub fn parse(letters: &str) -> Result<Self, RewriteError> {
        if letters.is_empty() {
            return Err(RewriteError::MalformedDirective {
                directives: String::new(),
                reason: "no directive letters".to_string(),
            });
        }
        let mut set = DirectiveSet::default();
        for letter in letters.chars() {
            match letter {
                'r' => set.row = true,
                'c' => set.column = true,
                'm' => set.passmissing = true,
                't' => set.collect = true,
                other => {
                    return Err(RewriteError::MalformedDirective {
                        directives: letters.to_string(),
                        reason: format!("unknown directive `{}`", other),
                    })
                }
            }
        }
        Ok(set)
    }

    pub fn union(self, other: DirectiveSet) -> DirectiveSet {
        DirectiveSet {
            row: self.row || other.row,
            column: self.column || other.column,
            passmissing: self.passmissing || other.passmissing,
            collect: self.collect || other.collect,
        }
    }

    pub fn is_conflicting(&self) -> bool {
        self.row && self.column
    }

    /// Evaluation mode after applying the mode letters to a kind's default.
    pub fn mode(&self, default: EvaluationMode) -> Result<EvaluationMode, RewriteError> {
        match (self.row, self.column) {
            (true, true) => Err(RewriteError::ConflictingDirective {
                directives: self.letters(),
            }),
            (true, false) => Ok(EvaluationMode::RowWise),
            (false, true) => Ok(EvaluationMode::ColumnWise),
            (false, false) => Ok(default),
        }
    }

    pub fn letters(&self) -> String {
        [
            (self.row, 'r'),
            (self.column, 'c'),
            (self.passmissing, 'm'),
            (self.collect, 't'),
        ]
        .into_iter()
        .filter_map(|(on, letter)| on.then_some(letter))
        .collect()
    }
}
