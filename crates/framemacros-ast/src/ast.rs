//! AST types for the FrameMacros notation
//!
//! One closed enum covers every node kind the rewriter distinguishes.
//! Trees are immutable once parsed; rewriting passes consume them by value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed `@kind(args...; kwargs...)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformCall {
    pub kind: String,
    pub args: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kwargs: Vec<(String, Expr)>,
}

/// Argument list with optional keyword options, as in `a, b; key = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    pub args: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kwargs: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    ColumnRef(ColumnIdent),
    Interpolated(Box<Expr>),
    Call {
        func: String,
        args: Vec<Expr>,
        broadcast: bool,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        broadcast: bool,
    },
    UnaryOp {
        op: UnOp,
        expr: Box<Expr>,
        broadcast: bool,
    },
    Index {
        expr: Box<Expr>,
        indices: Vec<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Vector(Vec<Expr>),
    Matrix(Vec<Vec<Expr>>),
    Tuple(Vec<Expr>),
    /// `rest...` in a destructuring target.
    Splat(String),
    /// Named fields built by the assignment collector.
    Record(Vec<(String, Expr)>),
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    DirectiveWrapped {
        directives: String,
        inner: Box<Expr>,
    },
    Block(Vec<Expr>),
}

/// Static column identifier: `:name`, `$"name"` or `$3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnIdent {
    Name(String),
    Position(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add, Sub, Mul, Div, Rem, Pow,
    Eq, Ne, Lt, Le, Gt, Ge,
    And, Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::ColumnRef(ColumnIdent::Name(name.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Expr::ColumnRef(_) | Expr::Interpolated(_))
    }
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "^" => BinOp::Pow,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for ColumnIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnIdent::Name(name) if is_plain_name(name) => write!(f, ":{}", name),
            ColumnIdent::Name(name) => write!(f, ":{:?}", name),
            ColumnIdent::Position(i) => write!(f, "${}", i),
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "missing"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Source-like rendering, used in error messages and plan summaries.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Ident(name) => f.write_str(name),
            Expr::ColumnRef(col) => write!(f, "{}", col),
            Expr::Interpolated(inner) => match inner.as_ref() {
                Expr::Ident(_) | Expr::Vector(_) | Expr::Matrix(_) => write!(f, "${}", inner),
                _ => write!(f, "$({})", inner),
            },
            Expr::Call { func, args, broadcast } => {
                write!(f, "{}{}(", func, if *broadcast { "." } else { "" })?;
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::BinaryOp { op, left, right, broadcast } => write!(
                f,
                "({} {}{} {})",
                left,
                if *broadcast { "." } else { "" },
                op.symbol(),
                right
            ),
            Expr::UnaryOp { op, expr, broadcast } => {
                let symbol = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                };
                write!(f, "{}{}{}", if *broadcast { "." } else { "" }, symbol, expr)
            }
            Expr::Index { expr, indices } => {
                write!(f, "{}[", expr)?;
                write_list(f, indices, ", ")?;
                write!(f, "]")
            }
            Expr::Conditional { cond, then, otherwise } => {
                write!(f, "({} ? {} : {})", cond, then, otherwise)
            }
            Expr::Vector(items) => {
                write!(f, "[")?;
                write_list(f, items, ", ")?;
                write!(f, "]")
            }
            Expr::Matrix(rows) => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write_list(f, row, " ")?;
                }
                write!(f, "]")
            }
            Expr::Tuple(items) => write_list(f, items, ", "),
            Expr::Splat(name) => write!(f, "{}...", name),
            Expr::Record(fields) => {
                write!(f, "(; ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, ")")
            }
            Expr::Assignment { target, value } => write!(f, "{} = {}", target, value),
            Expr::DirectiveWrapped { directives, inner } => write!(f, "@{} {}", directives, inner),
            Expr::Block(stmts) => {
                write!(f, "begin ")?;
                write_list(f, stmts, "; ")?;
                write!(f, " end")
            }
        }
    }
}
