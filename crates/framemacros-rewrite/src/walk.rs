//! Structural traversal of expression trees

use framemacros_ast::Expr;

/// Rebuild `expr` with `f` applied to each direct child.
pub(crate) fn map_children<E, F>(expr: Expr, f: &mut F) -> Result<Expr, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    let mapped = match expr {
        leaf @ (Expr::Literal(_) | Expr::Ident(_) | Expr::ColumnRef(_) | Expr::Splat(_)) => leaf,
        Expr::Interpolated(inner) => Expr::Interpolated(map_box(inner, f)?),
        Expr::Call {
            func,
            args,
            broadcast,
        } => Expr::Call {
            func,
            args: map_all(args, f)?,
            broadcast,
        },
        Expr::BinaryOp {
            op,
            left,
            right,
            broadcast,
        } => Expr::BinaryOp {
            op,
            left: map_box(left, f)?,
            right: map_box(right, f)?,
            broadcast,
        },
        Expr::UnaryOp {
            op,
            expr,
            broadcast,
        } => Expr::UnaryOp {
            op,
            expr: map_box(expr, f)?,
            broadcast,
        },
        Expr::Index { expr, indices } => Expr::Index {
            expr: map_box(expr, f)?,
            indices: map_all(indices, f)?,
        },
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => Expr::Conditional {
            cond: map_box(cond, f)?,
            then: map_box(then, f)?,
            otherwise: map_box(otherwise, f)?,
        },
        Expr::Vector(items) => Expr::Vector(map_all(items, f)?),
        Expr::Matrix(rows) => Expr::Matrix(
            rows.into_iter()
                .map(|row| map_all(row, f))
                .collect::<Result<_, E>>()?,
        ),
        Expr::Tuple(items) => Expr::Tuple(map_all(items, f)?),
        Expr::Record(fields) => Expr::Record(
            fields
                .into_iter()
                .map(|(name, value)| Ok((name, f(value)?)))
                .collect::<Result<_, E>>()?,
        ),
        Expr::Assignment { target, value } => Expr::Assignment {
            target: map_box(target, f)?,
            value: map_box(value, f)?,
        },
        Expr::DirectiveWrapped { directives, inner } => Expr::DirectiveWrapped {
            directives,
            inner: map_box(inner, f)?,
        },
        Expr::Block(stmts) => Expr::Block(map_all(stmts, f)?),
    };
    Ok(mapped)
}

fn map_box<E, F>(expr: Box<Expr>, f: &mut F) -> Result<Box<Expr>, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    Ok(Box::new(f(*expr)?))
}

fn map_all<E, F>(items: Vec<Expr>, f: &mut F) -> Result<Vec<Expr>, E>
where
    F: FnMut(Expr) -> Result<Expr, E>,
{
    items.into_iter().map(|item| f(item)).collect()
}

/// Direct children in source order.
pub(crate) fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Literal(_) | Expr::Ident(_) | Expr::ColumnRef(_) | Expr::Splat(_) => Vec::new(),
        Expr::Interpolated(inner) | Expr::DirectiveWrapped { inner, .. } => vec![inner.as_ref()],
        Expr::UnaryOp { expr, .. } => vec![expr.as_ref()],
        Expr::Call { args, .. } => args.iter().collect(),
        Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        Expr::Index { expr, indices } => std::iter::once(expr.as_ref()).chain(indices).collect(),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => vec![cond.as_ref(), then.as_ref(), otherwise.as_ref()],
        Expr::Vector(items) | Expr::Tuple(items) | Expr::Block(items) => items.iter().collect(),
        Expr::Matrix(rows) => rows.iter().flatten().collect(),
        Expr::Record(fields) => fields.iter().map(|(_, value)| value).collect(),
        Expr::Assignment { target, value } => vec![target.as_ref(), value.as_ref()],
    }
}

/// Pre-order visit of every node.
pub(crate) fn visit<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Expr)) {
    f(expr);
    for child in children(expr) {
        visit(child, f);
    }
}

/// First node (pre-order) satisfying `pred`.
pub(crate) fn find<'a>(expr: &'a Expr, pred: &dyn Fn(&Expr) -> bool) -> Option<&'a Expr> {
    if pred(expr) {
        return Some(expr);
    }
    children(expr).into_iter().find_map(|child| find(child, pred))
}
