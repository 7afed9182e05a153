//! Reference resolution: column references become function parameters

use framemacros_ast::Expr;
use framemacros_ir::ColumnSpec;

use crate::walk::map_children;

/// Prefix for generated parameter names; it cannot be written in source text.
pub const PARAM_PREFIX: &str = "%col";

/// What a parameter reads, known statically or only after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Static(ColumnSpec),
    /// Interpolated expression evaluated against the caller scope at bind time.
    Deferred(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub param: String,
    pub reference: Reference,
}

/// Per-argument binding table.
#[derive(Debug, Default)]
pub struct Resolver {
    bindings: Vec<Binding>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameter for `reference`, reusing the binding of an identical one.
    pub fn bind(&mut self, reference: Reference) -> String {
        if let Some(existing) = self.bindings.iter().find(|b| b.reference == reference) {
            return existing.param.clone();
        }
        let param = format!("{}{}", PARAM_PREFIX, self.bindings.len() + 1);
        self.bindings.push(Binding {
            param: param.clone(),
            reference,
        });
        param
    }

    /// Replace every column reference in `expr` by its parameter.
    pub fn replace_references(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::ColumnRef(ident) => Expr::Ident(self.bind(Reference::Static(ident.to_spec()))),
            Expr::Interpolated(inner) => Expr::Ident(self.bind(Reference::Deferred(*inner))),
            other => {
                let mapped: Result<Expr, std::convert::Infallible> =
                    map_children(other, &mut |child| Ok(self.replace_references(child)));
                match mapped {
                    Ok(expr) => expr,
                    Err(never) => match never {},
                }
            }
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn into_bindings(self) -> Vec<Binding> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ast::parse_expr;

    #[test]
    fn test_same_column_shares_binding() {
        let mut resolver = Resolver::new();
        let body = resolver.replace_references(parse_expr(":x + :x").unwrap());

        assert_eq!(resolver.bindings().len(), 1);
        assert_eq!(body.to_string(), "(%col1 + %col1)");
    }

    #[test]
    fn test_position_and_name_are_distinct_references() {
        let mut resolver = Resolver::new();
        resolver.replace_references(parse_expr("$1 * :x / :y").unwrap());

        let params: Vec<&str> = resolver.bindings().iter().map(|b| b.param.as_str()).collect();
        assert_eq!(params, vec!["%col1", "%col2", "%col3"]);
        assert_eq!(
            resolver.bindings()[0].reference,
            Reference::Static(ColumnSpec::Position { index: 1 })
        );
    }

    #[test]
    fn test_interpolation_is_deferred() {
        let mut resolver = Resolver::new();
        resolver.replace_references(parse_expr("$col + $(col) + :z").unwrap());

        let bindings = resolver.into_bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].reference, Reference::Deferred(Expr::ident("col")));
        assert_eq!(bindings[1].reference, Reference::Static(ColumnSpec::name("z")));
    }
}
