//! Pest-based parser for the FrameMacros notation

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::ast::*;

#[derive(Parser)]
#[grammar = "framemacros.pest"]
pub struct FrameMacrosParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Pest error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),
}

/// Parse a full `@kind(args...; kwargs...)` call
pub fn parse_call(source: &str) -> Result<TransformCall, ParseError> {
    let call = top_level(Rule::call, source)?;

    let mut kind = None;
    let mut arguments = None;
    for pair in call.into_inner() {
        match pair.as_rule() {
            Rule::kind_name => kind = Some(pair.as_str().to_string()),
            Rule::arguments => arguments = Some(build_arguments(pair)?),
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| ParseError::Syntax("Missing transformation kind".to_string()))?;
    let Arguments { args, kwargs } = arguments.unwrap_or(Arguments {
        args: Vec::new(),
        kwargs: Vec::new(),
    });
    Ok(TransformCall { kind, args, kwargs })
}

/// Parse a bare argument list, `arg, arg; key = value`
pub fn parse_arguments(source: &str) -> Result<Arguments, ParseError> {
    let top = top_level(Rule::args_only, source)?;
    for pair in top.into_inner() {
        if pair.as_rule() == Rule::arguments {
            return build_arguments(pair);
        }
    }
    Ok(Arguments {
        args: Vec::new(),
        kwargs: Vec::new(),
    })
}

/// Parse a single argument expression
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let top = top_level(Rule::single_arg, source)?;
    let arg = top
        .into_inner()
        .find(|p| p.as_rule() == Rule::arg)
        .ok_or_else(|| ParseError::Syntax("Empty input".to_string()))?;
    build(arg)
}

fn top_level(rule: Rule, source: &str) -> Result<Pair<'_>, ParseError> {
    let mut pairs = FrameMacrosParser::parse(rule, source)?;
    pairs.next().ok_or_else(|| ParseError::Syntax("Empty input".to_string()))
}

fn next<'i>(inner: &mut pest::iterators::Pairs<'i, Rule>, what: &str) -> Result<Pair<'i>, ParseError> {
    inner
        .next()
        .ok_or_else(|| ParseError::Syntax(format!("Missing {}", what)))
}

fn build_arguments(pair: Pair<'_>) -> Result<Arguments, ParseError> {
    let mut args = Vec::new();
    let mut kwargs = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::arg_list => {
                for arg in part.into_inner() {
                    args.push(build(arg)?);
                }
            }
            Rule::kwarg_list => {
                for kwarg in part.into_inner() {
                    let mut inner = kwarg.into_inner();
                    let name = next(&mut inner, "keyword name")?.as_str().to_string();
                    let value = build(next(&mut inner, "keyword value")?)?;
                    kwargs.push((name, value));
                }
            }
            _ => {}
        }
    }

    Ok(Arguments { args, kwargs })
}

fn build(pair: Pair<'_>) -> Result<Expr, ParseError> {
    match pair.as_rule() {
        // Wrapper rules that hold exactly one meaningful child
        Rule::arg
        | Rule::directive_body
        | Rule::rhs
        | Rule::statement
        | Rule::tuple_item
        | Rule::expr
        | Rule::primary
        | Rule::paren => {
            let mut inner = pair.into_inner();
            build(next(&mut inner, "expression")?)
        }
        Rule::directive_arg | Rule::inline_directive => {
            let mut inner = pair.into_inner();
            let directive = next(&mut inner, "directive")?;
            let body = build(next(&mut inner, "directive body")?)?;
            Ok(Expr::DirectiveWrapped {
                directives: directive.as_str().trim_start_matches('@').to_string(),
                inner: Box::new(body),
            })
        }
        Rule::assignment => {
            let mut inner = pair.into_inner();
            let target = build(next(&mut inner, "assignment target")?)?;
            let value = build(next(&mut inner, "assigned value")?)?;
            Ok(Expr::Assignment {
                target: Box::new(target),
                value: Box::new(value),
            })
        }
        Rule::tuple_assignment => {
            let mut parts = pair
                .into_inner()
                .map(build)
                .collect::<Result<Vec<_>, _>>()?;
            let value = parts
                .pop()
                .ok_or_else(|| ParseError::Syntax("Missing assigned value".to_string()))?;
            Ok(Expr::Assignment {
                target: Box::new(Expr::Tuple(parts)),
                value: Box::new(value),
            })
        }
        Rule::splat => {
            let mut inner = pair.into_inner();
            Ok(Expr::Splat(next(&mut inner, "splat name")?.as_str().to_string()))
        }
        Rule::block => {
            let stmts = pair.into_inner().map(build).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Block(stmts))
        }
        Rule::ternary => {
            let mut inner = pair.into_inner();
            let cond = build(next(&mut inner, "condition")?)?;
            match inner.next() {
                None => Ok(cond),
                Some(then) => {
                    let then = build(then)?;
                    let otherwise = build(next(&mut inner, "else branch")?)?;
                    Ok(Expr::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    })
                }
            }
        }
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => {
            // Flat sequence: operand (op operand)*
            let mut inner = pair.into_inner();
            let mut left = build(next(&mut inner, "operand")?)?;
            while let Some(op_pair) = inner.next() {
                let (op, broadcast) = binary_op(op_pair.as_str())?;
                let right = build(next(&mut inner, "right operand")?)?;
                left = Expr::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    broadcast,
                };
            }
            Ok(left)
        }
        Rule::pow_expr => {
            let mut inner = pair.into_inner();
            let base = build(next(&mut inner, "operand")?)?;
            match inner.next() {
                None => Ok(base),
                Some(op_pair) => {
                    let (op, broadcast) = binary_op(op_pair.as_str())?;
                    let exponent = build(next(&mut inner, "exponent")?)?;
                    Ok(Expr::BinaryOp {
                        op,
                        left: Box::new(base),
                        right: Box::new(exponent),
                        broadcast,
                    })
                }
            }
        }
        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::unary_op => ops.push(part.as_str().to_string()),
                    _ => operand = Some(build(part)?),
                }
            }
            let mut expr = operand.ok_or_else(|| ParseError::Syntax("Missing operand".to_string()))?;
            for op in ops.iter().rev() {
                let broadcast = op.starts_with('.');
                let op = match op.trim_start_matches('.') {
                    "-" => UnOp::Neg,
                    "!" => UnOp::Not,
                    other => return Err(ParseError::Syntax(format!("Unknown operator: {}", other))),
                };
                expr = Expr::UnaryOp {
                    op,
                    expr: Box::new(expr),
                    broadcast,
                };
            }
            Ok(expr)
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut expr = build(next(&mut inner, "operand")?)?;
            for index in inner {
                let indices = index.into_inner().map(build).collect::<Result<Vec<_>, _>>()?;
                expr = Expr::Index {
                    expr: Box::new(expr),
                    indices,
                };
            }
            Ok(expr)
        }
        Rule::call_expr => {
            let mut inner = pair.into_inner();
            let func = next(&mut inner, "function name")?.as_str().to_string();
            let mut broadcast = false;
            let mut args = Vec::new();
            for part in inner {
                match part.as_rule() {
                    Rule::bcast => broadcast = true,
                    _ => args.push(build(part)?),
                }
            }
            Ok(Expr::Call { func, args, broadcast })
        }
        Rule::interpolation => {
            let mut inner = pair.into_inner();
            let target = next(&mut inner, "interpolated value")?;
            match target.as_rule() {
                Rule::int => Ok(Expr::ColumnRef(ColumnIdent::Position(parse_int(target.as_str())?))),
                Rule::string => Ok(Expr::ColumnRef(ColumnIdent::Name(string_content(target)?))),
                _ => Ok(Expr::Interpolated(Box::new(build(target)?))),
            }
        }
        Rule::col_ref => {
            let mut inner = pair.into_inner();
            let target = next(&mut inner, "column name")?;
            let name = match target.as_rule() {
                Rule::string => string_content(target)?,
                _ => target.as_str().to_string(),
            };
            Ok(Expr::ColumnRef(ColumnIdent::Name(name)))
        }
        Rule::literal => {
            let mut inner = pair.into_inner();
            build_literal(next(&mut inner, "literal")?).map(Expr::Literal)
        }
        Rule::vector => {
            let items = pair.into_inner().map(build).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Vector(items))
        }
        Rule::matrix => {
            let rows = pair
                .into_inner()
                .map(|row| row.into_inner().map(build).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?;
            let width = rows.first().map(Vec::len).unwrap_or(0);
            if rows.iter().any(|row| row.len() != width) {
                return Err(ParseError::Syntax("Matrix rows must have equal length".to_string()));
            }
            Ok(Expr::Matrix(rows))
        }
        Rule::name => Ok(Expr::Ident(pair.as_str().to_string())),
        _ => Err(ParseError::Syntax(format!("Cannot parse expr: {:?}", pair.as_rule()))),
    }
}

fn binary_op(text: &str) -> Result<(BinOp, bool), ParseError> {
    let broadcast = text.starts_with('.');
    let op = BinOp::from_symbol(text.trim_start_matches('.'))
        .ok_or_else(|| ParseError::Syntax(format!("Unknown operator: {}", text)))?;
    Ok((op, broadcast))
}

fn build_literal(pair: Pair<'_>) -> Result<Literal, ParseError> {
    let literal = match pair.as_rule() {
        Rule::int => Literal::Int(parse_int(pair.as_str())?),
        Rule::float => Literal::Float(
            pair.as_str()
                .parse()
                .map_err(|_| ParseError::Syntax(format!("Invalid number: {}", pair.as_str())))?,
        ),
        Rule::string => Literal::String(string_content(pair)?),
        Rule::char => {
            let mut inner = pair.into_inner();
            Literal::String(unescape(next(&mut inner, "character")?.as_str()))
        }
        Rule::bool => Literal::Bool(pair.as_str() == "true"),
        Rule::null => Literal::Null,
        _ => return Err(ParseError::Syntax("Invalid literal".to_string())),
    };
    Ok(literal)
}

fn parse_int(text: &str) -> Result<i64, ParseError> {
    text.parse()
        .map_err(|_| ParseError::Syntax(format!("Integer out of range: {}", text)))
}

fn string_content(pair: Pair<'_>) -> Result<String, ParseError> {
    let mut inner = pair.into_inner();
    Ok(unescape(next(&mut inner, "string body")?.as_str()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: func.to_string(),
            args,
            broadcast: false,
        }
    }

    #[test]
    fn test_parse_simple_assignment() {
        let expr = parse_expr(":y = :x + 1").unwrap();
        assert_eq!(
            expr,
            Expr::Assignment {
                target: Box::new(Expr::column("y")),
                value: Box::new(Expr::BinaryOp {
                    op: BinOp::Add,
                    left: Box::new(Expr::column("x")),
                    right: Box::new(Expr::Literal(Literal::Int(1))),
                    broadcast: false,
                }),
            }
        );
    }

    #[test]
    fn test_parse_column_identifier_forms() {
        assert_eq!(parse_expr(r#"$"x""#).unwrap(), Expr::column("x"));
        assert_eq!(parse_expr(":\"first name\"").unwrap(), Expr::column("first name"));
        assert_eq!(
            parse_expr("$2").unwrap(),
            Expr::ColumnRef(ColumnIdent::Position(2))
        );
        assert_eq!(
            parse_expr("$col").unwrap(),
            Expr::Interpolated(Box::new(Expr::ident("col")))
        );
        assert_eq!(
            parse_expr("$(cols[1])").unwrap(),
            Expr::Interpolated(Box::new(Expr::Index {
                expr: Box::new(Expr::ident("cols")),
                indices: vec![Expr::Literal(Literal::Int(1))],
            }))
        );
    }

    #[test]
    fn test_parse_directive_on_rhs() {
        let expr = parse_expr(":z = @c :x .- mean(:x)").unwrap();
        let Expr::Assignment { value, .. } = expr else {
            panic!("expected assignment");
        };
        match *value {
            Expr::DirectiveWrapped { directives, inner } => {
                assert_eq!(directives, "c");
                assert!(matches!(*inner, Expr::BinaryOp { op: BinOp::Sub, broadcast: true, .. }));
            }
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_destructuring_directive() {
        let expr = parse_expr("@t :first_name, :last_name = split(:full_name)").unwrap();
        let Expr::DirectiveWrapped { directives, inner } = expr else {
            panic!("expected directive");
        };
        assert_eq!(directives, "t");
        assert_eq!(
            *inner,
            Expr::Assignment {
                target: Box::new(Expr::Tuple(vec![
                    Expr::column("first_name"),
                    Expr::column("last_name")
                ])),
                value: Box::new(call("split", vec![Expr::column("full_name")])),
            }
        );
    }

    #[test]
    fn test_parse_block_statements() {
        let expr = parse_expr(
            "@t begin
                s = split(:name)
                :first = s[1]
                :last = s[2]
            end",
        )
        .unwrap();
        let Expr::DirectiveWrapped { inner, .. } = expr else {
            panic!("expected directive");
        };
        let Expr::Block(stmts) = *inner else {
            panic!("expected block");
        };
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[0], Expr::Assignment { target, .. } if **target == Expr::ident("s")));
    }

    #[test]
    fn test_parse_ternary_and_char() {
        let expr = parse_expr(r#":half = :Name[1] <= 'M' ? "first" : "second""#).unwrap();
        let Expr::Assignment { value, .. } = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(*value, Expr::Conditional { .. }));
    }

    #[test]
    fn test_parse_matrix_target() {
        let expr = parse_expr(r#"["a" "c"; "b" "d"] = :x"#).unwrap();
        let Expr::Assignment { target, .. } = expr else {
            panic!("expected assignment");
        };
        let Expr::Matrix(rows) = *target else {
            panic!("expected matrix");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_parse_broadcast_call_target() {
        let expr = parse_expr(r#"lowercase.($Real) .* "_32" = Float32($Real)"#).unwrap();
        let Expr::Assignment { target, .. } = expr else {
            panic!("expected assignment");
        };
        assert!(matches!(*target, Expr::BinaryOp { op: BinOp::Mul, broadcast: true, .. }));
    }

    #[test]
    fn test_parse_call_with_kwargs() {
        let call = parse_call(r#"@subset(@m startswith(:Name, "M") && :Age > 50; skipmissing = true)"#).unwrap();
        assert_eq!(call.kind, "subset");
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.kwargs.len(), 1);
        assert_eq!(call.kwargs[0].0, "skipmissing");
    }

    #[test]
    fn test_parse_bang_kind_and_multiple_args() {
        let call = parse_call("@transform!(:y = :x + 1, :z = :x * 2)").unwrap();
        assert_eq!(call.kind, "transform!");
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn test_directive_without_assignment_keeps_args_separate() {
        let args = parse_arguments("@c :x, :y").unwrap();
        assert_eq!(args.args.len(), 2);
    }

    #[test]
    fn test_splat_in_destructuring() {
        let expr = parse_expr("@t :last, :first, rest... = split(:Name)").unwrap();
        let Expr::DirectiveWrapped { inner, .. } = expr else {
            panic!("expected directive");
        };
        let Expr::Assignment { target, .. } = *inner else {
            panic!("expected assignment");
        };
        assert_eq!(
            *target,
            Expr::Tuple(vec![
                Expr::column("last"),
                Expr::column("first"),
                Expr::Splat("rest".to_string())
            ])
        );
    }

    #[test]
    fn test_inline_directive_binds_to_operand() {
        let expr = parse_expr(":y = f(@c :x + 1)").unwrap();
        let Expr::Assignment { value, .. } = expr else {
            panic!("expected assignment");
        };
        let Expr::Call { args, .. } = *value else {
            panic!("expected call");
        };
        let Expr::BinaryOp { left, .. } = &args[0] else {
            panic!("expected binary op");
        };
        assert!(matches!(
            left.as_ref(),
            Expr::DirectiveWrapped { directives, .. } if directives == "c"
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(parse_expr(":y = ").is_err());
        assert!(parse_call("transform(:x)").is_err());
    }
}
