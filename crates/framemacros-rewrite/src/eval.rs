//! Tree-walking evaluator for function bodies, selectors and sink expressions

use framemacros_ast::{BinOp, ColumnIdent, Expr, UnOp};
use framemacros_ir::{ColumnSpec, Grid, Record, TableSchema, TypeFilter, Value};
use framemacros_registry::FunctionRegistry;

use crate::broadcast::{broadcast_shapes, column_major, operand_offset};
use crate::error::EvalError;
use crate::scope::Scope;

/// Local variables, innermost last.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: Vec<(String, Value)>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.vars.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn len(&self) -> usize {
        self.vars.len()
    }

    fn truncate(&mut self, len: usize) {
        self.vars.truncate(len);
    }
}

/// How column references and unknown identifiers are treated.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Synthesized function body: references were replaced by parameters.
    Body,
    /// Interpolated expression producing a column specifier.
    Selector { scope: &'a Scope },
    /// Target expression producing sink names.
    Sink {
        scope: &'a Scope,
        schema: &'a TableSchema,
    },
}

pub struct Evaluator<'a> {
    registry: &'a FunctionRegistry,
    mode: Mode<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a FunctionRegistry, mode: Mode<'a>) -> Self {
        Self { registry, mode }
    }

    pub fn eval(&self, expr: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(lit.to_value()),
            Expr::Ident(name) => self.lookup(name, env),
            Expr::ColumnRef(ident) => self.column_ref(ident),
            Expr::Interpolated(inner) => self.interpolate(inner, env),
            Expr::Call {
                func,
                args,
                broadcast,
            } => {
                let values = self.eval_all(args, env)?;
                if *broadcast {
                    broadcast_map(values, |xs| Ok(self.registry.call(func, xs)?))
                } else {
                    Ok(self.registry.call(func, &values)?)
                }
            }
            Expr::BinaryOp {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
                ..
            } => {
                let left = self.eval(left, env)?;
                match (op, condition(&left)?) {
                    (BinOp::And, false) => Ok(Value::Bool(false)),
                    (BinOp::Or, true) => Ok(Value::Bool(true)),
                    _ => self.eval(right, env),
                }
            }
            Expr::BinaryOp {
                op,
                left,
                right,
                broadcast,
            } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                if *broadcast {
                    broadcast_map(vec![left, right], |xs| binary(*op, &xs[0], &xs[1]))
                } else if matches!(op, BinOp::Eq | BinOp::Ne) {
                    let equal = values_equal(&left, &right);
                    match equal {
                        Some(eq) => Ok(Value::Bool(eq == (*op == BinOp::Eq))),
                        None => Ok(Value::Null),
                    }
                } else if left.is_collection() || right.is_collection() {
                    Err(type_mismatch(op.symbol(), &[&left, &right]))
                } else {
                    binary(*op, &left, &right)
                }
            }
            Expr::UnaryOp {
                op,
                expr,
                broadcast,
            } => {
                let value = self.eval(expr, env)?;
                if *broadcast {
                    broadcast_map(vec![value], |xs| unary(*op, &xs[0]))
                } else if value.is_collection() {
                    Err(type_mismatch(unary_symbol(*op), &[&value]))
                } else {
                    unary(*op, &value)
                }
            }
            Expr::Index { expr, indices } => {
                let target = self.eval(expr, env)?;
                let indices = self.eval_all(indices, env)?;
                index(&target, &indices)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond, env)?;
                if condition(&cond)? {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Vector(items) | Expr::Tuple(items) => Ok(Value::List(self.eval_all(items, env)?)),
            Expr::Matrix(rows) => {
                let rows = rows
                    .iter()
                    .map(|row| self.eval_all(row, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Grid::from_rows(rows)
                    .map(Value::Grid)
                    .ok_or_else(|| EvalError::Unsupported("ragged matrix literal".to_string()))
            }
            Expr::Record(fields) => {
                let mut record = Record::new();
                for (name, value) in fields {
                    record.push(name.clone(), self.eval(value, env)?);
                }
                Ok(Value::Record(record))
            }
            Expr::Assignment { target, value } => {
                let value = self.eval(value, env)?;
                assign(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Block(stmts) => {
                let mark = env.len();
                let mut last = Value::Null;
                for stmt in stmts {
                    last = self.eval(stmt, env)?;
                }
                env.truncate(mark);
                Ok(last)
            }
            Expr::Splat(name) => Err(EvalError::Unsupported(format!(
                "`{}...` outside a destructuring assignment",
                name
            ))),
            Expr::DirectiveWrapped { directives, .. } => Err(EvalError::Unsupported(format!(
                "directive @{} inside an expression",
                directives
            ))),
        }
    }

    fn eval_all(&self, exprs: &[Expr], env: &mut Env) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    fn lookup(&self, name: &str, env: &Env) -> Result<Value, EvalError> {
        if let Some(value) = env.get(name) {
            return Ok(value.clone());
        }
        let scope = match self.mode {
            Mode::Body => None,
            Mode::Selector { scope } | Mode::Sink { scope, .. } => Some(scope),
        };
        if let Some(value) = scope.and_then(|s| s.get(name)) {
            return Ok(value.clone());
        }
        if scope.is_some() {
            if let Some(filter) = TypeFilter::from_name(name) {
                return Ok(Value::Spec(ColumnSpec::TypeFilter { filter }));
            }
        }
        Err(EvalError::UndefinedVariable(name.to_string()))
    }

    fn column_ref(&self, ident: &ColumnIdent) -> Result<Value, EvalError> {
        match (self.mode, ident) {
            (Mode::Body, _) => Err(EvalError::UnboundColumnReference(ident.to_string())),
            (Mode::Selector { .. }, _) => Ok(Value::Spec(ident.to_spec())),
            (Mode::Sink { .. }, ColumnIdent::Name(name)) => Ok(Value::String(name.clone())),
            (Mode::Sink { schema, .. }, ColumnIdent::Position(_)) => {
                Ok(Value::String(ident.to_spec().resolve_single(schema)?))
            }
        }
    }

    fn interpolate(&self, inner: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        match self.mode {
            Mode::Body => Err(EvalError::UnboundColumnReference(format!("$({})", inner))),
            Mode::Selector { .. } => self.eval(inner, env),
            Mode::Sink { scope, schema } => {
                let value = Evaluator::new(self.registry, Mode::Selector { scope }).eval(inner, env)?;
                let selection = ColumnSpec::try_from(value)?.resolve(schema)?;
                let names = selection.names.into_iter().map(Value::String).collect();
                Ok(Value::from_shape(&selection.shape, names))
            }
        }
    }
}

/// Bind the result of an assignment to local names.
fn assign(target: &Expr, value: Value, env: &mut Env) -> Result<(), EvalError> {
    match target {
        Expr::Ident(name) => {
            env.push(name.clone(), value);
            Ok(())
        }
        Expr::Tuple(items) => destructure(items, value, env),
        other => Err(EvalError::Unsupported(format!("assignment to {}", other))),
    }
}

/// `a, b, rest... = collection`; surplus elements without a splat are dropped.
fn destructure(items: &[Expr], value: Value, env: &mut Env) -> Result<(), EvalError> {
    let elements = match value {
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Value::List(_) | Value::Grid(_) => value.into_elements(),
        other => return Err(type_mismatch("destructure", &[&other])),
    };

    let fixed = items.iter().filter(|item| !matches!(item, Expr::Splat(_))).count();
    if elements.len() < fixed {
        return Err(EvalError::DestructureMismatch {
            expected: fixed,
            actual: elements.len(),
        });
    }

    let mut elements = elements.into_iter();
    for (position, item) in items.iter().enumerate() {
        match item {
            Expr::Splat(name) => {
                if position + 1 != items.len() {
                    return Err(EvalError::Unsupported(format!(
                        "`{}...` must be the last destructuring target",
                        name
                    )));
                }
                env.push(name.clone(), Value::List(elements.by_ref().collect()));
            }
            target => {
                let element = elements.next().ok_or(EvalError::DestructureMismatch {
                    expected: fixed,
                    actual: position,
                })?;
                assign(target, element, env)?;
            }
        }
    }
    Ok(())
}

/// Apply `f` elementwise over broadcast arguments. Strings and records are scalars.
pub fn broadcast_map<F>(args: Vec<Value>, mut f: F) -> Result<Value, EvalError>
where
    F: FnMut(&[Value]) -> Result<Value, EvalError>,
{
    let shapes: Vec<Vec<usize>> = args.iter().map(Value::shape).collect();
    let shape = broadcast_shapes(&shapes).ok_or_else(|| EvalError::ShapeMismatch {
        shapes: shapes.clone(),
    })?;
    if shape.is_empty() {
        return f(&args);
    }

    let mut out = Vec::new();
    for index in column_major(&shape) {
        let elements: Vec<Value> = args
            .iter()
            .zip(&shapes)
            .map(|(arg, arg_shape)| element_at(arg, arg_shape, &index))
            .collect();
        out.push(f(&elements)?);
    }
    Ok(Value::from_shape(&shape, out))
}

fn element_at(value: &Value, shape: &[usize], index: &[usize]) -> Value {
    let offset = operand_offset(shape, index);
    match value {
        Value::List(items) => items[offset].clone(),
        Value::Grid(grid) => grid.data()[offset].clone(),
        scalar => scalar.clone(),
    }
}

fn condition(value: &Value) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or(EvalError::NonBooleanCondition(value.type_name()))
}

fn type_mismatch(op: &str, operands: &[&Value]) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        types: operands.iter().map(|v| v.type_name()).collect(),
    }
}

fn unary_symbol(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
    }
}

fn unary(op: UnOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Arithmetic("integer overflow".to_string())),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(type_mismatch(unary_symbol(op), &[other])),
    }
}

/// Scalar binary operation; `missing` operands give `missing`.
fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    let result = match (op, left, right) {
        (BinOp::Eq, _, _) => Value::Bool(values_equal(left, right) == Some(true)),
        (BinOp::Ne, _, _) => Value::Bool(values_equal(left, right) == Some(false)),
        (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, _, _) => {
            let ord = left
                .compare(right)
                .ok_or_else(|| type_mismatch(op.symbol(), &[left, right]))?;
            Value::Bool(match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
        (BinOp::Mul, Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
        (BinOp::Pow, Value::String(s), Value::Int(n)) => {
            let n = usize::try_from(*n)
                .map_err(|_| EvalError::Arithmetic("negative repetition count".to_string()))?;
            Value::String(s.repeat(n))
        }
        (_, Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b)?,
        (_, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(type_mismatch(op.symbol(), &[left, right])),
            };
            Value::Float(float_arith(op, a, b)?)
        }
        _ => return Err(type_mismatch(op.symbol(), &[left, right])),
    };
    Ok(result)
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let overflow = || EvalError::Arithmetic("integer overflow".to_string());
    let value = match op {
        BinOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinOp::Div => Value::Float(a as f64 / b as f64),
        BinOp::Rem => {
            if b == 0 {
                return Err(EvalError::Arithmetic("integer division by zero".to_string()));
            }
            Value::Int(a.checked_rem(b).ok_or_else(overflow)?)
        }
        BinOp::Pow => match u32::try_from(b) {
            Ok(exp) => Value::Int(a.checked_pow(exp).ok_or_else(overflow)?),
            Err(_) => Value::Float((a as f64).powf(b as f64)),
        },
        other => return Err(EvalError::Unsupported(format!("integer operator {}", other.symbol()))),
    };
    Ok(value)
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<f64, EvalError> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        BinOp::Pow => a.powf(b),
        other => return Err(EvalError::Unsupported(format!("float operator {}", other.symbol()))),
    };
    Ok(value)
}

/// Structural equality with numeric promotion; `None` when `missing` is involved.
fn values_equal(left: &Value, right: &Value) -> Option<bool> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Some(left.compare(right) == Some(std::cmp::Ordering::Equal))
        }
        (Value::List(a), Value::List(b)) => {
            if a.len() != b.len() {
                return Some(false);
            }
            let mut all = true;
            for (x, y) in a.iter().zip(b) {
                match values_equal(x, y) {
                    Some(true) => {}
                    Some(false) => return Some(false),
                    None => all = false,
                }
            }
            if all {
                Some(true)
            } else {
                None
            }
        }
        _ => Some(left == right),
    }
}

/// 1-based indexing into lists, grids, strings and records.
fn index(target: &Value, indices: &[Value]) -> Result<Value, EvalError> {
    match (target, indices) {
        (Value::Record(record), [Value::String(name)]) => record
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::Unsupported(format!("record has no field `{}`", name))),
        (Value::String(s), [i]) => {
            let len = s.chars().count();
            let pos = position(i, len)?;
            Ok(s.chars()
                .nth(pos)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        (Value::List(items), [i]) => Ok(items[position(i, items.len())?].clone()),
        (Value::Grid(grid), [i]) => Ok(grid.data()[position(i, grid.data().len())?].clone()),
        (Value::Grid(grid), indices) if indices.len() == grid.shape().len() => {
            let mut multi = Vec::with_capacity(indices.len());
            for (i, &size) in indices.iter().zip(grid.shape()) {
                multi.push(position(i, size)?);
            }
            grid.get(&multi)
                .cloned()
                .ok_or_else(|| EvalError::Unsupported("grid index".to_string()))
        }
        (other, indices) => {
            let mut operands = vec![other];
            operands.extend(indices);
            Err(type_mismatch("[]", &operands))
        }
    }
}

fn position(index: &Value, len: usize) -> Result<usize, EvalError> {
    let Value::Int(i) = index else {
        return Err(type_mismatch("[]", &[index]));
    };
    usize::try_from(*i)
        .ok()
        .filter(|&i| i >= 1 && i <= len)
        .map(|i| i - 1)
        .ok_or(EvalError::IndexOutOfBounds { index: *i, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ast::parse_expr;

    fn eval_body(source: &str, vars: &[(&str, Value)]) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::default();
        let mut env = Env::new();
        for (name, value) in vars {
            env.push(*name, value.clone());
        }
        Evaluator::new(&registry, Mode::Body).eval(&parse_expr(source).unwrap(), &mut env)
    }

    #[test]
    fn test_arithmetic_and_promotion() {
        assert_eq!(eval_body("1 + 2 * 3", &[]).unwrap(), Value::Int(7));
        assert_eq!(eval_body("3 / 2", &[]).unwrap(), Value::Float(1.5));
        assert_eq!(eval_body("2 ^ 10", &[]).unwrap(), Value::Int(1024));
        assert_eq!(eval_body("1 + 0.5", &[]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_missing_propagates_through_operators() {
        assert_eq!(eval_body("x + 1", &[("x", Value::Null)]).unwrap(), Value::Null);
        assert_eq!(eval_body("x > 50", &[("x", Value::Null)]).unwrap(), Value::Null);
        assert_eq!(
            eval_body("x > 50 && true", &[("x", Value::Null)]),
            Err(EvalError::NonBooleanCondition("missing"))
        );
    }

    #[test]
    fn test_string_concat_and_index() {
        assert_eq!(
            eval_body(r#"s * "_32""#, &[("s", Value::from("age"))]).unwrap(),
            Value::from("age_32")
        );
        assert_eq!(
            eval_body("s[1] <= 'M'", &[("s", Value::from("Alice"))]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_broadcast_operators() {
        let xs = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            eval_body("x .- mean(x)", &[("x", xs.clone())]).unwrap(),
            Value::List(vec![Value::Float(-1.0), Value::Float(0.0), Value::Float(1.0)])
        );
        assert!(matches!(
            eval_body("x - 1", &[("x", xs)]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_broadcast_call_over_list() {
        let names = Value::List(vec![Value::from("Age"), Value::from("Fare")]);
        assert_eq!(
            eval_body(r#"lowercase.(n) .* "_32""#, &[("n", names)]).unwrap(),
            Value::List(vec![Value::from("age_32"), Value::from("fare_32")])
        );
    }

    #[test]
    fn test_block_helpers_and_destructuring() {
        let value = eval_body(
            r#"begin
                a, b, rest... = split("x y z w")
                a * b * join(rest)
            end"#,
            &[],
        )
        .unwrap();
        assert_eq!(value, Value::from("xyzw"));
    }

    #[test]
    fn test_destructure_too_short() {
        assert_eq!(
            eval_body(r#"begin a, b = split("x") end"#, &[]),
            Err(EvalError::DestructureMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_index_bounds() {
        let xs = Value::List(vec![Value::Int(1)]);
        assert_eq!(
            eval_body("x[2]", &[("x", xs)]),
            Err(EvalError::IndexOutOfBounds { index: 2, len: 1 })
        );
    }

    #[test]
    fn test_matrix_literal_and_grid_index() {
        assert_eq!(eval_body("[1 2; 3 4][2, 1]", &[]).unwrap(), Value::Int(3));
        assert_eq!(eval_body("[1 2; 3 4][2]", &[]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(
            eval_body(r#"x > 1 ? "big" : "small""#, &[("x", Value::Int(2))]).unwrap(),
            Value::from("big")
        );
    }

    #[test]
    fn test_column_reference_in_body_is_unbound() {
        assert!(matches!(
            eval_body(":x + 1", &[]),
            Err(EvalError::UnboundColumnReference(_))
        ));
    }

    #[test]
    fn test_selector_mode_builds_specifiers() {
        let registry = FunctionRegistry::default();
        let scope = Scope::new();
        let evaluator = Evaluator::new(&registry, Mode::Selector { scope: &scope });
        let value = evaluator
            .eval(&parse_expr("[:a, $2]").unwrap(), &mut Env::new())
            .unwrap();
        let spec = ColumnSpec::try_from(value).unwrap();
        let schema = TableSchema::from_names("t", ["a", "b"]);
        assert_eq!(spec.resolve(&schema).unwrap().names, vec!["a", "b"]);

        let real = evaluator.eval(&Expr::ident("Real"), &mut Env::new()).unwrap();
        assert!(matches!(real, Value::Spec(ColumnSpec::TypeFilter { .. })));
    }
}
