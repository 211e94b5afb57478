//! Tree-walking interpreter for calc statements.

use std::cmp::Ordering;

use litpro_core::{Environment, Value};

use super::ast::{BinOp, Expr, Stmt};

/// Runtime failure, without location; the evaluator attaches the line.
pub type RunResult<T> = Result<T, String>;

/// Upper bound on elements (or string bytes) a single operation may produce.
const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// Executes statements against an environment, collecting printed output.
pub struct Interpreter {
    env: Environment,
    output: String,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            output: String::new(),
        }
    }

    pub fn exec(&mut self, stmt: &Stmt) -> RunResult<()> {
        match stmt {
            Stmt::Assign(name, expr) => {
                let value = self.eval(expr)?;
                self.env.set(name.as_str(), value);
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    /// Finish, returning printed output and the resulting environment.
    pub fn finish(self) -> (String, Environment) {
        (self.output, self.env)
    }

    fn eval(&mut self, expr: &Expr) -> RunResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| format!("name '{}' is not defined", name)),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<RunResult<Vec<_>>>()
                .map(Value::List),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow".to_string()),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => Err(format!("bad operand type for unary -: '{}'", other.type_name())),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.is_truthy())),
            Expr::And(lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.is_truthy() { self.eval(rhs) } else { Ok(left) }
            }
            Expr::Or(lhs, rhs) => {
                let left = self.eval(lhs)?;
                if left.is_truthy() { Ok(left) } else { self.eval(rhs) }
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                binary(*op, left, right)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(&target, &index)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<RunResult<Vec<_>>>()?;
                self.call(name, args)
            }
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> RunResult<Value> {
        match name {
            "print" => {
                let parts: Vec<String> = args.iter().map(Value::to_string).collect();
                self.output.push_str(&parts.join(" "));
                self.output.push('\n');
                Ok(Value::Null)
            }
            "len" => {
                let [arg] = exactly::<1>(name, args)?;
                let len = match &arg {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.len(),
                    Value::Map(entries) => entries.len(),
                    other => return Err(format!("object of type '{}' has no len()", other.type_name())),
                };
                Ok(Value::Int(len as i64))
            }
            "str" => {
                let [arg] = exactly::<1>(name, args)?;
                Ok(Value::Str(arg.to_string()))
            }
            "int" => {
                let [arg] = exactly::<1>(name, args)?;
                match arg {
                    Value::Int(n) => Ok(Value::Int(n)),
                    Value::Bool(b) => Ok(Value::Int(b as i64)),
                    Value::Float(x) if x.is_finite() && x.abs() < 9.2e18 => Ok(Value::Int(x.trunc() as i64)),
                    Value::Float(x) => Err(format!("cannot convert float {} to int", x)),
                    Value::Str(s) => s
                        .trim()
                        .parse()
                        .map(Value::Int)
                        .map_err(|_| format!("invalid literal for int(): '{}'", s)),
                    other => Err(format!("int() argument must be a number or string, not '{}'", other.type_name())),
                }
            }
            "float" => {
                let [arg] = exactly::<1>(name, args)?;
                match arg {
                    Value::Str(s) => s
                        .trim()
                        .parse()
                        .map(Value::Float)
                        .map_err(|_| format!("could not convert string to float: '{}'", s)),
                    Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
                    other => as_float(&other)
                        .map(Value::Float)
                        .ok_or_else(|| format!("float() argument must be a number or string, not '{}'", other.type_name())),
                }
            }
            "abs" => {
                let [arg] = exactly::<1>(name, args)?;
                match arg {
                    Value::Int(n) => n
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| "integer overflow".to_string()),
                    Value::Float(x) => Ok(Value::Float(x.abs())),
                    other => Err(format!("bad operand type for abs(): '{}'", other.type_name())),
                }
            }
            "min" | "max" => {
                let items = spread(name, args)?;
                let want = if name == "min" { Ordering::Less } else { Ordering::Greater };
                let mut best: Option<Value> = None;
                for item in items {
                    best = Some(match best {
                        None => item,
                        Some(current) => {
                            if compare(&item, &current)? == want { item } else { current }
                        }
                    });
                }
                best.ok_or_else(|| format!("{}() arg is an empty sequence", name))
            }
            "sum" => {
                let [arg] = exactly::<1>(name, args)?;
                let items = match arg {
                    Value::List(items) => items,
                    other => return Err(format!("sum() expects a list, not '{}'", other.type_name())),
                };
                items
                    .into_iter()
                    .try_fold(Value::Int(0), |acc, item| binary(BinOp::Add, acc, item))
            }
            "range" => range(args),
            _ => Err(format!("name '{}' is not defined", name)),
        }
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> RunResult<[Value; N]> {
    let count = args.len();
    args.try_into().map_err(|_| {
        format!("{}() takes exactly {} argument{} ({} given)", name, N, if N == 1 { "" } else { "s" }, count)
    })
}

/// `min(list)` or `min(a, b, ...)`.
fn spread(name: &str, args: Vec<Value>) -> RunResult<Vec<Value>> {
    match args.len() {
        0 => Err(format!("{}() expects at least one argument", name)),
        1 => match args.into_iter().next() {
            Some(Value::List(items)) => Ok(items),
            Some(other) => Err(format!("'{}' object is not iterable", other.type_name())),
            None => Ok(Vec::new()),
        },
        _ => Ok(args),
    }
}

fn range(args: Vec<Value>) -> RunResult<Value> {
    let ints = args
        .iter()
        .map(|arg| match arg {
            Value::Int(n) => Ok(*n),
            other => Err(format!("range() arguments must be int, not '{}'", other.type_name())),
        })
        .collect::<RunResult<Vec<i64>>>()?;

    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(format!("range() takes 1 to 3 arguments ({} given)", ints.len())),
    };
    if step == 0 {
        return Err("range() step must not be zero".to_string());
    }
    let (span, stride) = if step > 0 {
        (stop as i128 - start as i128, step as i128)
    } else {
        (start as i128 - stop as i128, -(step as i128))
    };
    let len = (span.max(0) + stride - 1) / stride;
    if len > MAX_SEQUENCE_LEN as i128 {
        return Err("range() too large".to_string());
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> RunResult<Value> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(equals(&left, &right))),
        BinOp::Ne => return Ok(Value::Bool(!equals(&left, &right))),
        BinOp::Lt => return Ok(Value::Bool(compare(&left, &right)? == Ordering::Less)),
        BinOp::Le => return Ok(Value::Bool(compare(&left, &right)? != Ordering::Greater)),
        BinOp::Gt => return Ok(Value::Bool(compare(&left, &right)? == Ordering::Greater)),
        BinOp::Ge => return Ok(Value::Bool(compare(&left, &right)? != Ordering::Less)),
        _ => {}
    }

    let unsupported = || {
        format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )
    };

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (Value::Str(s), Value::Int(n)) if op == BinOp::Mul => {
            let count = usize::try_from((*n).max(0)).unwrap_or(usize::MAX);
            match s.len().checked_mul(count) {
                Some(len) if len <= MAX_SEQUENCE_LEN => Ok(Value::Str(s.repeat(count))),
                _ => Err("string repetition too large".to_string()),
            }
        }
        _ => match (as_float(&left), as_float(&right)) {
            (Some(a), Some(b)) => float_arith(op, a, b),
            _ => Err(unsupported()),
        },
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> RunResult<Value> {
    let overflow = || "integer overflow".to_string();
    match op {
        BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Div => {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::FloorDiv | BinOp::Mod => {
            if b == 0 {
                return Err("integer division or modulo by zero".to_string());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a - q * b;
            // Round toward negative infinity, so the remainder takes the divisor's sign.
            let (q, r) = if r != 0 && ((r < 0) != (b < 0)) { (q - 1, r + b) } else { (q, r) };
            Ok(Value::Int(if op == BinOp::FloorDiv { q } else { r }))
        }
        _ => float_arith(op, a as f64, b as f64),
    }
}

fn float_arith(op: BinOp, a: f64, b: f64) -> RunResult<Value> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => {
            return Err("float division by zero".to_string());
        }
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a - b * (a / b).floor(),
        _ => return Err(format!("unsupported operator {}", op.symbol())),
    };
    Ok(Value::Float(result))
}

fn equals(left: &Value, right: &Value) -> bool {
    match (as_float(left), as_float(right)) {
        (Some(a), Some(b)) if !matches!((left, right), (Value::Int(_), Value::Int(_))) => a == b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> RunResult<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| "cannot compare NaN".to_string()),
            _ => Err(format!(
                "'<' not supported between '{}' and '{}'",
                left.type_name(),
                right.type_name()
            )),
        },
    }
}

fn subscript(target: &Value, index: &Value) -> RunResult<Value> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => {
            resolve_index(*i, items.len()).map(|i| items[i].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len()).map(|i| Value::Str(chars[i].to_string()))
        }
        (Value::Map(entries), Value::Str(key)) => entries
            .get(key)
            .cloned()
            .ok_or_else(|| format!("key '{}' not found", key)),
        _ => Err(format!(
            "'{}' cannot be indexed by '{}'",
            target.type_name(),
            index.type_name()
        )),
    }
}

/// Map a possibly negative index onto `0..len`.
fn resolve_index(index: i64, len: usize) -> RunResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err("index out of range".to_string());
    }
    Ok(resolved as usize)
}
