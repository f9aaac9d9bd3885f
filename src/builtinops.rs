//! Built-in operations registry.
//!
//! Every operator is defined once in [`BUILTIN_OPS`] under a primary id plus
//! optional aliases, and [`crate::evaluator::create_global_env`] binds each name to a
//! native callable. Nothing here is special-cased by the evaluator: a script can
//! rebind `<` and list comparison will pick the new definition up.
//!
//! ```text
//! (+ 1 2 3)          ; 6, all integers
//! (+ 1 2.5)          ; 3.5, integers widen to float
//! (- 10 3 2)         ; 5, strict left fold
//! (< "a" "b")        ; true
//! (<? nil 1)         ; false, option variants never fail on nil
//! (cmp '(1 2) '(1))  ; 1
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `not`, `list`)
//! - **Special Forms**: Control evaluation of arguments (e.g., `if`, `let`, `or`)
//!
//! ## Operand coercion
//!
//! Operands are read with the same combinators the binder uses, over a cursor of
//! evaluated values. Arithmetic first tries to read every operand as an integer,
//! then every operand as a number; the error of the last attempt names the first
//! operand that is not a number. Integer arithmetic is checked: overflow and
//! division by zero are errors rather than wrapping or panicking.

use crate::ast::{IntType, Value};
use crate::combinator::{
    Cursor, Fail, PResult, any, eof, many_till, map, pair, satisfy_map, terminated,
};
use crate::environment::{Binding, Environment};
use crate::evaluator::{
    apply, eval_and, eval_if, eval_lambda, eval_let, eval_or, eval_quote, eval_set, eval_var,
};
use crate::{Arity, Error, OperandKind};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

/// Signature shared by every builtin. Functions receive evaluated arguments,
/// special forms the unevaluated expressions.
pub type BuiltinFn = fn(&mut Environment, &[Value]) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone, Copy)]
pub enum OpKind {
    Function(BuiltinFn),
    SpecialForm(BuiltinFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    /// Primary name
    pub id: &'static str,
    /// Further names bound to the same operation
    pub aliases: &'static [&'static str],
    pub kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.kind, OpKind::SpecialForm(_))
    }

    /// The primary id followed by the aliases
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.id).chain(self.aliases.iter().copied())
    }

    /// Invoke with unevaluated argument expressions
    pub fn call(&self, env: &mut Environment, exprs: &[Value]) -> Result<Value, Error> {
        match self.kind {
            OpKind::Function(func) => {
                let args = crate::evaluator::eval_args(exprs, env)?;
                self.arity.validate(args.len())?;
                func(env, &args)
            }
            OpKind::SpecialForm(form) => {
                self.arity.validate(exprs.len())?;
                form(env, exprs)
            }
        }
    }
}

//
// Operand coercion
//

type Args<'a> = Cursor<'a, Value>;
type OResult<'a, O> = PResult<Args<'a>, O, Error>;

fn integer<'a>(input: Args<'a>) -> OResult<'a, IntType> {
    satisfy_map(|v: &'a Value| match v {
        Value::Int(n) => Ok(*n),
        other => Err(Error::operand(OperandKind::Integer, other)),
    })(input)
}

/// Integers are widened
fn number<'a>(input: Args<'a>) -> OResult<'a, f64> {
    satisfy_map(|v: &'a Value| match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(Error::operand(OperandKind::Number, other)),
    })(input)
}

fn string<'a>(input: Args<'a>) -> OResult<'a, &'a str> {
    satisfy_map(|v: &'a Value| match v {
        Value::String(s) => Ok(s.as_str()),
        other => Err(Error::operand(OperandKind::String, other)),
    })(input)
}

fn time<'a>(input: Args<'a>) -> OResult<'a, SystemTime> {
    satisfy_map(|v: &'a Value| match v {
        Value::Time(t) => Ok(*t),
        other => Err(Error::operand(OperandKind::Time, other)),
    })(input)
}

fn duration<'a>(input: Args<'a>) -> OResult<'a, Duration> {
    satisfy_map(|v: &'a Value| match v {
        Value::Duration(d) => Ok(*d),
        other => Err(Error::operand(OperandKind::Duration, other)),
    })(input)
}

fn list<'a>(input: Args<'a>) -> OResult<'a, &'a [Value]> {
    satisfy_map(|v: &'a Value| match v {
        Value::List(items) => Ok(items.as_slice()),
        other => Err(Error::operand(OperandKind::List, other)),
    })(input)
}

fn run_parser<'a, O>(
    parser: impl Fn(Args<'a>) -> OResult<'a, O>,
    args: &'a [Value],
) -> Result<O, Error> {
    parser(Cursor::new(args))
        .map(|(_, out)| out)
        .map_err(Fail::into_inner)
}

//
// Arithmetic
//

enum Operands {
    Ints(Vec<IntType>),
    Floats(Vec<f64>),
}

fn numeric_operands(args: &[Value]) -> Result<Operands, Error> {
    let ints = map(many_till(integer, eof), Operands::Ints);
    let floats = map(many_till(number, eof), Operands::Floats);
    run_parser(crate::choice!(ints, floats), args)
}

/// Left fold; `identity` answers an empty operand list
fn arithmetic(
    args: &[Value],
    identity: Option<IntType>,
    int_op: fn(IntType, IntType) -> Result<IntType, Error>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    match numeric_operands(args)? {
        Operands::Ints(ints) => {
            let mut iter = ints.into_iter();
            let first = match (iter.next(), identity) {
                (Some(first), _) => first,
                (None, Some(identity)) => return Ok(Value::Int(identity)),
                (None, None) => return Err(Error::arity_error(Arity::AtLeast(1), 0)),
            };
            iter.try_fold(first, int_op).map(Value::Int)
        }
        Operands::Floats(floats) => {
            let mut iter = floats.into_iter();
            let first = iter.next().unwrap_or_default();
            Ok(Value::Float(iter.fold(first, float_op)))
        }
    }
}

fn overflow(op: &str) -> Error {
    Error::EvalError(format!("Integer overflow in {op}"))
}

fn builtin_add(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    arithmetic(
        args,
        Some(0),
        |a, b| a.checked_add(b).ok_or_else(|| overflow("+")),
        |a, b| a + b,
    )
}

fn builtin_sub(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    arithmetic(
        args,
        None,
        |a, b| a.checked_sub(b).ok_or_else(|| overflow("-")),
        |a, b| a - b,
    )
}

fn builtin_mul(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    arithmetic(
        args,
        Some(1),
        |a, b| a.checked_mul(b).ok_or_else(|| overflow("*")),
        |a, b| a * b,
    )
}

fn builtin_div(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    arithmetic(
        args,
        None,
        |a, b| {
            if b == 0 {
                Err(Error::EvalError("division by zero".to_owned()))
            } else {
                a.checked_div(b).ok_or_else(|| overflow("/"))
            }
        },
        |a, b| a / b,
    )
}

//
// Comparison
//

/// Both operands read as the same comparable kind, in priority order
enum Comparable<'a> {
    Ints(IntType, IntType),
    Numbers(f64, f64),
    Strings(&'a str, &'a str),
    Times(SystemTime, SystemTime),
    Durations(Duration, Duration),
    Lists(&'a [Value], &'a [Value]),
}

fn comparable(operands: &[Value]) -> Result<Comparable<'_>, Error> {
    run_parser(
        terminated(
            crate::choice!(
                map(pair(integer, integer), |(a, b)| Comparable::Ints(a, b)),
                map(pair(number, number), |(a, b)| Comparable::Numbers(a, b)),
                map(pair(string, string), |(a, b)| Comparable::Strings(a, b)),
                map(pair(time, time), |(a, b)| Comparable::Times(a, b)),
                map(pair(duration, duration), |(a, b)| Comparable::Durations(a, b)),
                map(pair(list, list), |(a, b)| Comparable::Lists(a, b)),
            ),
            eof,
        ),
        operands,
    )
}

/// Exactly two operands, checked like any other signature
fn two(args: &[Value]) -> Result<(&Value, &Value), Error> {
    run_parser(terminated(pair(any, any), eof), args)
}

/// The strict less-than. List elements are compared with whatever `comparator`
/// is bound to in `env`, falling back to this function when it is unbound.
fn less(
    env: &mut Environment,
    comparator: &str,
    left: &Value,
    right: &Value,
) -> Result<bool, Error> {
    let operands = [left.clone(), right.clone()];
    let ordered = comparable(&operands)
        .map_err(|_| Error::TypeError(format!("Cannot compare {left} and {right}")))?;
    match ordered {
        Comparable::Ints(a, b) => Ok(a < b),
        Comparable::Numbers(a, b) => Ok(a < b),
        Comparable::Strings(a, b) => Ok(a < b),
        Comparable::Times(a, b) => Ok(a < b),
        Comparable::Durations(a, b) => Ok(a < b),
        Comparable::Lists(a, b) => {
            for (x, y) in a.iter().zip(b) {
                if element_less(env, comparator, x, y)? {
                    return Ok(true);
                }
                if element_less(env, comparator, y, x)? {
                    return Ok(false);
                }
            }
            Ok(a.len() < b.len())
        }
    }
}

fn element_less(
    env: &mut Environment,
    comparator: &str,
    left: &Value,
    right: &Value,
) -> Result<bool, Error> {
    let bound = match env.lookup(comparator) {
        Some(Binding::Value(value)) => Some(value),
        Some(Binding::Var(handle)) => env.var(handle).cloned(),
        _ => None,
    };
    let bound = match bound {
        Some(callable) if callable.is_callable() => callable,
        _ if is_option(comparator) && (left.is_nil() || right.is_nil()) => return Ok(false),
        _ => return less(env, comparator, left, right),
    };
    match apply(&bound, &[left.clone(), right.clone()], env)? {
        Value::Bool(b) => Ok(b),
        other => Err(Error::TypeError(format!(
            "{comparator} must return a boolean, got {other}"
        ))),
    }
}

fn is_option(comparator: &str) -> bool {
    comparator.ends_with('?')
}

/// Shared body of the ordering operators: `swap` compares the operands in
/// reverse, `or_equal` also accepts structurally equal operands.
fn compare(
    env: &mut Environment,
    args: &[Value],
    comparator: &str,
    swap: bool,
    or_equal: bool,
) -> Result<Value, Error> {
    let (a, b) = two(args)?;
    if is_option(comparator) && (a.is_nil() || b.is_nil()) {
        return Ok(Value::Bool(false));
    }
    if or_equal && a == b {
        return Ok(Value::Bool(true));
    }
    let (x, y) = if swap { (b, a) } else { (a, b) };
    less(env, comparator, x, y).map(Value::Bool)
}

macro_rules! comparison_op {
    ($name:ident, $comparator:literal, swap: $swap:literal, or_equal: $or_equal:literal) => {
        fn $name(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
            compare(env, args, $comparator, $swap, $or_equal)
        }
    };
}

comparison_op!(builtin_less, "<", swap: false, or_equal: false);
comparison_op!(builtin_less_opt, "<?", swap: false, or_equal: false);
comparison_op!(builtin_le, "<", swap: false, or_equal: true);
comparison_op!(builtin_le_opt, "<?", swap: false, or_equal: true);
comparison_op!(builtin_gt, "<", swap: true, or_equal: false);
comparison_op!(builtin_gt_opt, "<?", swap: true, or_equal: false);
comparison_op!(builtin_ge, "<", swap: true, or_equal: true);
comparison_op!(builtin_ge_opt, "<?", swap: true, or_equal: true);

fn equal(args: &[Value]) -> bool {
    args.windows(2).all(|pair| pair[0] == pair[1])
}

fn any_nil(args: &[Value]) -> bool {
    args.iter().any(Value::is_nil)
}

fn builtin_equal(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(equal(args)))
}

fn builtin_equal_opt(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!any_nil(args) && equal(args)))
}

fn builtin_not_equal(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!equal(args)))
}

fn builtin_not_equal_opt(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!any_nil(args) && !equal(args)))
}

fn builtin_cmp(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    let (a, b) = two(args)?;
    let undefined = || Error::ComparisonUndefined {
        left: a.clone(),
        right: b.clone(),
    };
    let order = match (less(env, "<", a, b), less(env, "<", b, a)) {
        (Ok(true), _) => Ordering::Less,
        (_, Ok(true)) => Ordering::Greater,
        _ if a == b => Ordering::Equal,
        (Err(Error::TypeError(_)), _) | (Ok(false), Ok(false)) => return Err(undefined()),
        (Err(err), _) | (_, Err(err)) => return Err(err),
    };
    Ok(Value::Int(match order {
        Ordering::Less => -1,
        Ordering::Greater => 1,
        Ordering::Equal => 0,
    }))
}

//
// Plain functions
//

fn builtin_not(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Bool(b)] => Ok(Value::Bool(!b)),
        [other] => Err(Error::operand(OperandKind::Boolean, other)),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_list(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

/// Global registry of all built-in operations
pub static BUILTIN_OPS: &[BuiltinOp] = &[
    // Arithmetic operations
    BuiltinOp {
        id: "+",
        aliases: &["add"],
        kind: OpKind::Function(builtin_add),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "-",
        aliases: &["sub"],
        kind: OpKind::Function(builtin_sub),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "*",
        aliases: &["mul"],
        kind: OpKind::Function(builtin_mul),
        arity: Arity::Any,
    },
    BuiltinOp {
        id: "/",
        aliases: &["div"],
        kind: OpKind::Function(builtin_div),
        arity: Arity::AtLeast(1),
    },
    // Comparison operations
    BuiltinOp {
        id: "<",
        aliases: &["less"],
        kind: OpKind::Function(builtin_less),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "<?",
        aliases: &[],
        kind: OpKind::Function(builtin_less_opt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "<=",
        aliases: &[],
        kind: OpKind::Function(builtin_le),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "<=?",
        aliases: &[],
        kind: OpKind::Function(builtin_le_opt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: ">",
        aliases: &[],
        kind: OpKind::Function(builtin_gt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: ">?",
        aliases: &[],
        kind: OpKind::Function(builtin_gt_opt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: ">=",
        aliases: &[],
        kind: OpKind::Function(builtin_ge),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: ">=?",
        aliases: &[],
        kind: OpKind::Function(builtin_ge_opt),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "==",
        aliases: &["equal"],
        kind: OpKind::Function(builtin_equal),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "==?",
        aliases: &[],
        kind: OpKind::Function(builtin_equal_opt),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "!=",
        aliases: &[],
        kind: OpKind::Function(builtin_not_equal),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "!=?",
        aliases: &[],
        kind: OpKind::Function(builtin_not_equal_opt),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "cmp",
        aliases: &[],
        kind: OpKind::Function(builtin_cmp),
        arity: Arity::Exact(2),
    },
    // Logic and lists
    BuiltinOp {
        id: "not",
        aliases: &[],
        kind: OpKind::Function(builtin_not),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "list",
        aliases: &[],
        kind: OpKind::Function(builtin_list),
        arity: Arity::Any,
    },
    // Special forms
    BuiltinOp {
        id: "quote",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_quote),
        arity: Arity::Exact(1),
    },
    BuiltinOp {
        id: "lambda",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_lambda),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "let",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_let),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "var",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_var),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "set",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_set),
        arity: Arity::Exact(2),
    },
    BuiltinOp {
        id: "if",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_if),
        arity: Arity::AtLeast(2),
    },
    BuiltinOp {
        id: "and",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_and),
        arity: Arity::AtLeast(1),
    },
    BuiltinOp {
        id: "or",
        aliases: &[],
        kind: OpKind::SpecialForm(eval_or),
        arity: Arity::AtLeast(1),
    },
];

/// Lazy static map from every name and alias to its BuiltinOp
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        BUILTIN_OPS
            .iter()
            .flat_map(|op| op.names().map(move |name| (name, op)))
            .collect()
    });

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin operation by id or alias
pub fn find_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}
