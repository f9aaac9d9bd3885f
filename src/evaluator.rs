use crate::ast::{Value, quote};
use crate::binder::Signature;
use crate::builtinops::get_builtin_ops;
use crate::closure::Lambda;
use crate::environment::{Binding, Environment};
use crate::reader::Reader;
use crate::{Arity, Error, OperandKind};
use std::sync::Arc;

/// Evaluate an expression in `env`.
///
/// Atoms are looked up, quotes unwrap, lists are applications. Every other
/// value (literals, nil, the empty list, callables, host data) evaluates to
/// itself.
pub fn eval(expr: &Value, env: &mut Environment) -> Result<Value, Error> {
    env.enter()?;
    let result = eval_expr(expr, env);
    env.leave();
    result
}

fn eval_expr(expr: &Value, env: &mut Environment) -> Result<Value, Error> {
    match expr {
        Value::Atom(atom) => lookup(&atom.name, env),
        Value::Quote(inner) => Ok((**inner).clone()),
        Value::List(elements) if !elements.is_empty() => {
            eval_list(elements, env).map_err(|err| add_context(err, expr))
        }
        _ => Ok(expr.clone()),
    }
}

/// Resolve a name to a value: Vars are dereferenced and deferred tasks run
fn lookup(name: &str, env: &mut Environment) -> Result<Value, Error> {
    match env.lookup(name) {
        Some(Binding::Value(Value::Deferred(task))) => task.force(env),
        Some(Binding::Value(value)) => Ok(value),
        Some(Binding::Var(handle)) => env
            .var(handle)
            .cloned()
            .ok_or_else(|| Error::EvalError(format!("Var {name} is no longer live"))),
        Some(Binding::Type(descriptor)) => Err(Error::TypeError(format!(
            "{name} names the type {descriptor}, not a value"
        ))),
        Some(Binding::Toolkit(_)) => Err(Error::TypeError(format!(
            "{name} is a toolkit; use {name}.<member>"
        ))),
        None => Err(Error::UnboundName(name.to_owned())),
    }
}

/// Helper function to add expression context to errors
fn add_context(error: Error, expr: &Value) -> Error {
    let context = format!("while evaluating: {expr}");
    match error {
        Error::EvalError(msg) => Error::EvalError(format!("{msg}\n  Context: {context}")),
        Error::TypeError(msg) => Error::TypeError(format!("{msg}\n  Context: {context}")),
        // Parse, binding and arity errors carry their own context
        other => other,
    }
}

/// Evaluate argument expressions left to right
pub(crate) fn eval_args(args: &[Value], env: &mut Environment) -> Result<Vec<Value>, Error> {
    args.iter().map(|arg| eval(arg, env)).collect()
}

/// Evaluate a sequence, returning the last value (nil when empty)
fn eval_sequence(exprs: &[Value], env: &mut Environment) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in exprs {
        result = eval(expr, env)?;
    }
    Ok(result)
}

/// A list is an application: the head yields a callable which receives the
/// remaining elements unevaluated
fn eval_list(elements: &[Value], env: &mut Environment) -> Result<Value, Error> {
    let Some((head, args)) = elements.split_first() else {
        return Ok(Value::List(Vec::new()));
    };

    // a deferred task in head position is called, not forced by the lookup
    let callee = match head {
        Value::Atom(atom) => match env.lookup(&atom.name) {
            Some(Binding::Value(task @ Value::Deferred(_))) => task,
            _ => eval(head, env)?,
        },
        _ => eval(head, env)?,
    };

    match &callee {
        Value::Native(native) => {
            let result = native.call(env, args)?;
            force(result, env)
        }
        Value::Lambda(lambda) => {
            let actuals = eval_args(args, env)?;
            lambda.call(env, &actuals)
        }
        Value::Deferred(task) if args.is_empty() => task.force(env),
        Value::Deferred(_) => Err(Error::arity_error_with_expr(
            Arity::Exact(0),
            args.len(),
            head.to_string(),
        )),
        _ => Err(Error::TypeError(format!(
            "Cannot apply non-function: {callee}"
        ))),
    }
}

/// Natives may hand back a deferred task instead of a value
fn force(value: Value, env: &mut Environment) -> Result<Value, Error> {
    match value {
        Value::Deferred(task) => task.force(env),
        other => Ok(other),
    }
}

/// Call a callable with already evaluated arguments. Natives receive them quoted
/// so their own evaluation hands back the values unchanged.
pub(crate) fn apply(callee: &Value, args: &[Value], env: &mut Environment) -> Result<Value, Error> {
    match callee {
        Value::Native(native) => {
            let quoted: Vec<Value> = args.iter().cloned().map(quote).collect();
            let result = native.call(env, &quoted)?;
            force(result, env)
        }
        Value::Lambda(lambda) => lambda.call(env, args),
        Value::Deferred(task) if args.is_empty() => task.force(env),
        other => Err(Error::TypeError(format!(
            "Cannot apply non-function: {other}"
        ))),
    }
}

//
// Special forms. Each receives its argument expressions unevaluated; arity has
// already been checked against the registry entry.
//

/// Evaluate quote special form
pub(crate) fn eval_quote(_env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

/// `(lambda (formals...) body...)`
pub(crate) fn eval_lambda(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    match args {
        [formals, body @ ..] => {
            let signature = Signature::from_value(formals)?;
            let lambda = Lambda::build(env, signature, body.to_vec())?;
            Ok(Value::Lambda(Arc::new(lambda)))
        }
        [] => Err(Error::arity_error(Arity::AtLeast(1), 0)),
    }
}

/// `(let ((name value)...) body...)`: sequential bindings, each stored in a Var
/// typed by the name's annotation, inside a frame released afterwards
pub(crate) fn eval_let(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    let [Value::List(bindings), body @ ..] = args else {
        return Err(Error::TypeError(
            "let requires a list of bindings".to_owned(),
        ));
    };

    env.with_frame(|env| {
        for binding in bindings {
            match binding {
                Value::List(pair) => match pair.as_slice() {
                    [Value::Atom(name), init] => {
                        let value = eval(init, env)?;
                        env.define_var(&name.name, name.ty.clone(), value)?;
                    }
                    _ => {
                        return Err(Error::TypeError(format!(
                            "let binding must be (name value), got {binding}"
                        )));
                    }
                },
                other => {
                    return Err(Error::TypeError(format!(
                        "let binding must be (name value), got {other}"
                    )));
                }
            }
        }
        eval_sequence(body, env)
    })
}

/// `(var name)` or `(var name value)`: declare a Var in the current frame.
/// Without a value the Var starts as nil, so its descriptor admits nil.
pub(crate) fn eval_var(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Atom(name)] => {
            env.define_var(&name.name, name.ty.clone().or_nil(), Value::Nil)?;
            Ok(Value::Nil)
        }
        [Value::Atom(name), init] => {
            let value = eval(init, env)?;
            env.define_var(&name.name, name.ty.clone(), value.clone())?;
            Ok(value)
        }
        [_] | [_, _] => Err(Error::TypeError("var requires an atom".to_owned())),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

/// `(set name value)`: assign a Var; its descriptor still applies
pub(crate) fn eval_set(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::Atom(name), expr] => {
            let value = eval(expr, env)?;
            match env.lookup(&name.name) {
                Some(Binding::Var(handle)) => {
                    env.set_var(handle, value.clone())?;
                    Ok(value)
                }
                Some(_) => Err(Error::TypeError(format!(
                    "{} is not a Var",
                    name.name
                ))),
                None => Err(Error::UnboundName(name.name.clone())),
            }
        }
        [_, _] => Err(Error::TypeError("set requires an atom".to_owned())),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

/// `(if condition then else?)`; the condition must be a boolean
pub(crate) fn eval_if(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
    let (condition_expr, then_expr, else_expr) = match args {
        [c, t] => (c, t, None),
        [c, t, e] => (c, t, Some(e)),
        _ => return Err(Error::arity_error(Arity::Exact(3), args.len())),
    };
    match eval(condition_expr, env)? {
        Value::Bool(true) => eval(then_expr, env),
        Value::Bool(false) => else_expr.map_or(Ok(Value::Nil), |e| eval(e, env)),
        other => Err(Error::operand(OperandKind::Boolean, &other)),
    }
}

/// Check if a value is obviously non-boolean (before evaluation)
/// This catches literals, but can't check function call results
fn is_obviously_non_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) | Value::Atom(_) => false,
        Value::List(items) => items.is_empty(),
        _ => true,
    }
}

macro_rules! boolean_logic_op {
    ($name:ident, $short_circuit:literal, $default:literal) => {
        pub(crate) fn $name(env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
            if args.is_empty() {
                return Err(Error::arity_error(Arity::AtLeast(1), 0));
            }

            // First pass: reject literal non-booleans so short-circuiting can't hide them
            if let Some(literal) = args.iter().find(|arg| is_obviously_non_boolean(arg)) {
                return Err(Error::operand(OperandKind::Boolean, literal));
            }

            // Second pass: evaluate and short-circuit
            for arg in args {
                match eval(arg, env)? {
                    Value::Bool($short_circuit) => return Ok(Value::Bool($short_circuit)),
                    Value::Bool(_) => continue,
                    other => return Err(Error::operand(OperandKind::Boolean, &other)),
                }
            }

            Ok(Value::Bool($default))
        }
    };
}

// Generate boolean logic functions
boolean_logic_op!(eval_and, false, true);
boolean_logic_op!(eval_or, true, false);

/// Create a global environment with the built-in operations and, with the `time`
/// feature, the `time` toolkit
pub fn create_global_env() -> Environment {
    let mut env = Environment::new();

    for op in get_builtin_ops() {
        for name in op.names() {
            env.register_native(name, move |env, args| op.call(env, args));
        }
    }

    #[cfg(feature = "time")]
    env.register_toolkit(crate::toolkit::time_toolkit());

    env
}

/// Read a whole program with the extended reader and evaluate each top-level
/// form in order, returning the last value (nil for an empty program).
///
/// ```
/// use kitlisp::{Value, create_global_env, run};
///
/// let mut env = create_global_env();
/// let result = run("(var x::int 4) (set x (* x x)) x", &mut env).unwrap();
/// assert_eq!(result, Value::Int(16));
/// ```
pub fn run(source: &str, env: &mut Environment) -> Result<Value, Error> {
    let program = Reader::extended(env).parse_program(source)?;
    eval_sequence(&program, env)
}
