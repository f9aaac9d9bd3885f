//! This module defines the closed value model shared by the reader, the evaluator and
//! native callables. The main enum, [`Value`], covers literal data (numbers, strings,
//! characters, booleans, nil), syntax (atoms, lists, quotes), callables (lambdas, native
//! functions, deferred tasks) and opaque host data (time instants, durations, host
//! objects). Ergonomic helper functions such as [`val`], [`atom`] and [`nil`] are
//! provided for convenient AST construction in both code and tests. Equality is deep and
//! structural; display output for data values is re-readable source text.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crate::Error;
use crate::closure::Lambda;
use crate::environment::Environment;
use crate::types::TypeDescriptor;

/// Type alias for integer values in the interpreter
pub(crate) type IntType = i64;

/// Signature of every native callable: the calling environment plus the unevaluated
/// argument expressions. The callable decides what to evaluate and in which order.
pub type NativeFn = dyn Fn(&mut Environment, &[Value]) -> Result<Value, Error> + Send + Sync;

/// Body of a deferred computation, run when an atom bound to it is looked up
pub type DeferredFn = dyn Fn(&mut Environment) -> Result<Value, Error> + Send + Sync;

/// A named, optionally typed symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub name: String,
    pub ty: TypeDescriptor,
}

impl Atom {
    /// Atom without annotation, typed `any`
    pub fn new(name: impl Into<String>) -> Self {
        Atom {
            name: name.into(),
            ty: TypeDescriptor::any(),
        }
    }

    pub fn typed(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Atom {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty == TypeDescriptor::any() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}::{}", self.name, self.ty)
        }
    }
}

/// Implemented by opaque host values that scripts may pass around
pub trait HostObject: fmt::Debug + Send + Sync {
    /// Name used by user type aliases to match this value
    fn type_name(&self) -> &str;
}

/// Shared handle to a host object; equal only to itself
#[derive(Clone, Debug)]
pub struct HostValue(Arc<dyn HostObject>);

impl HostValue {
    pub fn new(object: Arc<dyn HostObject>) -> Self {
        HostValue(object)
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn object(&self) -> &Arc<dyn HostObject> {
        &self.0
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A native callable. Uses the id string for equality instead of the function pointer.
#[derive(Clone)]
pub struct NativeFunction {
    pub id: String,
    pub func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(id: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Environment, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        NativeFunction {
            id: id.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, env: &mut Environment, args: &[Value]) -> Result<Value, Error> {
        (self.func)(env, args)
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// A zero-argument computation returned by natives in place of a value
#[derive(Clone)]
pub struct DeferredTask {
    pub id: u64,
    run: Arc<DeferredFn>,
}

impl DeferredTask {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut Environment) -> Result<Value, Error> + Send + Sync + 'static,
    {
        DeferredTask {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            run: Arc::new(run),
        }
    }

    pub fn force(&self, env: &mut Environment) -> Result<Value, Error> {
        tracing::trace!(task = self.id, "forcing deferred task");
        (self.run)(env)
    }
}

/// Core value type of the interpreter
///
/// To build an AST, use the ergonomic helper functions:
/// - `val(42)` for values, `atom("name")` for atoms, `nil()` for nil
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![atom("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    Int(IntType),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
    /// The absent value; distinct from the empty list
    Nil,
    Atom(Atom),
    /// Ordered sequence; the empty list is a valid terminal value
    List(Vec<Value>),
    /// Wraps one unevaluated node
    Quote(Box<Value>),
    Lambda(Arc<Lambda>),
    Deferred(DeferredTask),
    Native(NativeFunction),
    Time(SystemTime),
    Duration(Duration),
    Host(HostValue),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Char(c) => write!(f, "Char({c:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Nil => write!(f, "Nil"),
            Value::Atom(a) => write!(f, "Atom({a})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Quote(inner) => write!(f, "Quote({inner:?})"),
            Value::Lambda(lambda) => write!(f, "Lambda({})", lambda.signature),
            Value::Deferred(task) => write!(f, "Deferred({})", task.id),
            Value::Native(native) => write!(f, "Native({})", native.id),
            Value::Time(t) => write!(f, "Time({t:?})"),
            Value::Duration(d) => write!(f, "Duration({d:?})"),
            Value::Host(h) => write!(f, "Host({:?})", h.object()),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<SystemTime> for Value {
    fn from(t: SystemTime) -> Self {
        Value::Time(t)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<Atom> for Value {
    fn from(a: Atom) -> Self {
        Value::Atom(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

macro_rules! impl_from_integer {
    ($($int_type:ty),*) => {
        $(
            impl From<$int_type> for Value {
                fn from(n: $int_type) -> Self {
                    Value::Int(IntType::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, IntType, u8, u16, u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(Into::into).collect())
    }
}

/// Helper function for creating untyped atoms - works great in mixed lists!
pub fn atom<S: AsRef<str>>(name: S) -> Value {
    Value::Atom(Atom::new(name.as_ref()))
}

/// Helper function for creating Values - works great in mixed lists!
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

pub fn nil() -> Value {
    Value::Nil
}

pub fn quote(inner: Value) -> Value {
    Value::Quote(Box::new(inner))
}

fn write_escaped(f: &mut fmt::Formatter<'_>, ch: char, delimiter: char) -> fmt::Result {
    match ch {
        '\\' => write!(f, "\\\\"),
        '\n' => write!(f, "\\n"),
        '\t' => write!(f, "\\t"),
        '\r' => write!(f, "\\r"),
        c if c == delimiter => write!(f, "\\{c}"),
        c => write!(f, "{c}"),
    }
}

/// Finite floats print in a form the reader accepts (`1.0e20`, not `1e20`).
/// `inf` and `NaN` have no literal syntax and print as Rust does.
fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    let text = format!("{n:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            write!(f, "{mantissa}.0e{exponent}")
        }
        _ => f.write_str(&text),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write_float(f, *n),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => {
                write!(f, "'")?;
                write_escaped(f, *c, '\'')?;
                write!(f, "'")
            }
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    write_escaped(f, ch, '"')?;
                }
                write!(f, "\"")
            }
            Value::Nil => write!(f, "nil"),
            Value::Atom(a) => write!(f, "{a}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Quote(inner) => write!(f, "'{inner}"),
            Value::Lambda(_) => write!(f, "#<lambda>"),
            Value::Deferred(task) => write!(f, "#<task:{}>", task.id),
            Value::Native(native) => write!(f, "#<native:{}>", native.id),
            Value::Time(t) => match t.duration_since(SystemTime::UNIX_EPOCH) {
                Ok(since) => write!(f, "#<time:{}.{:09}>", since.as_secs(), since.subsec_nanos()),
                Err(_) => write!(f, "#<time:pre-epoch>"),
            },
            Value::Duration(d) => write!(f, "#<duration:{d:?}>"),
            Value::Host(h) => write!(f, "#<{}>", h.type_name()),
        }
    }
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub(crate) fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Lambda(_) | Value::Native(_) | Value::Deferred(_)
        )
    }

    /// Short kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Nil => "nil",
            Value::Atom(_) => "atom",
            Value::List(_) => "list",
            Value::Quote(_) => "quote",
            Value::Lambda(_) => "lambda",
            Value::Deferred(_) => "task",
            Value::Native(_) => "native",
            Value::Time(_) => "time",
            Value::Duration(_) => "duration",
            Value::Host(_) => "host",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Quote(a), Value::Quote(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            (Value::Deferred(a), Value::Deferred(b)) => a.id == b.id,
            (Value::Native(a), Value::Native(b)) => a.id == b.id,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false, // Different variants are never equal
        }
    }
}
