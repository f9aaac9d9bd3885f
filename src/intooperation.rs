use crate::Error;
use crate::ast::{NativeFunction, Value};
use crate::binder::Signature;
use crate::evaluator::eval_args;
use crate::types::{Kind, TypeDescriptor};
use std::fmt::Display;
use std::time::{Duration, SystemTime};

// =====================================================================
// Parameter conversion
//
// `FromParam` ties a Rust parameter type to the descriptor the binder
// validates the argument against, and converts the admitted value. All
// conversions live here so that the supported parameter types are easy
// to audit.
// =====================================================================

/// A Rust type usable as a parameter of a registered host function
pub trait FromParam: Sized {
    /// Descriptor the argument must satisfy
    fn descriptor() -> TypeDescriptor;

    /// Convert an argument that the descriptor already admitted
    fn from_value(value: Value) -> Result<Self, Error>;
}

macro_rules! impl_from_param {
    ($ty:ty, $kind:expr, $variant:ident) => {
        impl FromParam for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::new($kind)
            }

            fn from_value(value: Value) -> Result<Self, Error> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(Error::TypeError(format!(
                        "expected {}, got {other}",
                        Self::descriptor()
                    ))),
                }
            }
        }
    };
}

impl_from_param!(i64, Kind::Int, Int);
impl_from_param!(f64, Kind::Float, Float);
impl_from_param!(bool, Kind::Bool, Bool);
impl_from_param!(String, Kind::String, String);
impl_from_param!(Vec<Value>, Kind::List, List);
impl_from_param!(SystemTime, Kind::Time, Time);
impl_from_param!(Duration, Kind::Duration, Duration);

/// The raw value, nil included
impl FromParam for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(Kind::Any)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

/// `None` for nil, otherwise the inner conversion
impl<T: FromParam> FromParam for Option<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor().or_nil()
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Normalize both plain values and `Result`-returning functions into `Result<T, Error>`.
pub trait IntoResult<T> {
    fn into_result(self) -> Result<T, Error>;
}

impl<T> IntoResult<T> for T {
    fn into_result(self) -> Result<T, Error> {
        Ok(self)
    }
}

impl<T, E> IntoResult<T> for Result<T, E>
where
    E: Display,
{
    fn into_result(self) -> Result<T, Error> {
        self.map_err(|e| Error::EvalError(e.to_string()))
    }
}

/// Convert a strongly-typed Rust function or closure into a native callable,
/// parameterized by an argument tuple type.
///
/// The native evaluates its argument expressions, validates them through the
/// binder against the descriptors of the Rust parameter types, converts them and
/// calls the function. A `Result::Err` from the function becomes an `EvalError`.
pub trait IntoOperation<Args, R> {
    fn into_native(self, id: &str) -> NativeFunction;
}

// 0-arg functions / closures
impl<F, FR, R> IntoOperation<(), R> for F
where
    F: Fn() -> FR + Send + Sync + 'static,
    FR: IntoResult<R> + 'static,
    R: Into<Value> + 'static,
{
    fn into_native(self, id: &str) -> NativeFunction {
        let signature = Signature::positional(Vec::new());
        NativeFunction::new(id, move |env, exprs| {
            let args = eval_args(exprs, env)?;
            signature.check(&args)?;
            let value: R = (self)().into_result()?;
            Ok(value.into())
        })
    }
}

/// Helper macro to implement `IntoOperation` for functions of various
/// arities. Arity and types are checked by the binder before any conversion.
macro_rules! impl_into_operation_for_arity {
    ($( $p:ident : $A:ident ),+ ) => {
        impl<F, FR, R, $( $A ),+> IntoOperation<( $( $A, )+ ), R> for F
        where
            F: Fn( $( $A ),+ ) -> FR + Send + Sync + 'static,
            FR: IntoResult<R> + 'static,
            R: Into<Value> + 'static,
            $( $A: FromParam, )+
        {
            fn into_native(self, id: &str) -> NativeFunction {
                let signature = Signature::positional(vec![ $( $A::descriptor() ),+ ]);
                NativeFunction::new(id, move |env, exprs| {
                    let args = eval_args(exprs, env)?;
                    let mut values = signature.match_args(&args)?.into_iter();
                    $(
                        let $p = $A::from_value(values.next().unwrap_or(Value::Nil))?;
                    )+
                    let value: R = (self)( $( $p ),+ ).into_result()?;
                    Ok(value.into())
                })
            }
        }
    };
}

impl_into_operation_for_arity!(p0: A1);
impl_into_operation_for_arity!(p0: A1, p1: A2);
impl_into_operation_for_arity!(p0: A1, p1: A2, p2: A3);
impl_into_operation_for_arity!(p0: A1, p1: A2, p2: A3, p3: A4);
impl_into_operation_for_arity!(p0: A1, p1: A2, p2: A3, p3: A4, p4: A5);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::evaluator::{create_global_env, run};
    use crate::{Arity, Environment};

    fn env_with_operations() -> Environment {
        fn add(a: i64, b: i64) -> i64 {
            a + b
        }
        fn forty_two() -> i64 {
            42
        }
        fn safe_div(a: i64, b: i64) -> Result<i64, &'static str> {
            if b == 0 {
                Err("division by zero")
            } else {
                Ok(a / b)
            }
        }
        fn shout(s: String, times: i64) -> String {
            s.to_uppercase().repeat(times.max(0) as usize)
        }
        fn count(items: Vec<Value>) -> i64 {
            items.len() as i64
        }
        fn or_default(x: Option<i64>) -> i64 {
            x.unwrap_or(-1)
        }
        fn describe(v: Value) -> String {
            v.kind_name().to_owned()
        }
        fn half(x: f64) -> f64 {
            x / 2.0
        }

        let mut env = create_global_env();
        env.register_operation::<_, (i64, i64), i64>("add2", add);
        env.register_operation::<_, (), i64>("forty-two", forty_two);
        env.register_operation::<_, (i64, i64), i64>("safe-div", safe_div);
        env.register_operation::<_, (String, i64), String>("shout", shout);
        env.register_operation::<_, (Vec<Value>,), i64>("count", count);
        env.register_operation::<_, (Option<i64>,), i64>("or-default", or_default);
        env.register_operation::<_, (Value,), String>("describe", describe);
        env.register_operation::<_, (f64,), f64>("half", half);
        env
    }

    #[derive(Debug)]
    enum Expect {
        Value(Value),
        TypeSign(&'static str),
        Arity(Arity, usize),
        Message(&'static str),
    }

    #[test]
    fn test_typed_operations_data_driven() {
        let test_cases = vec![
            ("(add2 7 5)", Expect::Value(Value::Int(12))),
            ("(add2 (add2 1 2) 3)", Expect::Value(Value::Int(6))),
            ("(forty-two)", Expect::Value(Value::Int(42))),
            ("(safe-div 6 3)", Expect::Value(Value::Int(2))),
            ("(safe-div 1 0)", Expect::Message("division by zero")),
            ("(shout \"ab\" 2)", Expect::Value(Value::from("ABAB"))),
            ("(count '(1 2 3))", Expect::Value(Value::Int(3))),
            ("(count (list))", Expect::Value(Value::Int(0))),
            ("(or-default nil)", Expect::Value(Value::Int(-1))),
            ("(or-default 4)", Expect::Value(Value::Int(4))),
            ("(describe nil)", Expect::Value(Value::from("nil"))),
            ("(describe 'x)", Expect::Value(Value::from("atom"))),
            ("(half 3.0)", Expect::Value(Value::Float(1.5))),
            // the binder reports mismatches
            ("(add2 1 \"2\")", Expect::TypeSign("arg2")),
            ("(half 3)", Expect::TypeSign("arg1")),
            ("(or-default \"x\")", Expect::TypeSign("arg1")),
            ("(add2 1)", Expect::Arity(Arity::Exact(2), 1)),
            ("(add2 1 2 3)", Expect::Arity(Arity::Exact(2), 3)),
            ("(forty-two 1)", Expect::Arity(Arity::Exact(0), 1)),
        ];

        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            let mut env = env_with_operations();
            let test_id = format!("Operation test #{} {source}", i + 1);
            match (run(source, &mut env), expected) {
                (Ok(actual), Expect::Value(value)) => assert_eq!(actual, value, "{test_id}"),
                (Err(Error::TypeSign { formal, .. }), Expect::TypeSign(name)) => {
                    assert_eq!(formal, name, "{test_id}");
                }
                (Err(Error::ArityError { expected, got, .. }), Expect::Arity(arity, count)) => {
                    assert_eq!((expected, got), (arity, count), "{test_id}");
                }
                (Err(err), Expect::Message(text)) => {
                    assert!(err.to_string().contains(text), "{test_id}: {err}");
                }
                (result, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {result:?}")
                }
            }
        }
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(i64::descriptor().to_string(), "int");
        assert_eq!(<Option<String>>::descriptor().to_string(), "string?");
        assert_eq!(<Vec<Value>>::descriptor().to_string(), "list");
        assert!(Value::descriptor().admits(&Value::Nil));
        assert!(!SystemTime::descriptor().admits(&Value::Nil));
    }

    #[test]
    fn test_closures_can_be_registered() {
        let offset = 100;
        let mut env = create_global_env();
        env.register_operation::<_, (i64,), i64>("shift", move |x: i64| x + offset);
        assert_eq!(run("(shift 1)", &mut env).unwrap(), Value::Int(101));
    }
}
