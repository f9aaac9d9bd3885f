//! Argument validation and Var allocation.
//!
//! A [`Signature`] turns its formal parameters into a pipeline of validators built
//! from [`crate::combinator`] parsers running over the evaluated actual arguments:
//! one validator per fixed formal, a repeating validator for the variadic marker, and
//! an end-of-input check. Lambdas, typed host functions and the arithmetic and
//! comparison operators all validate through this module, so every "wrong argument"
//! error in the language has the same shape.

use std::collections::HashSet;
use std::fmt;

use crate::ast::{Atom, Value};
use crate::combinator::{
    BoxedParser, Cursor, PResult, Stream, StreamError, eof, many_till, map, satisfy_map,
    sequence, terminated,
};
use crate::environment::{Environment, VarHandle};
use crate::reader::{VARIADIC_MARKER, parse};
use crate::types::TypeDescriptor;
use crate::{Arity, Error};

type BResult<'a, O> = PResult<Cursor<'a, Value>, O, Error>;

impl<'a> StreamError<Cursor<'a, Value>> for Error {
    fn end_of_input(at: &Cursor<'a, Value>) -> Self {
        Error::arity_error(Arity::AtLeast(at.position() + 1), at.position())
    }

    fn trailing_input(at: &Cursor<'a, Value>) -> Self {
        Error::arity_error(
            Arity::Exact(at.position()),
            at.position() + at.remaining(),
        )
    }

    fn unexpected(at: &Cursor<'a, Value>) -> Self {
        match at.peek() {
            Some(value) => Error::TypeError(format!("Unexpected argument {value}")),
            None => Self::end_of_input(at),
        }
    }
}

/// The single matching rule for a formal and an actual: nil only where the
/// descriptor is optional, anything else where the descriptor admits it.
pub fn check_formal(name: &str, descriptor: &TypeDescriptor, actual: &Value) -> Result<(), Error> {
    if descriptor.admits(actual) {
        Ok(())
    } else {
        Err(Error::TypeSign {
            formal: name.to_owned(),
            expected: descriptor.clone(),
            actual: actual.clone(),
        })
    }
}

/// Validator for one actual against one formal
fn one<'a: 's, 's>(formal: &'s Atom) -> impl Fn(Cursor<'a, Value>) -> BResult<'a, Value> + 's {
    satisfy_map(move |actual: &Value| {
        check_formal(&formal.name, &formal.ty, actual)?;
        Ok(actual.clone())
    })
}

/// Ordered formal parameters, optionally ending in the variadic marker
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    formals: Vec<Atom>,
    variadic: bool,
}

impl Signature {
    pub fn new(formals: Vec<Atom>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for (i, formal) in formals.iter().enumerate() {
            if !seen.insert(formal.name.as_str()) {
                return Err(Error::EvalError(format!(
                    "Duplicate parameter name: {}",
                    formal.name
                )));
            }
            if formal.name == VARIADIC_MARKER && i + 1 != formals.len() {
                return Err(Error::EvalError(format!(
                    "{VARIADIC_MARKER} must be the last parameter"
                )));
            }
        }
        let variadic = formals
            .last()
            .is_some_and(|formal| formal.name == VARIADIC_MARKER);
        Ok(Signature { formals, variadic })
    }

    /// Fixed formals named `arg1`, `arg2`, ... for host functions
    pub(crate) fn positional(descriptors: Vec<TypeDescriptor>) -> Self {
        let formals = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Atom::typed(format!("arg{}", i + 1), ty))
            .collect();
        Signature {
            formals,
            variadic: false,
        }
    }

    /// Build from a parameter list as read from source
    pub fn from_value(params: &Value) -> Result<Self, Error> {
        let Value::List(items) = params else {
            return Err(Error::TypeError(format!(
                "Parameter list must be a list, got {params}"
            )));
        };
        let formals = items
            .iter()
            .map(|item| match item {
                Value::Atom(atom) => Ok(atom.clone()),
                other => Err(Error::TypeError(format!(
                    "Parameters must be atoms, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(formals)
    }

    /// Parse a parameter list such as `(a::int b::string ...)`
    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::from_value(&parse(text)?)
    }

    pub fn formals(&self) -> &[Atom] {
        &self.formals
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn arity(&self) -> Arity {
        if self.variadic {
            Arity::AtLeast(self.formals.len() - 1)
        } else {
            Arity::Exact(self.formals.len())
        }
    }

    fn fixed(&self) -> &[Atom] {
        if self.variadic {
            &self.formals[..self.formals.len() - 1]
        } else {
            &self.formals
        }
    }

    /// One value per formal; the variadic marker's value is the list of the actuals
    /// it matched.
    fn validate(&self, actuals: &[Value]) -> Result<Vec<Value>, Error> {
        let mut validators: Vec<BoxedParser<'_, Cursor<'_, Value>, Value, Error>> = self
            .fixed()
            .iter()
            .map(|formal| Box::new(one(formal)) as BoxedParser<'_, _, _, _>)
            .collect();
        if self.variadic
            && let Some(marker) = self.formals.last()
        {
            // a rejected element reports its own TypeSign error
            validators.push(Box::new(map(many_till(one(marker), eof), Value::List)));
        }

        let pipeline = terminated(sequence(validators), eof);
        match pipeline(Cursor::new(actuals)) {
            Ok((_, values)) => Ok(values),
            Err(fail) => match fail.into_inner() {
                Error::ArityError { .. } => Err(Error::arity_error(self.arity(), actuals.len())),
                other => Err(other),
            },
        }
    }

    /// Validate without allocating anything
    pub fn check(&self, actuals: &[Value]) -> Result<(), Error> {
        self.validate(actuals).map(|_| ())
    }

    /// Validate and return the matched values in formal order
    pub fn match_args(&self, actuals: &[Value]) -> Result<Vec<Value>, Error> {
        self.validate(actuals)
    }

    /// Validate, then create one Var per formal in the environment's innermost frame.
    /// The variadic marker's Var holds a list and is typed as a slice of the marker's
    /// own type.
    pub fn bind(
        &self,
        env: &mut Environment,
        actuals: &[Value],
    ) -> Result<Vec<(String, VarHandle)>, Error> {
        let values = self.validate(actuals)?;
        let last = self.formals.len().saturating_sub(1);
        let mut bound = Vec::with_capacity(values.len());
        for (i, (formal, value)) in self.formals.iter().zip(values).enumerate() {
            let descriptor = if self.variadic && i == last {
                TypeDescriptor::slice_of(formal.ty.clone())
            } else {
                formal.ty.clone()
            };
            let handle = env.define_var(&formal.name, descriptor, value)?;
            bound.push((formal.name.clone(), handle));
        }
        Ok(bound)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, formal) in self.formals.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{formal}")?;
        }
        write!(f, ")")
    }
}
