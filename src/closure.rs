//! Lambdas and their activations.
//!
//! Building a [`Lambda`] walks its body once and snapshots every free name from the
//! defining environment, so the resulting closure no longer depends on where it is
//! called from. A name that cannot be resolved at that point is an error right away,
//! not on the first call. Each call then runs as a [`Task`]: a fresh environment whose
//! outer frame is the captured snapshot and whose inner frame holds the parameter Vars.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::Error;
use crate::ast::Value;
use crate::binder::Signature;
use crate::environment::{Binding, Environment};
use crate::evaluator::eval;

/// An immutable closure
#[derive(Debug)]
pub struct Lambda {
    pub signature: Signature,
    captured: HashMap<String, Binding>,
    body: Vec<Value>,
}

impl Lambda {
    /// Capture the free names of `body` from `env`
    pub fn build(env: &Environment, signature: Signature, body: Vec<Value>) -> Result<Self, Error> {
        let mut capture = Capture {
            env,
            captured: HashMap::new(),
        };
        let mut bound: HashSet<String> = signature
            .formals()
            .iter()
            .map(|formal| formal.name.clone())
            .collect();
        capture.sequence(&body, &mut bound)?;

        let captured = capture.captured;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut names: Vec<_> = captured.keys().map(String::as_str).collect();
            names.sort_unstable();
            tracing::debug!(signature = %signature, captured = ?names, "built lambda");
        }

        Ok(Lambda {
            signature,
            captured,
            body,
        })
    }

    /// Names this closure resolved at construction time, sorted
    pub fn captured_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.captured.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }

    /// Run one activation with already evaluated arguments. `caller` only
    /// contributes its evaluation depth.
    pub fn call(&self, caller: &Environment, actuals: &[Value]) -> Result<Value, Error> {
        Task::new(self, caller, actuals)?.run()
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lambda {}", self.signature)?;
        for expr in &self.body {
            write!(f, " {expr}")?;
        }
        write!(f, ")")
    }
}

struct Capture<'e> {
    env: &'e Environment,
    captured: HashMap<String, Binding>,
}

impl Capture<'_> {
    /// A body sequence; `var` declarations bind for the remaining siblings
    fn sequence(&mut self, exprs: &[Value], bound: &mut HashSet<String>) -> Result<(), Error> {
        for expr in exprs {
            self.expr(expr, bound)?;
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Value, bound: &mut HashSet<String>) -> Result<(), Error> {
        match expr {
            Value::Atom(atom) => self.name(&atom.name, bound),
            Value::List(items) => self.list(items, bound),
            _ => Ok(()),
        }
    }

    fn name(&mut self, name: &str, bound: &HashSet<String>) -> Result<(), Error> {
        if bound.contains(name) || self.captured.contains_key(name) {
            return Ok(());
        }
        let binding = match self.env.lookup(name) {
            // Vars are snapshotted by value
            Some(Binding::Var(handle)) => self.env.var(handle).cloned().map(Binding::Value),
            other => other,
        }
        .ok_or_else(|| Error::UnboundName(name.to_owned()))?;
        self.captured.insert(name.to_owned(), binding);
        Ok(())
    }

    fn list(&mut self, items: &[Value], bound: &mut HashSet<String>) -> Result<(), Error> {
        let Some((head, rest)) = items.split_first() else {
            return Ok(());
        };
        let form = match head {
            Value::Atom(atom) if !bound.contains(&atom.name) => Some(atom.name.as_str()),
            _ => None,
        };

        match (form, rest) {
            (Some("quote"), _) => self.expr(head, bound),
            (Some("lambda"), [formals, body @ ..]) => {
                self.expr(head, bound)?;
                let mut inner = bound.clone();
                inner.extend(formal_names(formals));
                self.sequence(body, &mut inner)
            }
            (Some("let"), [Value::List(bindings), body @ ..]) => {
                self.expr(head, bound)?;
                let mut inner = bound.clone();
                for binding in bindings {
                    match binding {
                        Value::List(pair) => {
                            if let [_, init @ ..] = pair.as_slice() {
                                self.sequence(init, &mut inner)?;
                            }
                            if let Some(Value::Atom(name)) = pair.first() {
                                inner.insert(name.name.clone());
                            }
                        }
                        other => self.expr(other, &mut inner)?,
                    }
                }
                self.sequence(body, &mut inner)
            }
            (Some("var"), [Value::Atom(name), init @ ..]) => {
                self.expr(head, bound)?;
                self.sequence(init, bound)?;
                bound.insert(name.name.clone());
                Ok(())
            }
            _ => self.sequence(items, bound),
        }
    }
}

fn formal_names(formals: &Value) -> Vec<String> {
    match formals {
        Value::List(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Atom(atom) => Some(atom.name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One activation of a [`Lambda`]
pub struct Task<'l> {
    lambda: &'l Lambda,
    env: Environment,
}

impl<'l> Task<'l> {
    /// Bind the actuals to fresh Vars in a new environment
    pub fn new(lambda: &'l Lambda, caller: &Environment, actuals: &[Value]) -> Result<Self, Error> {
        let mut env = Environment::for_activation(&lambda.captured, caller.depth());
        env.push_frame();
        lambda.signature.bind(&mut env, actuals)?;
        tracing::trace!(signature = %lambda.signature, args = actuals.len(), "activating lambda");
        Ok(Task { lambda, env })
    }

    /// Evaluate the body in order; the last value is the result, nil when empty
    pub fn run(mut self) -> Result<Value, Error> {
        let lambda = self.lambda;
        let mut result = Value::Nil;
        for expr in &lambda.body {
            result = eval(expr, &mut self.env).map_err(|err| self.in_lambda(err))?;
        }
        Ok(result)
    }

    fn in_lambda(&self, error: Error) -> Error {
        let body = self
            .lambda
            .body
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        match error {
            Error::EvalError(msg) => Error::EvalError(format!("{msg}\n  In lambda: {body}")),
            Error::TypeError(msg) => Error::TypeError(format!("{msg}\n  In lambda: {body}")),
            other => other,
        }
    }
}
