//! Scopes and Var storage.
//!
//! An [`Environment`] is a stack of frames, innermost last. Each frame maps names to
//! [`Binding`]s; lookup walks from the innermost frame outwards and the first hit wins.
//! Mutable Vars do not live inside values: they are cells in an arena owned by the
//! environment and referenced by [`VarHandle`]. A frame remembers how many cells existed
//! when it was pushed, so popping it releases exactly the Vars created inside it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{NativeFunction, Value};
use crate::binder::check_formal;
use crate::intooperation::IntoOperation;
use crate::toolkit::Toolkit;
use crate::types::TypeDescriptor;
use crate::{Error, MAX_EVAL_DEPTH};

/// Stable address of a Var cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarHandle(usize);

/// What a name can be bound to
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Var(VarHandle),
    /// A user type alias, usable in annotations read by the extended reader
    Type(TypeDescriptor),
    Toolkit(Arc<Toolkit>),
}

#[derive(Debug)]
struct VarCell {
    name: String,
    descriptor: TypeDescriptor,
    value: Value,
}

#[derive(Debug, Default)]
struct Frame {
    bindings: HashMap<String, Binding>,
    /// Arena length when the frame was pushed
    first_cell: usize,
}

/// Environment for name bindings
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
    cells: Vec<VarCell>,
    depth: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment with a single, empty frame
    pub fn new() -> Self {
        Environment {
            frames: vec![Frame::default()],
            cells: Vec::new(),
            depth: 0,
        }
    }

    /// Fresh environment for one lambda activation: the captured bindings form its
    /// outermost frame, and evaluation depth carries on from the caller's.
    pub(crate) fn for_activation(captured: &HashMap<String, Binding>, depth: usize) -> Self {
        Environment {
            frames: vec![Frame {
                bindings: captured.clone(),
                first_cell: 0,
            }],
            cells: Vec::new(),
            depth,
        }
    }

    /// Look a name up, innermost frame first. `toolkit.member` resolves through a
    /// toolkit bound to `toolkit` when no frame binds the dotted name itself.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.get(name) {
            return Some(binding.clone());
        }
        let (toolkit, member) = name.split_once('.')?;
        match self.get(toolkit)? {
            Binding::Toolkit(toolkit) => toolkit.get(member).cloned().map(Binding::Value),
            _ => None,
        }
    }

    fn get(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Bind `name` in the innermost frame
    pub fn define(&mut self, name: impl Into<String>, binding: Binding) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.into(), binding);
        }
    }

    pub fn define_value(&mut self, name: impl Into<String>, value: Value) {
        self.define(name, Binding::Value(value));
    }

    /// Register a user type alias
    pub fn define_type(&mut self, name: impl Into<String>, descriptor: TypeDescriptor) {
        self.define(name, Binding::Type(descriptor));
    }

    /// Create a Var in the innermost frame and bind `name` to it
    pub fn define_var(
        &mut self,
        name: &str,
        descriptor: TypeDescriptor,
        value: Value,
    ) -> Result<VarHandle, Error> {
        let handle = self.new_var(name, descriptor, value)?;
        self.define(name, Binding::Var(handle));
        Ok(handle)
    }

    /// Allocate a Var cell without binding it. The value must satisfy the descriptor.
    pub fn new_var(
        &mut self,
        name: &str,
        descriptor: TypeDescriptor,
        value: Value,
    ) -> Result<VarHandle, Error> {
        check_formal(name, &descriptor, &value)?;
        self.cells.push(VarCell {
            name: name.to_owned(),
            descriptor,
            value,
        });
        Ok(VarHandle(self.cells.len() - 1))
    }

    /// Current contents of a Var
    pub fn var(&self, handle: VarHandle) -> Option<&Value> {
        self.cells.get(handle.0).map(|cell| &cell.value)
    }

    pub fn var_descriptor(&self, handle: VarHandle) -> Option<&TypeDescriptor> {
        self.cells.get(handle.0).map(|cell| &cell.descriptor)
    }

    /// Replace a Var's contents; the descriptor fixed at creation still applies
    pub fn set_var(&mut self, handle: VarHandle, value: Value) -> Result<(), Error> {
        let cell = self
            .cells
            .get_mut(handle.0)
            .ok_or_else(|| Error::EvalError("Var is no longer live".to_owned()))?;
        check_formal(&cell.name, &cell.descriptor, &value)?;
        cell.value = value;
        Ok(())
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame {
            bindings: HashMap::new(),
            first_cell: self.cells.len(),
        });
    }

    /// Drop the innermost frame and every Var created since it was pushed.
    /// The outermost frame is never popped.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1
            && let Some(frame) = self.frames.pop()
        {
            self.cells.truncate(frame.first_cell);
        }
    }

    /// Run `f` inside a new frame, popping it whether `f` succeeds or fails
    pub fn with_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push_frame();
        let result = f(self);
        self.pop_frame();
        result
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Every visible binding, inner frames overriding outer ones, sorted by name
    pub fn all_bindings(&self) -> Vec<(String, Binding)> {
        let mut bindings = HashMap::new();
        for frame in &self.frames {
            for (name, binding) in &frame.bindings {
                bindings.insert(name.clone(), binding.clone());
            }
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Register a native callable that receives its arguments unevaluated.
    ///
    /// # Example
    /// ```
    /// use kitlisp::{Value, create_global_env, run};
    ///
    /// let mut env = create_global_env();
    /// env.register_native("arg-count", |_env, args| Ok(Value::Int(args.len() as i64)));
    /// assert_eq!(run("(arg-count a b (c))", &mut env).unwrap(), Value::Int(3));
    /// ```
    pub fn register_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Environment, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        tracing::debug!(name, "registering native");
        self.define_value(name, Value::Native(NativeFunction::new(name, func)));
    }

    /// Register a strongly-typed Rust function. Arguments are evaluated, then validated
    /// against the signature derived from the Rust parameter types.
    ///
    /// ```
    /// use kitlisp::{Value, create_global_env, run};
    ///
    /// fn safe_div(a: i64, b: i64) -> Result<i64, &'static str> {
    ///     if b == 0 { Err("division by zero") } else { Ok(a / b) }
    /// }
    ///
    /// let mut env = create_global_env();
    /// env.register_operation::<_, (i64, i64), i64>("safe-div", safe_div);
    /// assert_eq!(run("(safe-div 7 2)", &mut env).unwrap(), Value::Int(3));
    /// assert!(run("(safe-div 1 0)", &mut env).is_err());
    /// ```
    pub fn register_operation<F, Args, R>(&mut self, name: &str, func: F)
    where
        F: IntoOperation<Args, R> + 'static,
    {
        tracing::debug!(name, "registering typed operation");
        self.define_value(name, Value::Native(func.into_native(name)));
    }

    /// Bind a toolkit under its own name; members are reached as `name.member`
    pub fn register_toolkit(&mut self, toolkit: Toolkit) {
        tracing::debug!(toolkit = toolkit.name(), entries = toolkit.len(), "registering toolkit");
        let name = toolkit.name().to_owned();
        self.define(name, Binding::Toolkit(Arc::new(toolkit)));
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Count one nested evaluation
    pub(crate) fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use crate::types::Kind;

    fn value_of(env: &Environment, name: &str) -> Option<Value> {
        match env.lookup(name)? {
            Binding::Value(v) => Some(v),
            Binding::Var(h) => env.var(h).cloned(),
            _ => None,
        }
    }

    #[test]
    fn test_frames_shadow_and_release() {
        let mut env = Environment::new();
        env.define_value("x", val(1));

        env.with_frame(|env| {
            env.define_value("x", val(2));
            env.define_value("y", val(3));
            assert_eq!(value_of(env, "x"), Some(val(2)));
            assert_eq!(env.frame_count(), 2);
        });

        assert_eq!(value_of(&env, "x"), Some(val(1)));
        assert_eq!(value_of(&env, "y"), None);

        // the outermost frame survives extra pops
        env.pop_frame();
        assert_eq!(value_of(&env, "x"), Some(val(1)));
    }

    #[test]
    fn test_vars_are_typed_and_frame_owned() {
        let mut env = Environment::new();
        let int = TypeDescriptor::new(Kind::Int);

        let outer = env.define_var("n", int.clone(), val(1)).unwrap();
        env.set_var(outer, val(5)).unwrap();
        assert_eq!(env.var(outer), Some(&val(5)));

        let err = env.set_var(outer, val("five")).unwrap_err();
        assert!(matches!(err, Error::TypeSign { ref formal, .. } if formal == "n"));
        // nil needs an optional descriptor
        assert!(env.set_var(outer, Value::Nil).is_err());
        assert!(env.new_var("m", int.clone().or_nil(), Value::Nil).is_ok());

        let inner = env.with_frame(|env| env.define_var("k", int, val(7)).unwrap());
        assert_eq!(env.var(inner), None);
        assert_eq!(env.var(outer), Some(&val(5)));
    }

    #[test]
    fn test_toolkit_member_lookup() {
        let mut env = Environment::new();
        env.register_toolkit(Toolkit::new("units").with_value("meter", val(100)));

        assert_eq!(value_of(&env, "units.meter"), Some(val(100)));
        assert!(env.lookup("units.inch").is_none());
        assert!(env.lookup("nothing.meter").is_none());
        assert!(matches!(env.lookup("units"), Some(Binding::Toolkit(_))));
    }

    #[test]
    fn test_all_bindings_sorted_with_overrides() {
        let mut env = Environment::new();
        env.define_value("b", val(1));
        env.define_value("a", val(2));
        env.push_frame();
        env.define_value("b", val(3));

        let names: Vec<_> = env
            .all_bindings()
            .into_iter()
            .map(|(name, binding)| match binding {
                Binding::Value(v) => format!("{name}={v}"),
                _ => name,
            })
            .collect();
        assert_eq!(names, vec!["a=2", "b=3"]);
    }
}
