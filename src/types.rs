//! Type descriptors used by annotations, Var cells and argument validation.
//!
//! A descriptor is a kind tag plus an optional-ness flag. The reader produces them
//! from `name::type` annotations, the binder checks actual arguments against them,
//! and every Var remembers the descriptor it was created with.

use std::fmt;

use crate::ast::Value;

/// Kind tag of a [`TypeDescriptor`]
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Any,
    Bool,
    Int,
    Float,
    String,
    Time,
    Duration,
    Atom,
    List,
    Quote,
    Dict,
    /// A host type registered under a name (see [`crate::ast::HostObject`])
    Alias(String),
    /// A list whose elements all match the inner descriptor
    Slice(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
}

/// Built-in type keywords in the order the reader tries them
pub(crate) const BUILTIN_TYPE_NAMES: [(&str, Kind); 11] = [
    ("bool", Kind::Bool),
    ("float", Kind::Float),
    ("int", Kind::Int),
    ("string", Kind::String),
    ("time", Kind::Time),
    ("duration", Kind::Duration),
    ("any", Kind::Any),
    ("atom", Kind::Atom),
    ("list", Kind::List),
    ("quote", Kind::Quote),
    ("dict", Kind::Dict),
];

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub kind: Kind,
    pub optional: bool,
}

impl TypeDescriptor {
    pub const fn new(kind: Kind) -> Self {
        TypeDescriptor {
            kind,
            optional: false,
        }
    }

    /// Descriptor that also accepts nil
    pub const fn optional(kind: Kind) -> Self {
        TypeDescriptor {
            kind,
            optional: true,
        }
    }

    /// The descriptor of an atom written without an annotation
    pub const fn any() -> Self {
        Self::new(Kind::Any)
    }

    pub fn slice_of(element: TypeDescriptor) -> Self {
        Self::new(Kind::Slice(Box::new(element)))
    }

    pub fn map_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::new(Kind::Map(Box::new(key), Box::new(value)))
    }

    /// Same kind, with the optional flag set
    pub fn or_nil(self) -> Self {
        TypeDescriptor {
            optional: true,
            ..self
        }
    }

    /// Look up a built-in type keyword
    pub fn builtin(name: &str) -> Option<Self> {
        BUILTIN_TYPE_NAMES
            .iter()
            .find(|(keyword, _)| *keyword == name)
            .map(|(_, kind)| Self::new(kind.clone()))
    }

    /// Whether a value may be stored under this descriptor.
    ///
    /// Nil is only admitted by optional descriptors, `Any` included. Any other
    /// value is admitted by `Any` or by the kind the value carries.
    pub fn admits(&self, value: &Value) -> bool {
        if value.is_nil() {
            return self.optional;
        }
        self.kind.matches(value)
    }
}

impl Default for TypeDescriptor {
    fn default() -> Self {
        Self::any()
    }
}

impl Kind {
    /// Kind-level match for a non-nil value
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Kind::Any, _) => true,
            (Kind::Bool, Value::Bool(_))
            | (Kind::Int, Value::Int(_))
            | (Kind::Float, Value::Float(_))
            | (Kind::String, Value::String(_))
            | (Kind::Time, Value::Time(_))
            | (Kind::Duration, Value::Duration(_))
            | (Kind::Atom, Value::Atom(_))
            | (Kind::List, Value::List(_))
            | (Kind::Quote, Value::Quote(_)) => true,
            (Kind::Slice(element), Value::List(items)) => {
                items.iter().all(|item| element.admits(item))
            }
            (Kind::Alias(name), Value::Host(host)) => host.type_name() == name,
            // Dict and Map included: no dictionary values exist in the core
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Any => f.write_str("any"),
            Kind::Bool => f.write_str("bool"),
            Kind::Int => f.write_str("int"),
            Kind::Float => f.write_str("float"),
            Kind::String => f.write_str("string"),
            Kind::Time => f.write_str("time"),
            Kind::Duration => f.write_str("duration"),
            Kind::Atom => f.write_str("atom"),
            Kind::List => f.write_str("list"),
            Kind::Quote => f.write_str("quote"),
            Kind::Dict => f.write_str("dict"),
            Kind::Alias(name) => f.write_str(name),
            Kind::Slice(element) => write!(f, "[]{element}"),
            Kind::Map(key, value) => write!(f, "map[{key}]{value}"),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}
