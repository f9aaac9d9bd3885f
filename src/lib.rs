//! kitlisp - an embeddable, optionally typed s-expression language
//!
//! This crate lets a host program expose native callables ("toolkits") to small
//! interpreted scripts. Scripts are dynamically typed, but every atom may carry a
//! type annotation which is checked when arguments are bound:
//!
//! ```text
//! (let ((square (lambda (x::int) (* x x))))
//!   (square 12))                         ; => 144
//!
//! (+ 1 2 3.5)                            ; => 6.5, integers widen to floats
//! (cmp '(1 2) '(1 3))                    ; => -1, lists compare element-wise
//! (time.parse-duration "1h30m")          ; toolkit member access
//! ```
//!
//! ## Pipeline
//!
//! Source text is read by the [`reader`] into [`ast::Value`] nodes (literals, atoms,
//! lists and quotes). The extended reader consults an [`environment::Environment`]
//! so that host-registered type aliases can be used in annotations. The
//! [`evaluator`] walks those nodes; every callable receives its arguments
//! unevaluated, which is what lets special forms such as `let`, `lambda` and `or`
//! control evaluation order.
//!
//! ## Typing
//!
//! Argument validation has a single source of truth: the [`binder`]. Lambdas,
//! typed host functions and the built-in operators all run their actual arguments
//! through the same validator pipeline, built from the shared parsing machinery in
//! [`combinator`].
//!
//! ## Modules
//!
//! - `types`: type descriptors and their matching rules
//! - `ast`: the closed value model
//! - `combinator`: backtracking parser combinators over text and value slices
//! - `reader`: source text to values
//! - `environment`: chained scopes and the Var arena
//! - `binder`: argument validation and Var allocation
//! - `closure`: free-variable capture and lambda activation
//! - `evaluator`: evaluation and special forms
//! - `builtinops`: arithmetic and comparison operators
//! - `intooperation`: typed host-function adapters
//! - `toolkit`: named collections of native callables

use std::fmt;

use crate::types::TypeDescriptor;

/// Maximum reader nesting depth (lists and quotes)
/// This keeps hostile input from overflowing the host stack while parsing
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum evaluation depth
/// Every nested evaluation counts, including the body of each lambda activation
pub const MAX_EVAL_DEPTH: usize = 128;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// A type annotation named a type that is neither built in nor registered
    UnknownType,
    /// Implementation-imposed limit exceeded (integer literal out of range)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let error_offset = error_offset.min(input.len());
        let before = &input[..floor_char_boundary(input, error_offset)];
        let after = &input[before.len()..];

        // Show up to 20 characters before the failure point
        let lead: String = {
            let chars: Vec<char> = before.chars().collect();
            let start = chars.len().saturating_sub(20);
            chars[start..].iter().collect()
        };
        let truncated_front = lead.len() < before.len();

        let context_str: String = lead
            .chars()
            .chain(after.chars())
            .take(MAX_CONTEXT)
            .collect();
        let truncated_back = lead.chars().count() + after.chars().count() > MAX_CONTEXT;

        let mut display_context = String::new();
        if truncated_front {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if truncated_back {
            display_context.push_str("[...]");
        }
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        let found = after.chars().next().map(|c| c.to_string());

        Self::new(kind, message, Some(display_context), found)
    }
}

fn floor_char_boundary(input: &str, mut offset: usize) -> usize {
    while offset > 0 && !input.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Expected number of arguments for an operation or signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly N arguments
    Exact(usize),
    /// At least N arguments
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid for this arity
    pub fn validate(self, arg_count: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, arg_count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// The operand kinds arithmetic and comparison coerce their operands into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Integer,
    Float,
    Number,
    String,
    Time,
    Duration,
    List,
    Boolean,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandKind::Integer => "integer",
            OperandKind::Float => "float",
            OperandKind::Number => "number",
            OperandKind::String => "string",
            OperandKind::Time => "time",
            OperandKind::Duration => "duration",
            OperandKind::List => "list",
            OperandKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    Syntax(ParseError),

    #[error("TypeSignError: {actual} does not match {formal}::{expected}")]
    TypeSign {
        formal: String,
        expected: TypeDescriptor,
        actual: Value,
    },

    #[error("{}", describe_arity(.expected, .got, .expression))]
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },

    #[error("Unbound name: {0}")]
    UnboundName(String),

    #[error("{found} is not a valid {expected}")]
    OperandKind { expected: OperandKind, found: Value },

    #[error("ComparisonError: no defined ordering between {left} and {right}")]
    ComparisonUndefined { left: Value, right: Value },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn describe_arity(expected: &Arity, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityError: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityError: expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    pub(crate) fn operand(expected: OperandKind, found: &Value) -> Self {
        Error::OperandKind {
            expected,
            found: found.clone(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Syntax(err)
    }
}

pub mod ast;
pub mod binder;
pub mod builtinops;
pub mod closure;
pub mod combinator;
pub mod environment;
pub mod evaluator;
pub mod intooperation;
pub mod reader;
pub mod toolkit;
pub mod types;

pub use ast::Value;
pub use environment::Environment;
pub use evaluator::{create_global_env, eval, run};
pub use reader::{Reader, parse};
