//! Source text to [`Value`] nodes.
//!
//! Token-level lexemes (numbers, whitespace, keywords) are `nom` parsers over `&str`,
//! lifted into the backtracking combinators of [`crate::combinator`] with [`lex`]. The
//! structural grammar (lists, quotes, atoms and their type annotations) is written with
//! those combinators directly, which is what lets a committed error inside a list or a
//! string escape stop the whole parse instead of being retried as something else.

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{opt as nom_opt, recognize},
    sequence::pair as nom_pair,
};

use crate::ast::{Atom, Value};
use crate::combinator::{
    Fail, PResult, Span, Stream, StreamError, between, cut, eof, lex, many, map, opt, or,
    preceded, satisfy, terminated,
};
use crate::environment::{Binding, Environment};
use crate::types::{BUILTIN_TYPE_NAMES, TypeDescriptor};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

type RResult<'a, O> = PResult<Span<'a>, O, ParseError>;

/// Characters that may not appear in an atom name
const NAME_EXCLUDED: &str = "'[]()\":.";

/// Characters that end a keyword inside a type annotation
const TYPE_STOP: &str = ":.()[]{}?'\"";

/// The variadic marker, readable as an atom name even though `.` is excluded
pub const VARIADIC_MARKER: &str = "...";

impl<'a> StreamError<Span<'a>> for ParseError {
    fn end_of_input(at: &Span<'a>) -> Self {
        ParseError::with_context(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
            at.source(),
            at.offset(),
        )
    }

    fn trailing_input(at: &Span<'a>) -> Self {
        let remaining: String = at.rest().chars().take(20).collect();
        ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{remaining}'"),
            at.source(),
            at.offset(),
        )
    }

    fn unexpected(at: &Span<'a>) -> Self {
        if at.is_empty() {
            return Self::end_of_input(at);
        }
        let near: String = at.rest().chars().take(10).collect();
        ParseError::with_context(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid syntax near '{near}'"),
            at.source(),
            at.offset(),
        )
    }
}

fn fail_at(kind: ParseErrorKind, message: impl Into<String>, at: Span<'_>) -> ParseError {
    ParseError::with_context(kind, message, at.source(), at.offset())
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !NAME_EXCLUDED.contains(c)
}

fn is_token_boundary(c: char) -> bool {
    c.is_whitespace() || "()[]'\"".contains(c)
}

fn is_type_stop(c: char) -> bool {
    c.is_whitespace() || TYPE_STOP.contains(c)
}

/// Succeeds without consuming when the next character ends a token
fn boundary(input: Span<'_>) -> RResult<'_, ()> {
    match input.peek() {
        None => Ok((input, ())),
        Some(c) if is_token_boundary(c) => Ok((input, ())),
        Some(_) => Err(Fail::Backtrack(ParseError::unexpected(&input))),
    }
}

fn type_stop(input: Span<'_>) -> RResult<'_, ()> {
    match input.peek() {
        None => Ok((input, ())),
        Some(c) if is_type_stop(c) => Ok((input, ())),
        Some(_) => Err(Fail::Backtrack(ParseError::unexpected(&input))),
    }
}

// ===== nom lexemes =====

fn whitespace_lexeme(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn int_lexeme(input: &str) -> IResult<&str, &str> {
    recognize(nom_pair(nom_opt(one_of("+-")), digit1)).parse(input)
}

fn float_lexeme(input: &str) -> IResult<&str, &str> {
    recognize((
        nom_opt(one_of("+-")),
        digit1,
        char('.'),
        digit1,
        nom_opt((one_of("eE"), nom_opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn keyword_lexeme<'a>(word: &'static str) -> impl Fn(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| tag(word).parse(input)
}

fn type_identifier_lexeme(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-').parse(input)
}

fn ws0(input: Span<'_>) -> RResult<'_, &str> {
    lex(whitespace_lexeme)(input)
}

fn literal_char<'a>(expected: char) -> impl Fn(Span<'a>) -> RResult<'a, char> {
    satisfy(move |c: &char| *c == expected)
}

// ===== literal parsers =====

fn float_literal(input: Span<'_>) -> RResult<'_, Value> {
    let (rest, text) = terminated(lex(float_lexeme), boundary)(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, Value::Float(n))),
        Err(_) => Err(Fail::Cut(fail_at(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid float literal '{text}'"),
            input,
        ))),
    }
}

fn int_literal(input: Span<'_>) -> RResult<'_, Value> {
    let (rest, text) = terminated(lex(int_lexeme), boundary)(input)?;
    match text.parse::<i64>() {
        Ok(n) => Ok((rest, Value::Int(n))),
        Err(_) => Err(Fail::Cut(fail_at(
            ParseErrorKind::ImplementationLimit,
            format!("Integer literal {text} is out of range"),
            input,
        ))),
    }
}

/// A backslash escape inside a string or character literal
fn escape(input: Span<'_>) -> RResult<'_, char> {
    let (rest, _) = literal_char('\\')(input)?;
    match rest.uncons() {
        Some(('n', after)) => Ok((after, '\n')),
        Some(('r', after)) => Ok((after, '\r')),
        Some(('t', after)) => Ok((after, '\t')),
        Some(('"', after)) => Ok((after, '"')),
        Some(('\'', after)) => Ok((after, '\'')),
        Some(('\\', after)) => Ok((after, '\\')),
        Some((other, _)) => Err(Fail::Cut(fail_at(
            ParseErrorKind::InvalidSyntax,
            format!("Unknown escape sequence \\{other}"),
            input,
        ))),
        None => Err(Fail::Cut(ParseError::end_of_input(&rest))),
    }
}

fn string_literal(input: Span<'_>) -> RResult<'_, Value> {
    let (mut remaining, _) = literal_char('"')(input)?;
    let mut chars = String::new();

    loop {
        match remaining.peek() {
            Some('"') => {
                let (after, _) = any_char(remaining)?;
                return Ok((after, Value::String(chars)));
            }
            Some('\\') => {
                let (after, c) = escape(remaining)?;
                chars.push(c);
                remaining = after;
            }
            Some(_) => {
                let (after, c) = any_char(remaining)?;
                chars.push(c);
                remaining = after;
            }
            None => {
                // Reached end of input without finding closing quote
                return Err(Fail::Cut(fail_at(
                    ParseErrorKind::Incomplete,
                    "Unterminated string literal",
                    input,
                )));
            }
        }
    }
}

fn any_char(input: Span<'_>) -> RResult<'_, char> {
    crate::combinator::any(input)
}

/// `'x'`; backtracks when the closing quote is missing so `'x` can be read as a quote
fn char_literal(input: Span<'_>) -> RResult<'_, Value> {
    let body = or(escape, satisfy(|c: &char| *c != '\''));
    map(
        between(literal_char('\''), body, literal_char('\'')),
        Value::Char,
    )(input)
}

fn bool_literal(input: Span<'_>) -> RResult<'_, Value> {
    or(
        map(terminated(lex(keyword_lexeme("true")), boundary), |_| {
            Value::Bool(true)
        }),
        map(terminated(lex(keyword_lexeme("false")), boundary), |_| {
            Value::Bool(false)
        }),
    )(input)
}

fn nil_literal(input: Span<'_>) -> RResult<'_, Value> {
    map(terminated(lex(keyword_lexeme("nil")), boundary), |_| Value::Nil)(input)
}

fn name_segment(input: Span<'_>) -> RResult<'_, &str> {
    let start = input;
    let mut end = input;
    while let Some((c, next)) = end.uncons() {
        if !is_name_char(c) {
            break;
        }
        end = next;
    }
    if end.offset() == start.offset() {
        return Err(Fail::Backtrack(ParseError::unexpected(&start)));
    }
    let text = &start.source()[start.offset()..end.offset()];
    Ok((end, text))
}

/// Source text to values, optionally resolving user type names through an environment
#[derive(Clone, Copy, Default)]
pub struct Reader<'e> {
    env: Option<&'e Environment>,
}

impl<'e> Reader<'e> {
    /// Built-in type keywords only; no member access
    pub fn basic() -> Self {
        Reader { env: None }
    }

    /// Resolves type aliases registered in `env` and reads `toolkit.name` atoms
    pub fn extended(env: &'e Environment) -> Self {
        Reader { env: Some(env) }
    }

    /// Parse one value, returning it with the unread remainder of the text
    pub fn parse<'a>(&self, text: &'a str) -> Result<(Value, &'a str), Error> {
        let parser = terminated(preceded(ws0, |i| self.value(i, 0)), ws0);
        match parser(Span::new(text)) {
            Ok((rest, value)) => Ok((value, rest.rest())),
            Err(fail) => Err(Error::Syntax(fail.into_inner())),
        }
    }

    /// Parse every value in `text`; anything left over is an error
    pub fn parse_program(&self, text: &str) -> Result<Vec<Value>, Error> {
        let parser = terminated(
            preceded(ws0, many(terminated(|i| self.value(i, 0), ws0))),
            eof,
        );
        match parser(Span::new(text)) {
            Ok((_, values)) => Ok(values),
            Err(fail) => Err(Error::Syntax(fail.into_inner())),
        }
    }

    fn value<'a>(&self, input: Span<'a>, depth: usize) -> RResult<'a, Value> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Fail::Cut(fail_at(
                ParseErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                input,
            )));
        }
        crate::choice!(
            string_literal,
            float_literal,
            int_literal,
            char_literal,
            bool_literal,
            nil_literal,
            |i| self.atom(i).map(|(rest, atom)| (rest, Value::Atom(atom))),
            |i| self.list(i, depth),
            |i| self.quote(i, depth),
        )(input)
    }

    fn list<'a>(&self, input: Span<'a>, depth: usize) -> RResult<'a, Value> {
        let elements = many(terminated(|i| self.value(i, depth + 1), ws0));
        map(
            between(
                open_paren,
                elements,
                cut(literal_char(')')),
            ),
            Value::List,
        )(input)
    }

    fn quote<'a>(&self, input: Span<'a>, depth: usize) -> RResult<'a, Value> {
        let quoted = or(
            |i| self.atom(i).map(|(rest, atom)| (rest, Value::Atom(atom))),
            |i| self.list(i, depth + 1),
        );
        map(preceded(literal_char('\''), cut(quoted)), |inner| {
            Value::Quote(Box::new(inner))
        })(input)
    }

    fn atom<'a>(&self, input: Span<'a>) -> RResult<'a, Atom> {
        let (rest, name) = self.atom_name(input)?;
        if name.chars().all(|c| c.is_ascii_digit()) {
            return Err(Fail::Cut(fail_at(
                ParseErrorKind::InvalidSyntax,
                format!("Atom name can't be an integer like {name}"),
                input,
            )));
        }
        let (rest, ty) = opt(|i| self.type_annotation(i))(rest)?;
        Ok((rest, Atom::typed(name, ty.unwrap_or_else(TypeDescriptor::any))))
    }

    fn atom_name<'a>(&self, input: Span<'a>) -> RResult<'a, String> {
        if let Ok((rest, marker)) = lex::<_, ParseError, _>(keyword_lexeme(VARIADIC_MARKER))(input)
        {
            return Ok((rest, marker.to_owned()));
        }
        let (mut rest, first) = name_segment(input)?;
        let mut name = first.to_owned();
        if self.env.is_some() {
            // member access: toolkit.name
            while let Ok((after, segment)) =
                preceded(literal_char('.'), name_segment)(rest)
            {
                name.push('.');
                name.push_str(segment);
                rest = after;
            }
        }
        Ok((rest, name))
    }

    /// `::type` with an optional trailing `?`
    fn type_annotation<'a>(&self, input: Span<'a>) -> RResult<'a, TypeDescriptor> {
        let (rest, _) = lex(keyword_lexeme("::"))(input)?;
        let (rest, ty) = cut(|i| self.type_expr(i))(rest)?;
        let (rest, optional) = opt(literal_char('?'))(rest)?;
        Ok((rest, if optional.is_some() { ty.or_nil() } else { ty }))
    }

    fn type_expr<'a>(&self, input: Span<'a>) -> RResult<'a, TypeDescriptor> {
        crate::choice!(
            builtin_type,
            |i| self.map_type(i),
            |i| self.slice_type(i),
            |i| self.named_type(i),
        )(input)
    }

    fn map_type<'a>(&self, input: Span<'a>) -> RResult<'a, TypeDescriptor> {
        let (rest, _) = lex(keyword_lexeme("map["))(input)?;
        let (rest, key) = cut(|i| self.type_expr(i))(rest)?;
        let (rest, _) = cut(literal_char(']'))(rest)?;
        let (rest, value) = cut(|i| self.type_expr(i))(rest)?;
        Ok((rest, TypeDescriptor::map_of(key, value)))
    }

    fn slice_type<'a>(&self, input: Span<'a>) -> RResult<'a, TypeDescriptor> {
        let (rest, _) = lex(keyword_lexeme("[]"))(input)?;
        let (rest, element) = cut(|i| self.type_expr(i))(rest)?;
        Ok((rest, TypeDescriptor::slice_of(element)))
    }

    fn named_type<'a>(&self, input: Span<'a>) -> RResult<'a, TypeDescriptor> {
        let (rest, name) = lex(type_identifier_lexeme)(input)?;
        let found = self.env.and_then(|env| env.lookup(name));
        match found {
            Some(Binding::Type(ty)) => Ok((rest, ty)),
            Some(_) => Err(Fail::Cut(fail_at(
                ParseErrorKind::UnknownType,
                format!("{name} is not a type"),
                input,
            ))),
            None => Err(Fail::Cut(fail_at(
                ParseErrorKind::UnknownType,
                format!("type {name} not found"),
                input,
            ))),
        }
    }
}

fn open_paren(input: Span<'_>) -> RResult<'_, &str> {
    preceded(literal_char('('), ws0)(input)
}

/// Built-in keywords, in priority order, each followed by a stop character
fn builtin_type(input: Span<'_>) -> RResult<'_, TypeDescriptor> {
    for (keyword, _) in BUILTIN_TYPE_NAMES {
        if let Ok((rest, _)) =
            terminated(lex::<_, ParseError, _>(keyword_lexeme(keyword)), type_stop)(input)
            && let Some(ty) = TypeDescriptor::builtin(keyword)
        {
            return Ok((rest, ty));
        }
    }
    Err(Fail::Backtrack(ParseError::unexpected(&input)))
}

/// Parse exactly one value with the basic reader
pub fn parse(text: &str) -> Result<Value, Error> {
    let (value, rest) = Reader::basic().parse(text)?;
    if rest.is_empty() {
        Ok(value)
    } else {
        let at = Span::new(text).at_rest(rest);
        Err(Error::Syntax(ParseError::trailing_input(&at)))
    }
}

/// Read `text` as a single integer literal
pub fn read_int(text: &str) -> Result<i64, Error> {
    match terminated(int_literal, eof)(Span::new(text)) {
        Ok((_, Value::Int(n))) => Ok(n),
        Ok((_, other)) => Err(Error::TypeError(format!("{other} is not an integer"))),
        Err(fail) => Err(Error::Syntax(fail.into_inner())),
    }
}

/// Read `text` as a single float literal
pub fn read_float(text: &str) -> Result<f64, Error> {
    match terminated(float_literal, eof)(Span::new(text)) {
        Ok((_, Value::Float(n))) => Ok(n),
        Ok((_, other)) => Err(Error::TypeError(format!("{other} is not a float"))),
        Err(fail) => Err(Error::Syntax(fail.into_inner())),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{atom, nil, quote, val};
    use crate::types::Kind;

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),
        SpecificError(&'static str),
        FailsWith(ParseErrorKind),
        AnyError,
    }
    use ParseTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn typed(name: &str, ty: TypeDescriptor) -> Value {
        Value::Atom(Atom::typed(name, ty))
    }

    fn run_parse_tests(reader: Reader<'_>, test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            let result = reader.parse(input).and_then(|(value, rest)| {
                if rest.is_empty() {
                    Ok(value)
                } else {
                    Err(crate::Error::Syntax(ParseError::from_message(
                        ParseErrorKind::TrailingContent,
                        format!("remaining: {rest}"),
                    )))
                }
            });

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    // display -> parse -> display should be identical
                    let displayed = format!("{actual}");
                    let (reparsed, _) = reader.parse(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e:?}")
                    });
                    assert_eq!(
                        displayed,
                        format!("{reparsed}"),
                        "{test_id}: round-trip display mismatch"
                    );
                }
                (Err(_), AnyError) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let error_msg = format!("{err}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got '{error_msg}'"
                    );
                }
                (Err(crate::Error::Syntax(err)), FailsWith(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind ({err})");
                }
                (Err(err), FailsWith(kind)) => {
                    panic!("{test_id}: expected {kind:?} syntax error, got {err:?}");
                }
                (Ok(actual), _) => panic!("{test_id}: expected error, got {actual:?}"),
                (Err(err), Success(_)) => panic!("{test_id}: expected success, got error {err:?}"),
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_reader_comprehensive() {
        let int = TypeDescriptor::new(Kind::Int);
        let test_cases = vec![
            // ===== NUMBERS =====
            ("12", success(12)),
            ("-5", success(-5)),
            ("+7", success(7)),
            ("3.25", success(3.25)),
            ("-0.5", success(-0.5)),
            ("2.5e3", success(2500.0)),
            ("9223372036854775807", success(i64::MAX)),
            (
                "99999999999999999999",
                FailsWith(ParseErrorKind::ImplementationLimit),
            ),
            // a digit run that is neither a number nor an atom
            ("12::int", SpecificError("can't be an integer")),
            ("12:x", SpecificError("can't be an integer")),
            // ===== ATOMS =====
            ("foo", success(atom("foo"))),
            ("i234", success(atom("i234"))),
            ("+", success(atom("+"))),
            ("<=?", success(atom("<=?"))),
            ("-", success(atom("-"))),
            ("1e5", success(atom("1e5"))),
            ("trueish", success(atom("trueish"))),
            ("x::int", success(typed("x", int.clone()))),
            ("x::int?", success(typed("x", int.clone().or_nil()))),
            ("x::any", success(typed("x", TypeDescriptor::any()))),
            (
                "xs::[]string",
                success(typed(
                    "xs",
                    TypeDescriptor::slice_of(TypeDescriptor::new(Kind::String)),
                )),
            ),
            (
                "m::map[string]float?",
                success(typed(
                    "m",
                    TypeDescriptor::map_of(
                        TypeDescriptor::new(Kind::String),
                        TypeDescriptor::new(Kind::Float),
                    )
                    .or_nil(),
                )),
            ),
            ("...", success(atom("..."))),
            ("...::int", success(typed("...", int.clone()))),
            ("x::point", FailsWith(ParseErrorKind::UnknownType)),
            ("x::integer", FailsWith(ParseErrorKind::UnknownType)),
            ("x::", AnyError),
            // member access is an extended-reader feature
            ("time.now", AnyError),
            // ===== BOOLEANS, NIL, CHARS =====
            ("true", success(true)),
            ("false", success(false)),
            ("nil", success(nil())),
            ("'a'", success('a')),
            (r"'\n'", success('\n')),
            (r"'\''", success('\'')),
            // ===== STRINGS =====
            ("\"hello world\"", success("hello world")),
            ("\"I'm a string\"", success("I'm a string")),
            (r#""tab\there""#, success("tab\there")),
            (r#""quote\"test""#, success("quote\"test")),
            (r#""backslash\\test""#, success("backslash\\test")),
            ("\"\"", success("")),
            (r#""other\xchar""#, SpecificError("Unknown escape")),
            (r#""unterminated"#, FailsWith(ParseErrorKind::Incomplete)),
            // ===== LISTS =====
            ("()", success(Value::List(vec![]))),
            ("(   )", success(Value::List(vec![]))),
            ("(1 2 3)", success([1, 2, 3])),
            (
                "(+ 1 2.5 \"s\" true)",
                success(vec![atom("+"), val(1), val(2.5), val("s"), val(true)]),
            ),
            (
                "(lambda (x::int) (* x x))",
                success(vec![
                    atom("lambda"),
                    val(vec![typed("x", int.clone())]),
                    val(vec![atom("*"), atom("x"), atom("x")]),
                ]),
            ),
            ("((1 2) (3 4))", success([[1, 2], [3, 4]])),
            ("( 1   2\t\n3 )", success([1, 2, 3])),
            ("(1 2 3", FailsWith(ParseErrorKind::Incomplete)),
            ("((1 2)", FailsWith(ParseErrorKind::Incomplete)),
            ("(1 . 2)", FailsWith(ParseErrorKind::InvalidSyntax)),
            ("(1 2))", FailsWith(ParseErrorKind::TrailingContent)),
            // ===== QUOTES =====
            ("'foo", success(quote(atom("foo")))),
            ("'(1 2)", success(quote(val([1, 2])))),
            ("'()", success(quote(Value::List(vec![])))),
            ("'x::int", success(quote(typed("x", int)))),
            ("'\"s\"", AnyError),
            // ===== WHITESPACE AND GENERAL ERRORS =====
            ("  42  ", success(42)),
            ("\r\n  foo  \t", success(atom("foo"))),
            ("", FailsWith(ParseErrorKind::Incomplete)),
            ("   ", FailsWith(ParseErrorKind::Incomplete)),
            (")", FailsWith(ParseErrorKind::InvalidSyntax)),
            ("1 2", FailsWith(ParseErrorKind::TrailingContent)),
        ];

        run_parse_tests(Reader::basic(), test_cases);
    }

    #[test]
    fn test_extended_reader() {
        let mut env = Environment::new();
        env.define_type("point", TypeDescriptor::new(Kind::Alias("point".into())));
        env.define_value("origin", val(0));
        let reader = Reader::extended(&env);

        let point = TypeDescriptor::new(Kind::Alias("point".into()));
        let test_cases = vec![
            ("p::point", success(typed("p", point.clone()))),
            ("p::point?", success(typed("p", point.clone().or_nil()))),
            ("ps::[]point", success(typed("ps", TypeDescriptor::slice_of(point)))),
            ("time.now", success(atom("time.now"))),
            (
                "(time.parse-duration \"1h\")",
                success(vec![atom("time.parse-duration"), val("1h")]),
            ),
            ("x::origin", SpecificError("origin is not a type")),
            ("x::unknown", SpecificError("type unknown not found")),
        ];

        run_parse_tests(reader, test_cases);
    }

    #[test]
    fn test_parse_program_and_remaining() {
        let values = Reader::basic()
            .parse_program(" (var x 1)\n(+ x 2) ")
            .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], val(vec![atom("+"), atom("x"), val(2)]));

        assert_eq!(Reader::basic().parse_program("").unwrap(), vec![]);
        assert!(matches!(
            Reader::basic().parse_program("(1) )"),
            Err(Error::Syntax(ParseError {
                kind: ParseErrorKind::TrailingContent,
                ..
            }))
        ));

        let (value, rest) = Reader::basic().parse("foo bar").unwrap();
        assert_eq!(value, atom("foo"));
        assert_eq!(rest, "bar");
    }

    #[test]
    fn test_literal_readers() {
        assert_eq!(read_float("3.14").unwrap(), "3.14".parse::<f64>().unwrap());
        assert_eq!(read_int("12").unwrap(), 12);
        assert!(matches!(read_int("i234"), Err(Error::Syntax(_))));
        assert!(matches!(read_int("12.5"), Err(Error::Syntax(_))));
        assert!(matches!(read_float("12"), Err(Error::Syntax(_))));
        assert_eq!(parse("3.14").unwrap(), Value::Float("3.14".parse().unwrap()));
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn test_reader_depth_limits() {
        let parens_under_limit = format!(
            "{}x{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let parens_at_limit = format!(
            "{}1{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );

        assert!(parse(&parens_under_limit).is_ok());
        assert!(matches!(
            parse(&parens_at_limit),
            Err(Error::Syntax(ParseError {
                kind: ParseErrorKind::TooDeeplyNested,
                ..
            }))
        ));
    }
}
