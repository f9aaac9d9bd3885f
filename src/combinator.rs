//! Small backtracking parser combinators shared by the reader and the argument binder.
//!
//! Parsers are plain functions or closures of the shape `Fn(I) -> PResult<I, O, E>`. The
//! input is a cheap cursor passed by value, so a failed alternative simply drops the
//! cursor it advanced and the caller retries from the one it still holds. Two inputs are
//! provided: [`Span`] walks characters of source text and [`Cursor`] walks a slice (the
//! reader uses the former, the binder and the operators use the latter over evaluated
//! arguments).
//!
//! Failures come in two strengths. [`Fail::Backtrack`] lets [`or`], [`opt`] and [`many`]
//! try something else; [`Fail::Cut`] means the input was recognised and is broken, so the
//! error travels straight to the caller.

/// A recoverable or committed parse failure
#[derive(Debug, Clone, PartialEq)]
pub enum Fail<E> {
    Backtrack(E),
    Cut(E),
}

impl<E> Fail<E> {
    pub fn into_inner(self) -> E {
        match self {
            Fail::Backtrack(e) | Fail::Cut(e) => e,
        }
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, Fail::Cut(_))
    }

    pub fn map<F, E2>(self, f: F) -> Fail<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Fail::Backtrack(e) => Fail::Backtrack(f(e)),
            Fail::Cut(e) => Fail::Cut(f(e)),
        }
    }
}

pub type PResult<I, O, E> = Result<(I, O), Fail<E>>;

/// An input cursor
pub trait Stream: Clone {
    type Item;

    /// Next item and the cursor after it
    fn uncons(&self) -> Option<(Self::Item, Self)>;
    /// Absolute position, used to detect parsers that make no progress
    fn position(&self) -> usize;
    fn remaining(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Errors the generic combinators need to be able to build
pub trait StreamError<I>: Sized {
    /// More input was required at `at`
    fn end_of_input(at: &I) -> Self;
    /// Input was left over at `at` where the end was required
    fn trailing_input(at: &I) -> Self;
    /// The item at `at` was not accepted
    fn unexpected(at: &I) -> Self;
}

/// Character cursor over source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Span<'a> {
    pub fn new(source: &'a str) -> Self {
        Span { source, offset: 0 }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Text not consumed yet
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    /// Cursor positioned at `rest`, which must be a suffix of the source
    pub fn at_rest(&self, rest: &'a str) -> Self {
        Span {
            source: self.source,
            offset: self.source.len() - rest.len(),
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }
}

impl Stream for Span<'_> {
    type Item = char;

    fn uncons(&self) -> Option<(char, Self)> {
        let c = self.peek()?;
        Some((
            c,
            Span {
                source: self.source,
                offset: self.offset + c.len_utf8(),
            },
        ))
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.source.len() - self.offset
    }
}

/// Cursor over a slice of items
#[derive(Debug, PartialEq)]
pub struct Cursor<'a, T> {
    items: &'a [T],
    pos: usize,
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<'a, T> Cursor<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Cursor { items, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a T> {
        self.items.get(self.pos)
    }

    /// Items not consumed yet
    pub fn rest(&self) -> &'a [T] {
        &self.items[self.pos..]
    }
}

impl<'a, T> Stream for Cursor<'a, T> {
    type Item = &'a T;

    fn uncons(&self) -> Option<(&'a T, Self)> {
        let item = self.items.get(self.pos)?;
        Some((
            item,
            Cursor {
                items: self.items,
                pos: self.pos + 1,
            },
        ))
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.items.len() - self.pos
    }
}

/// Take one item, whatever it is
pub fn any<I, E>(input: I) -> PResult<I, I::Item, E>
where
    I: Stream,
    E: StreamError<I>,
{
    match input.uncons() {
        Some((item, rest)) => Ok((rest, item)),
        None => Err(Fail::Backtrack(E::end_of_input(&input))),
    }
}

/// Take one item matching `pred`
pub fn satisfy<I, E, F>(pred: F) -> impl Fn(I) -> PResult<I, I::Item, E>
where
    I: Stream,
    E: StreamError<I>,
    F: Fn(&I::Item) -> bool,
{
    move |input: I| match input.uncons() {
        Some((item, rest)) if pred(&item) => Ok((rest, item)),
        Some(_) => Err(Fail::Backtrack(E::unexpected(&input))),
        None => Err(Fail::Backtrack(E::end_of_input(&input))),
    }
}

/// Take one item and convert it, failing (recoverably) with the converter's error
pub fn satisfy_map<I, O, E, F>(f: F) -> impl Fn(I) -> PResult<I, O, E>
where
    I: Stream,
    E: StreamError<I>,
    F: Fn(I::Item) -> Result<O, E>,
{
    move |input: I| match input.uncons() {
        Some((item, rest)) => f(item).map(|out| (rest, out)).map_err(Fail::Backtrack),
        None => Err(Fail::Backtrack(E::end_of_input(&input))),
    }
}

/// Succeed only at the end of input
pub fn eof<I, E>(input: I) -> PResult<I, (), E>
where
    I: Stream,
    E: StreamError<I>,
{
    if input.is_empty() {
        Ok((input, ()))
    } else {
        Err(Fail::Backtrack(E::trailing_input(&input)))
    }
}

pub fn map<I, O, O2, E, P, F>(parser: P, f: F) -> impl Fn(I) -> PResult<I, O2, E>
where
    P: Fn(I) -> PResult<I, O, E>,
    F: Fn(O) -> O2,
{
    move |input: I| parser(input).map(|(rest, out)| (rest, f(out)))
}

/// Run `parser`, then the parser `f` builds from its output
pub fn bind<I, O, O2, E, P, F, Q>(parser: P, f: F) -> impl Fn(I) -> PResult<I, O2, E>
where
    P: Fn(I) -> PResult<I, O, E>,
    F: Fn(O) -> Q,
    Q: Fn(I) -> PResult<I, O2, E>,
{
    move |input: I| {
        let (rest, out) = parser(input)?;
        f(out)(rest)
    }
}

pub fn pair<I, O1, O2, E, P1, P2>(first: P1, second: P2) -> impl Fn(I) -> PResult<I, (O1, O2), E>
where
    P1: Fn(I) -> PResult<I, O1, E>,
    P2: Fn(I) -> PResult<I, O2, E>,
{
    move |input: I| {
        let (rest, a) = first(input)?;
        let (rest, b) = second(rest)?;
        Ok((rest, (a, b)))
    }
}

pub fn preceded<I, O1, O2, E, P1, P2>(first: P1, second: P2) -> impl Fn(I) -> PResult<I, O2, E>
where
    P1: Fn(I) -> PResult<I, O1, E>,
    P2: Fn(I) -> PResult<I, O2, E>,
{
    move |input: I| {
        let (rest, _) = first(input)?;
        second(rest)
    }
}

pub fn terminated<I, O1, O2, E, P1, P2>(first: P1, second: P2) -> impl Fn(I) -> PResult<I, O1, E>
where
    P1: Fn(I) -> PResult<I, O1, E>,
    P2: Fn(I) -> PResult<I, O2, E>,
{
    move |input: I| {
        let (rest, out) = first(input)?;
        let (rest, _) = second(rest)?;
        Ok((rest, out))
    }
}

pub fn between<I, O1, O, O2, E, L, P, R>(
    open: L,
    parser: P,
    close: R,
) -> impl Fn(I) -> PResult<I, O, E>
where
    L: Fn(I) -> PResult<I, O1, E>,
    P: Fn(I) -> PResult<I, O, E>,
    R: Fn(I) -> PResult<I, O2, E>,
{
    move |input: I| {
        let (rest, _) = open(input)?;
        let (rest, out) = parser(rest)?;
        let (rest, _) = close(rest)?;
        Ok((rest, out))
    }
}

/// Zero or one; only a backtracking failure turns into `None`
pub fn opt<I, O, E, P>(parser: P) -> impl Fn(I) -> PResult<I, Option<O>, E>
where
    I: Clone,
    P: Fn(I) -> PResult<I, O, E>,
{
    move |input: I| match parser(input.clone()) {
        Ok((rest, out)) => Ok((rest, Some(out))),
        Err(Fail::Backtrack(_)) => Ok((input, None)),
        Err(cut) => Err(cut),
    }
}

/// Zero or more, stopping at the first backtracking failure or at a match
/// that consumed nothing
pub fn many<I, O, E, P>(parser: P) -> impl Fn(I) -> PResult<I, Vec<O>, E>
where
    I: Stream,
    P: Fn(I) -> PResult<I, O, E>,
{
    move |mut input: I| {
        let mut items = Vec::new();
        loop {
            match parser(input.clone()) {
                Ok((rest, out)) => {
                    let progressed = rest.position() != input.position();
                    items.push(out);
                    input = rest;
                    if !progressed {
                        return Ok((input, items));
                    }
                }
                Err(Fail::Backtrack(_)) => return Ok((input, items)),
                Err(cut) => return Err(cut),
            }
        }
    }
}

pub fn many1<I, O, E, P>(parser: P) -> impl Fn(I) -> PResult<I, Vec<O>, E>
where
    I: Stream,
    P: Fn(I) -> PResult<I, O, E>,
{
    move |input: I| {
        let (mut input, first) = parser(input)?;
        let mut items = vec![first];
        loop {
            match parser(input.clone()) {
                Ok((rest, out)) => {
                    let progressed = rest.position() != input.position();
                    items.push(out);
                    input = rest;
                    if !progressed {
                        return Ok((input, items));
                    }
                }
                Err(Fail::Backtrack(_)) => return Ok((input, items)),
                Err(cut) => return Err(cut),
            }
        }
    }
}

/// Items of `parser` until `end` matches. A failing item reports its own error,
/// which is what makes `many_till(item, eof)` name the first bad element.
pub fn many_till<I, O, O2, E, P, T>(parser: P, end: T) -> impl Fn(I) -> PResult<I, Vec<O>, E>
where
    I: Stream,
    P: Fn(I) -> PResult<I, O, E>,
    T: Fn(I) -> PResult<I, O2, E>,
{
    move |mut input: I| {
        let mut items = Vec::new();
        loop {
            match end(input.clone()) {
                Ok((rest, _)) => return Ok((rest, items)),
                Err(Fail::Backtrack(_)) => {
                    let (rest, out) = parser(input)?;
                    items.push(out);
                    input = rest;
                }
                Err(cut) => return Err(cut),
            }
        }
    }
}

/// Try `first`; on a backtracking failure try `second` from the same input
pub fn or<I, O, E, P1, P2>(first: P1, second: P2) -> impl Fn(I) -> PResult<I, O, E>
where
    I: Clone,
    P1: Fn(I) -> PResult<I, O, E>,
    P2: Fn(I) -> PResult<I, O, E>,
{
    move |input: I| match first(input.clone()) {
        Err(Fail::Backtrack(_)) => second(input),
        result => result,
    }
}

/// Ordered choice over any number of parsers; the last failure is reported
#[macro_export]
macro_rules! choice {
    ($p:expr $(,)?) => { $p };
    ($p:expr, $($rest:expr),+ $(,)?) => {
        $crate::combinator::or($p, $crate::choice!($($rest),+))
    };
}

/// Boxed parser, for sequences assembled at run time
pub type BoxedParser<'p, I, O, E> = Box<dyn Fn(I) -> PResult<I, O, E> + 'p>;

/// Run every parser in order, collecting their outputs
pub fn sequence<'p, I, O, E>(
    parsers: Vec<BoxedParser<'p, I, O, E>>,
) -> impl Fn(I) -> PResult<I, Vec<O>, E> + 'p
where
    I: 'p,
    O: 'p,
    E: 'p,
{
    move |mut input: I| {
        let mut outputs = Vec::with_capacity(parsers.len());
        for parser in &parsers {
            let (rest, out) = parser(input)?;
            outputs.push(out);
            input = rest;
        }
        Ok((input, outputs))
    }
}

/// Commit: a backtracking failure of `parser` becomes a cut
pub fn cut<I, O, E, P>(parser: P) -> impl Fn(I) -> PResult<I, O, E>
where
    P: Fn(I) -> PResult<I, O, E>,
{
    move |input: I| match parser(input) {
        Err(Fail::Backtrack(e)) => Err(Fail::Cut(e)),
        result => result,
    }
}

/// Lift a `nom` lexeme over `&str` into a parser over [`Span`]. A nom `Failure`
/// becomes a cut; the error is located where nom stopped.
pub fn lex<'a, T, E, F>(lexeme: F) -> impl Fn(Span<'a>) -> PResult<Span<'a>, T, E>
where
    E: StreamError<Span<'a>>,
    F: Fn(&'a str) -> nom::IResult<&'a str, T>,
{
    move |input: Span<'a>| match lexeme(input.rest()) {
        Ok((rest, out)) => Ok((input.at_rest(rest), out)),
        Err(nom::Err::Incomplete(_)) => Err(Fail::Backtrack(E::end_of_input(&input))),
        Err(nom::Err::Error(e)) => Err(Fail::Backtrack(E::unexpected(&input.at_rest(e.input)))),
        Err(nom::Err::Failure(e)) => Err(Fail::Cut(E::unexpected(&input.at_rest(e.input)))),
    }
}
