//! Toolkits: named collections of native callables.
//!
//! A toolkit is registered into an [`Environment`](crate::Environment) under its own
//! name and its members are reached with member syntax, `toolkit.member`, which the
//! extended reader reads as a single atom. Entries follow the ordinary native calling
//! convention; an entry may also be a deferred task, which runs whenever the member
//! is looked up or called without arguments.
//!
//! ```text
//! (time.parse-duration "1h30m")   ; #<duration:5400s>
//! (time.from-unix 0)              ; #<time:0.000000000>
//! (time.parse-time "2024-02-29T12:30:00Z")
//! time.now                        ; current instant, recomputed on every lookup
//! ```

use std::collections::HashMap;

use crate::Error;
use crate::ast::{NativeFunction, Value};
use crate::environment::Environment;
use crate::intooperation::IntoOperation;

#[derive(Debug, Clone)]
pub struct Toolkit {
    name: String,
    entries: HashMap<String, Value>,
}

impl Toolkit {
    pub fn new(name: impl Into<String>) -> Self {
        Toolkit {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// Add a native receiving its arguments unevaluated
    pub fn with_native<F>(mut self, member: &str, func: F) -> Self
    where
        F: Fn(&mut Environment, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        let native = NativeFunction::new(self.qualified(member), func);
        self.entries.insert(member.to_owned(), Value::Native(native));
        self
    }

    /// Add a strongly-typed Rust function, validated like
    /// [`Environment::register_operation`]
    pub fn with_operation<F, Args, R>(mut self, member: &str, func: F) -> Self
    where
        F: IntoOperation<Args, R> + 'static,
    {
        let native = func.into_native(&self.qualified(member));
        self.entries.insert(member.to_owned(), Value::Native(native));
        self
    }

    pub fn with_value(mut self, member: &str, value: Value) -> Self {
        self.entries.insert(member.to_owned(), value);
        self
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.entries.get(member)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Member names, sorted
    pub fn members(&self) -> Vec<&str> {
        let mut members: Vec<_> = self.entries.keys().map(String::as_str).collect();
        members.sort_unstable();
        members
    }

    fn qualified(&self, member: &str) -> String {
        format!("{}.{member}", self.name)
    }
}

#[cfg(feature = "time")]
pub use self::time::{parse_duration, parse_time, time_toolkit};

#[cfg(feature = "time")]
mod time {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use nom::branch::alt;
    use nom::bytes::complete::{tag, take_while_m_n};
    use nom::character::complete::{char, digit0, digit1, one_of};
    use nom::combinator::{all_consuming, map_res, opt, value};
    use nom::multi::many1;
    use nom::sequence::preceded;
    use nom::{IResult, Parser};

    use super::Toolkit;
    use crate::ast::{DeferredTask, Value};

    /// The `time` toolkit: `now`, `from-unix`, `parse-time` and `parse-duration`
    pub fn time_toolkit() -> Toolkit {
        Toolkit::new("time")
            .with_value(
                "now",
                Value::Deferred(DeferredTask::new(|_env| Ok(Value::Time(SystemTime::now())))),
            )
            .with_operation::<_, (i64,), SystemTime>("from-unix", from_unix)
            .with_operation::<_, (String,), SystemTime>("parse-time", |text: String| {
                parse_time(&text)
            })
            .with_operation::<_, (String,), Duration>("parse-duration", |text: String| {
                parse_duration(&text)
            })
    }

    fn from_unix(seconds: i64) -> Result<SystemTime, String> {
        let offset = Duration::from_secs(seconds.unsigned_abs());
        let instant = if seconds >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        instant.ok_or_else(|| format!("time out of range: {seconds}"))
    }

    const SECONDS_PER_DAY: i64 = 86_400;

    fn fixed_digits<'a>(count: usize) -> impl Fn(&'a str) -> IResult<&'a str, u32> {
        move |input: &'a str| {
            map_res(
                take_while_m_n(count, count, |c: char| c.is_ascii_digit()),
                |digits: &str| digits.parse::<u32>(),
            )
            .parse(input)
        }
    }

    struct Timestamp<'a> {
        date: (u32, u32, u32),
        clock: (u32, u32, u32),
        fraction: Option<&'a str>,
        offset_seconds: i64,
    }

    /// `Z`, `+hh:mm` or `-hh:mm`
    fn zone(input: &str) -> IResult<&str, i64> {
        alt((
            value(0, one_of("Zz")),
            map_res(
                (one_of("+-"), fixed_digits(2), char(':'), fixed_digits(2)),
                |(sign, hours, _, minutes)| {
                    if hours > 23 || minutes > 59 {
                        return Err("offset out of range");
                    }
                    let seconds = i64::from(hours * 3600 + minutes * 60);
                    Ok(if sign == '-' { -seconds } else { seconds })
                },
            ),
        ))
        .parse(input)
    }

    fn timestamp(input: &str) -> IResult<&str, Timestamp<'_>> {
        let (rest, (year, _, month, _, day, _, hour, _, minute, _, second, fraction, offset)) = (
            fixed_digits(4),
            char('-'),
            fixed_digits(2),
            char('-'),
            fixed_digits(2),
            one_of("Tt "),
            fixed_digits(2),
            char(':'),
            fixed_digits(2),
            char(':'),
            fixed_digits(2),
            opt(preceded(char('.'), digit1)),
            zone,
        )
            .parse(input)?;
        Ok((
            rest,
            Timestamp {
                date: (year, month, day),
                clock: (hour, minute, second),
                fraction,
                offset_seconds: offset,
            },
        ))
    }

    fn days_in_month(year: i64, month: u32) -> u32 {
        match month {
            2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// Days between 1970-01-01 and the given proleptic Gregorian date
    fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
        let year = if month <= 2 { year - 1 } else { year };
        let era = year.div_euclid(400);
        let year_of_era = year - era * 400;
        let month = i64::from(month);
        let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5
            + i64::from(day)
            - 1;
        let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
        era * 146_097 + day_of_era - 719_468
    }

    /// Parse an RFC 3339 timestamp such as `"2024-02-29T12:30:00Z"` or
    /// `"1999-12-31T23:59:59.5-05:00"`.
    pub fn parse_time(text: &str) -> Result<SystemTime, String> {
        let invalid = || format!("invalid time {text:?}");

        let (_, stamp) = all_consuming(timestamp).parse(text).map_err(|_| invalid())?;
        let (year, month, day) = stamp.date;
        let (hour, minute, second) = stamp.clock;
        let year = i64::from(year);
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(invalid());
        }

        let seconds = days_from_civil(year, month, day) * SECONDS_PER_DAY
            + i64::from(hour * 3600 + minute * 60 + second)
            - stamp.offset_seconds;
        // digits past nanosecond precision are dropped
        let nanos = match stamp.fraction {
            Some(digits) => {
                let digits = &digits[..digits.len().min(9)];
                let scale = 10_u32.pow(9 - digits.len() as u32);
                digits.parse::<u32>().map_err(|_| invalid())? * scale
            }
            None => 0,
        };

        let total = i128::from(seconds) * 1_000_000_000 + i128::from(nanos);
        let magnitude = total.unsigned_abs();
        let offset = Duration::new(
            u64::try_from(magnitude / NANOS_PER_SECOND).map_err(|_| invalid())?,
            (magnitude % NANOS_PER_SECOND) as u32,
        );
        let instant = if total >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        instant.ok_or_else(invalid)
    }

    const NANOS_PER_MICRO: u128 = 1_000;
    const NANOS_PER_MILLI: u128 = 1_000_000;
    const NANOS_PER_SECOND: u128 = 1_000_000_000;

    fn unit(input: &str) -> IResult<&str, u128> {
        alt((
            value(1_u128, tag("ns")),
            value(NANOS_PER_MICRO, alt((tag("us"), tag("µs"), tag("μs")))),
            value(NANOS_PER_MILLI, tag("ms")),
            value(NANOS_PER_SECOND, tag("s")),
            value(60 * NANOS_PER_SECOND, tag("m")),
            value(3600 * NANOS_PER_SECOND, tag("h")),
        ))
        .parse(input)
    }

    /// `digits[.digits]unit`; either side of the dot may be empty, not both
    fn component(input: &str) -> IResult<&str, (&str, Option<&str>, u128)> {
        (digit0, opt(preceded(char('.'), digit0)), unit).parse(input)
    }

    /// Parse a duration string such as `"300ms"`, `"1.5h"` or `"2h45m"`.
    ///
    /// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `"0"` needs
    /// no unit. Negative durations are rejected since they can't be represented.
    pub fn parse_duration(text: &str) -> Result<Duration, String> {
        let invalid = || format!("invalid duration {text:?}");

        let (rest, sign) = opt(one_of::<_, _, nom::error::Error<&str>>("+-"))
            .parse(text)
            .map_err(|_| invalid())?;
        if rest == "0" {
            return Ok(Duration::ZERO);
        }
        let (_, components) = all_consuming(many1(component))
            .parse(rest)
            .map_err(|_| invalid())?;

        let mut total: u128 = 0;
        for (whole, fraction, unit) in components {
            let fraction = fraction.unwrap_or("");
            if whole.is_empty() && fraction.is_empty() {
                return Err(invalid());
            }
            let whole: u128 = if whole.is_empty() {
                0
            } else {
                whole.parse().map_err(|_| invalid())?
            };
            // digits past nanosecond precision of the largest unit don't matter
            let fraction = &fraction[..fraction.len().min(18)];
            let fraction_nanos = if fraction.is_empty() {
                0
            } else {
                let digits: u128 = fraction.parse().map_err(|_| invalid())?;
                digits * unit / 10_u128.pow(fraction.len() as u32)
            };
            total = whole
                .checked_mul(unit)
                .and_then(|nanos| nanos.checked_add(fraction_nanos))
                .and_then(|nanos| total.checked_add(nanos))
                .ok_or_else(invalid)?;
        }

        if sign == Some('-') && total > 0 {
            return Err(format!("negative duration {text:?} is not supported"));
        }
        u64::try_from(total)
            .map(Duration::from_nanos)
            .map_err(|_| invalid())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::evaluator::{create_global_env, run};

    #[test]
    fn test_toolkit_builder() {
        let toolkit = Toolkit::new("math")
            .with_operation::<_, (i64,), i64>("double", |x: i64| x * 2)
            .with_native("arg-count", |_env, args| Ok(Value::Int(args.len() as i64)))
            .with_value("answer", Value::Int(42));

        assert_eq!(toolkit.name(), "math");
        assert_eq!(toolkit.len(), 3);
        assert_eq!(toolkit.members(), vec!["answer", "arg-count", "double"]);
        assert!(matches!(toolkit.get("double"), Some(Value::Native(n)) if n.id == "math.double"));
        assert!(toolkit.get("triple").is_none());

        let mut env = create_global_env();
        env.register_toolkit(toolkit);
        assert_eq!(run("(math.double 21)", &mut env).unwrap(), Value::Int(42));
        assert_eq!(run("(math.arg-count a b)", &mut env).unwrap(), Value::Int(2));
        assert_eq!(run("math.answer", &mut env).unwrap(), Value::Int(42));
        assert!(matches!(
            run("(math.double \"x\")", &mut env),
            Err(Error::TypeSign { .. })
        ));
        assert!(matches!(
            run("(math.triple 1)", &mut env),
            Err(Error::UnboundName(name)) if name == "math.triple"
        ));
    }

    #[cfg(feature = "time")]
    mod time {
        use super::*;
        use std::time::{Duration, SystemTime, UNIX_EPOCH};

        #[test]
        fn test_parse_duration_data_driven() {
            let test_cases = vec![
                ("0", Some(Duration::ZERO)),
                ("-0", Some(Duration::ZERO)),
                ("5s", Some(Duration::from_secs(5))),
                ("+5s", Some(Duration::from_secs(5))),
                ("250ms", Some(Duration::from_millis(250))),
                ("1.5s", Some(Duration::from_millis(1500))),
                (".5s", Some(Duration::from_millis(500))),
                ("1h30m", Some(Duration::from_secs(5400))),
                ("2h45m30.5s", Some(Duration::from_millis(9_930_500))),
                ("1.5h", Some(Duration::from_secs(5400))),
                ("10us", Some(Duration::from_micros(10))),
                ("10µs", Some(Duration::from_micros(10))),
                ("7ns", Some(Duration::from_nanos(7))),
                ("1m1ms", Some(Duration::from_millis(60_001))),
                ("", None),
                ("10", None),
                ("1x", None),
                ("s", None),
                (".s", None),
                ("1h 30m", None),
                ("-1s", None),
            ];

            for (i, (input, expected)) in test_cases.into_iter().enumerate() {
                let result = parse_duration(input);
                match expected {
                    Some(duration) => {
                        assert_eq!(result, Ok(duration), "Duration test #{} {input:?}", i + 1);
                    }
                    None => assert!(result.is_err(), "Duration test #{} {input:?}", i + 1),
                }
            }
        }

        #[test]
        fn test_parse_time_data_driven() {
            let at = |seconds: u64, millis: u64| {
                UNIX_EPOCH + Duration::from_secs(seconds) + Duration::from_millis(millis)
            };
            let test_cases = vec![
                ("1970-01-01T00:00:00Z", Some(UNIX_EPOCH)),
                ("1970-01-01t00:00:00z", Some(UNIX_EPOCH)),
                ("1970-01-01 00:00:00Z", Some(UNIX_EPOCH)),
                ("1970-01-01T01:00:00+01:00", Some(UNIX_EPOCH)),
                ("1969-12-31T19:00:00-05:00", Some(UNIX_EPOCH)),
                ("2024-02-29T12:30:00Z", Some(at(1_709_209_800, 0))),
                ("2000-01-01T00:00:00.25Z", Some(at(946_684_800, 250))),
                (
                    "2000-01-01T00:00:00.1234567891Z",
                    Some(at(946_684_800, 0) + Duration::from_nanos(123_456_789)),
                ),
                (
                    "1969-12-31T23:59:59.5Z",
                    Some(UNIX_EPOCH - Duration::from_millis(500)),
                ),
                ("2023-02-29T00:00:00Z", None),
                ("2024-13-01T00:00:00Z", None),
                ("2024-04-31T00:00:00Z", None),
                ("2024-01-01T24:00:00Z", None),
                ("2024-01-01T00:60:00Z", None),
                ("2024-01-01T00:00:00", None),
                ("2024-01-01T00:00:00+1:00", None),
                ("2024-01-01", None),
                ("24-01-01T00:00:00Z", None),
                ("2024-01-01T00:00:00.Z", None),
                ("2024-01-01T00:00:00Z trailing", None),
                ("", None),
            ];

            for (i, (input, expected)) in test_cases.into_iter().enumerate() {
                let result = parse_time(input);
                match expected {
                    Some(time) => {
                        assert_eq!(result, Ok(time), "Time test #{} {input:?}", i + 1);
                    }
                    None => assert!(result.is_err(), "Time test #{} {input:?}", i + 1),
                }
            }
        }

        #[test]
        fn test_time_toolkit() {
            let mut env = create_global_env();

            assert_eq!(
                run("(time.parse-duration \"1h30m\")", &mut env).unwrap(),
                Value::Duration(Duration::from_secs(5400))
            );
            let err = run("(time.parse-duration \"soon\")", &mut env).unwrap_err();
            assert!(err.to_string().contains("invalid duration \"soon\""), "{err}");

            assert_eq!(
                run("(time.from-unix 0)", &mut env).unwrap(),
                Value::Time(UNIX_EPOCH)
            );
            assert_eq!(
                run("(time.from-unix -60)", &mut env).unwrap(),
                Value::Time(UNIX_EPOCH - Duration::from_secs(60))
            );
            assert!(matches!(
                run("(time.from-unix 1.5)", &mut env),
                Err(Error::TypeSign { .. })
            ));
            assert_eq!(
                run("(time.parse-time \"1970-01-01T00:00:10Z\")", &mut env).unwrap(),
                Value::Time(UNIX_EPOCH + Duration::from_secs(10))
            );
            let err = run("(time.parse-time \"yesterday\")", &mut env).unwrap_err();
            assert!(err.to_string().contains("invalid time \"yesterday\""), "{err}");

            // durations and instants order like numbers
            let ordered = [
                "(< (time.parse-duration \"1m\") (time.parse-duration \"90s\"))",
                "(< (time.from-unix 1) (time.from-unix 2))",
                "(< (time.from-unix 0) (time.parse-time \"2024-02-29T12:30:00Z\"))",
                "(== (time.parse-time \"1970-01-01T01:00:00+01:00\") (time.from-unix 0))",
                "(== (time.parse-duration \"60m\") (time.parse-duration \"1h\"))",
            ];
            for source in ordered {
                assert_eq!(run(source, &mut env).unwrap(), Value::Bool(true), "{source}");
            }
        }

        #[test]
        fn test_now_is_deferred() {
            let mut env = create_global_env();
            let before = SystemTime::now();
            let looked_up = run("time.now", &mut env).unwrap();
            let called = run("(time.now)", &mut env).unwrap();
            let after = SystemTime::now();

            for value in [looked_up, called] {
                match value {
                    Value::Time(t) => assert!(before <= t && t <= after),
                    other => panic!("expected a time, got {other:?}"),
                }
            }
            assert!(run("(time.now 1)", &mut env).is_err());
        }
    }
}
