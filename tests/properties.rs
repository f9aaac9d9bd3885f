//! End-to-end behavior through the public API only.
#![expect(clippy::unwrap_used)] // test code OK

use kitlisp::binder::Signature;
use kitlisp::reader::{read_float, read_int};
use kitlisp::{Environment, Error, Value, create_global_env, parse, run};

fn eval_source(source: &str) -> Result<Value, Error> {
    let mut env = create_global_env();
    run(source, &mut env)
}

fn assert_float(value: Value, expected: f64) {
    match value {
        Value::Float(actual) => assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        ),
        other => panic!("expected a float near {expected}, got {other:?}"),
    }
}

#[test]
fn numeric_literals_read_back() {
    assert_eq!(parse("12").unwrap(), Value::Int(12));
    assert_eq!(read_int("12").unwrap(), 12);
    assert_eq!(parse("3.14").unwrap(), Value::Float(314.0 / 100.0));
    assert_eq!(read_float("3.14").unwrap(), 314.0 / 100.0);

    assert!(matches!(read_int("i234"), Err(Error::Syntax(_))));
    assert!(matches!(read_float("i234"), Err(Error::Syntax(_))));
    // an all-digit token is never an atom name
    assert!(matches!(parse("'123"), Err(Error::Syntax(_))));
}

#[test]
fn arithmetic_promotes_only_when_needed() {
    assert_eq!(eval_source("(+ 0 1 2 3 4 5 6)").unwrap(), Value::Int(21));
    assert_float(eval_source("(+ 0 1 2 3.14 4 5 6)").unwrap(), 21.14);
    assert_float(eval_source("(* 1 2 3.14 4 5 6)").unwrap(), 753.6);
    assert_eq!(eval_source("(* 2 3 4 5 6)").unwrap(), Value::Int(720));
}

#[test]
fn arithmetic_folds_left() {
    // (10 - 4) - 3, not 10 - (4 - 3)
    assert_eq!(eval_source("(- 10 4 3)").unwrap(), Value::Int(3));
    // (64 / 8) / 2, not 64 / (8 / 2)
    assert_eq!(eval_source("(/ 64 8 2)").unwrap(), Value::Int(4));
    assert_float(eval_source("(- 10.0 4 3)").unwrap(), 3.0);
}

#[test]
fn binder_reports_type_and_arity_mismatches() {
    let mut env = create_global_env();
    run("(var f (lambda (a::int b::string) b))", &mut env).unwrap();

    match run("(f 1 2)", &mut env) {
        Err(Error::TypeSign {
            formal,
            expected,
            actual,
        }) => {
            assert_eq!(formal, "b");
            assert_eq!(expected.to_string(), "string");
            assert_eq!(actual, Value::Int(2));
        }
        other => panic!("expected a TypeSignError, got {other:?}"),
    }

    assert!(matches!(
        run("(f 1 \"two\" 3)", &mut env),
        Err(Error::ArityError { got: 3, .. })
    ));
    assert_eq!(run("(f 1 \"two\")", &mut env).unwrap(), Value::from("two"));
}

#[test]
fn variadic_formals_accept_any_count() {
    let signature = Signature::parse("(head::int ...)").unwrap();
    assert!(signature.is_variadic());
    assert!(signature.check(&[Value::Int(1)]).is_ok());
    assert!(
        signature
            .check(&[Value::Int(1), Value::from("a"), Value::Float(2.5), Value::Int(3)])
            .is_ok()
    );
    assert!(signature.check(&[]).is_err());

    let rest = Signature::parse("(...)").unwrap();
    assert!(rest.check(&[]).is_ok());
    assert!(rest.check(&[Value::Int(1), Value::Int(2)]).is_ok());

    assert_eq!(
        eval_source("((lambda (...) ...) 1 2 3)").unwrap(),
        Value::from([1, 2, 3])
    );
    assert_eq!(
        eval_source("((lambda (...) ...))").unwrap(),
        Value::List(vec![])
    );
}

#[test]
fn closures_fail_fast_on_unresolved_names() {
    let mut env = create_global_env();
    match run("(var f (lambda (x) (+ x y)))", &mut env) {
        Err(Error::UnboundName(name)) => assert_eq!(name, "y"),
        other => panic!("expected an unbound name, got {other:?}"),
    }
    // construction failed, so nothing was defined
    assert!(matches!(run("f", &mut env), Err(Error::UnboundName(_))));

    // formals and local bindings are fine
    run(
        "(var g (lambda (x) (let ((y 1)) (var z 2) (+ x y z))))",
        &mut env,
    )
    .unwrap();
    assert_eq!(run("(g 3)", &mut env).unwrap(), Value::Int(6));
}

#[test]
fn closures_are_independent_of_the_call_site() {
    let mut env = create_global_env();
    run("(var base 100)", &mut env).unwrap();
    run("(var f (lambda (x) (+ x base)))", &mut env).unwrap();
    let result = run("(let ((base 0)) (f 1))", &mut env).unwrap();
    assert_eq!(result, Value::Int(101));
}

#[test]
fn option_comparators_treat_nil_as_false() {
    let cases = [
        "(<? nil 1)",
        "(<? 1 nil)",
        "(<? nil nil)",
        "(>? nil 1)",
        "(<=? nil 1)",
        "(>=? 1 nil)",
        "(==? nil 1)",
        "(==? nil nil)",
        "(!=? nil 1)",
    ];
    for source in cases {
        assert_eq!(eval_source(source).unwrap(), Value::Bool(false), "{source}");
    }
    assert!(eval_source("(< nil 1)").is_err());
}

#[test]
fn lists_order_lexicographically() {
    assert_eq!(eval_source("(< '(1 2) '(1 3))").unwrap(), Value::Bool(true));
    assert_eq!(eval_source("(< '(1 2) '(1 2 3))").unwrap(), Value::Bool(true));
    assert_eq!(eval_source("(< '(1 2 3) '(1 2))").unwrap(), Value::Bool(false));
    assert_eq!(eval_source("(cmp '(1 2) '(1 2 3))").unwrap(), Value::Int(-1));

    // the first differing element decides; length only breaks a tie on the common prefix
    assert_eq!(eval_source("(< '(2) '(1 5))").unwrap(), Value::Bool(false));
    assert_eq!(eval_source("(> '(2) '(1 5))").unwrap(), Value::Bool(true));
    assert_eq!(eval_source("(cmp '(2) '(1 5))").unwrap(), Value::Int(1));
    assert_eq!(eval_source("(< '(1 5) '(2))").unwrap(), Value::Bool(true));
}

#[test]
fn three_way_compare() {
    assert_eq!(eval_source("(cmp 1 2)").unwrap(), Value::Int(-1));
    assert_eq!(eval_source("(cmp 2 1)").unwrap(), Value::Int(1));
    assert_eq!(eval_source("(cmp \"x\" \"x\")").unwrap(), Value::Int(0));
    assert!(matches!(
        eval_source("(cmp 1 '(1))"),
        Err(Error::ComparisonUndefined { .. })
    ));
}

#[test]
fn reader_resolves_registered_type_aliases() {
    use kitlisp::types::{Kind, TypeDescriptor};

    let mut env = create_global_env();
    env.define_type("count", TypeDescriptor::new(Kind::Int));
    run("(var inc (lambda (n::count) (+ n 1)))", &mut env).unwrap();
    assert_eq!(run("(inc 41)", &mut env).unwrap(), Value::Int(42));
    assert!(matches!(
        run("(inc \"x\")", &mut env),
        Err(Error::TypeSign { .. })
    ));

    // the basic reader knows only the built-in type names
    assert!(matches!(parse("n::count"), Err(Error::Syntax(_))));
    assert!(matches!(
        run("(var m::nothing 1)", &mut env),
        Err(Error::Syntax(_))
    ));
}

#[test]
fn independent_environments_share_nothing() {
    let handles: Vec<_> = (0..4_i64)
        .map(|n| {
            std::thread::spawn(move || {
                let mut env: Environment = create_global_env();
                run(&format!("(var x {n}) (set x (* x 10)) x"), &mut env)
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().unwrap(), Value::Int(n as i64 * 10));
    }
}
