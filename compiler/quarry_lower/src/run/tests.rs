use pretty_assertions::assert_eq;
use quarry_ir::{CombinatorChain, StringInterner, Ty};

use super::{run, run_with_captures, Captures, RunError, Value};
use crate::testing::QueryBuilder;
use crate::{Lower, LowerConfig, RestrictionPolicy};

fn unique() -> LowerConfig {
    LowerConfig::new(RestrictionPolicy::RequireGlobalNameUniqueness)
}

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::str(s)).collect())
}

fn ints(items: &[i64]) -> Value {
    Value::List(items.iter().copied().map(Value::Int).collect())
}

#[test]
fn parses_and_keeps_successes() {
    // from s in strings where TryParse(s, out i) select i
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let test = q.try_parse(s, "i");
    q.filter(test);
    let i = q.ident("i");
    q.select(i, Ty::Int);
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let mut captures = Captures::default();
    captures.insert(interner.intern("strings"), strings(&["1", "x", "2"]));
    let out = run(&lowered, &captures, &interner).unwrap();
    assert_eq!(out, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn tagged_outcome_round_trips_payload() {
    // from o in objects where o is string? s select s
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("objects");
    q.source("o", src, Ty::Object);
    let o = q.ident("o");
    let test = q.is_type(o, Ty::nullable(Ty::Str), "s");
    q.filter(test);
    let s = q.ident("s");
    q.select(s, Ty::nullable(Ty::Str));
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let mut captures = Captures::default();
    captures.insert(
        interner.intern("objects"),
        Value::List(vec![Value::str("a"), Value::Int(3), Value::Null, Value::str("b")]),
    );
    let out = run(&lowered, &captures, &interner).unwrap();
    assert_eq!(out, vec![Value::str("a"), Value::str("b")]);
}

#[test]
fn generator_crosses_elements() {
    // from x in xs from y in ys select (x, y)
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let ys = q.ident("ys");
    q.from("y", ys, Ty::Int);
    let x = q.ident("x");
    let y = q.ident("y");
    let pair = q.tuple([x, y]);
    q.select(pair, Ty::Tuple(vec![Ty::Int, Ty::Int]));
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let mut captures = Captures::default();
    captures.insert(interner.intern("xs"), ints(&[1, 2]));
    captures.insert(interner.intern("ys"), ints(&[10]));
    let out = run(&lowered, &captures, &interner).unwrap();
    assert_eq!(
        out,
        vec![
            Value::Tuple(vec![Value::Int(1), Value::Int(10)]),
            Value::Tuple(vec![Value::Int(2), Value::Int(10)]),
        ]
    );
}

#[test]
fn assignments_to_captures_run_element_at_a_time() {
    // from x in xs where (last = x) > 1 select last
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let x = q.ident("x");
    let assign = q.assign("last", x);
    let one = q.int(1);
    let test = q.gt(assign, one);
    q.filter(test);
    let last = q.ident("last");
    q.select(last, Ty::Int);
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let mut captures = Captures::default();
    captures.insert(interner.intern("xs"), ints(&[1, 2, 3]));
    captures.insert(interner.intern("last"), Value::Int(0));
    let (out, after) = run_with_captures(&lowered, captures, &interner).unwrap();
    assert_eq!(out, vec![Value::Int(2), Value::Int(3)]);
    assert_eq!(after.get(&interner.intern("last")), Some(&Value::Int(3)));
}

#[test]
fn unbound_capture_is_reported() {
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let x = q.ident("x");
    q.select(x, Ty::Int);
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let err = run(&lowered, &Captures::default(), &interner).unwrap_err();
    assert_eq!(err, RunError::UnboundVariable("xs".to_string()));
}

#[test]
fn non_list_source_is_not_a_sequence() {
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.int(5);
    q.source("x", src, Ty::Int);
    let x = q.ident("x");
    q.select(x, Ty::Int);
    let lowered = q.build().unwrap().lower(&unique(), &interner).unwrap();

    let err = run(&lowered, &Captures::default(), &interner).unwrap_err();
    assert_eq!(err, RunError::NotASequence(Value::Int(5)));
    assert_eq!(err.to_string(), "5 is not a sequence");
}

#[test]
fn type_tests_never_match_null() {
    assert!(!Value::Null.has_type(&Ty::Object));
    assert!(!Value::Null.has_type(&Ty::nullable(Ty::Str)));
    assert!(Value::str("a").has_type(&Ty::nullable(Ty::Str)));
    assert!(Value::Tuple(vec![Value::Int(1), Value::Bool(true)])
        .has_type(&Ty::Tuple(vec![Ty::Int, Ty::Bool])));
    assert!(!Value::Int(1).has_type(&Ty::Str));
}

/// `from v in values where v is int i || <rest> select v`
fn failed_type_test_then(interner: &StringInterner, assign: bool) -> CombinatorChain {
    let mut q = QueryBuilder::new(interner);
    let src = q.ident("values");
    q.source("v", src, Ty::Object);
    let v = q.ident("v");
    let test = q.is_type(v, Ty::Int, "i");
    let i = if assign {
        let one = q.int(1);
        q.assign("i", one)
    } else {
        q.ident("i")
    };
    let zero = q.int(0);
    let positive = q.gt(i, zero);
    let either = q.or(test, positive);
    q.filter(either);
    let v = q.ident("v");
    q.select(v, Ty::Object);
    q.build().unwrap().lower(&unique(), interner).unwrap()
}

#[test]
fn pattern_variable_never_reads_a_capture_of_the_same_name() {
    let interner = StringInterner::new();
    let lowered = failed_type_test_then(&interner, false);

    let mut captures = Captures::default();
    captures.insert(interner.intern("values"), strings(&["x"]));
    captures.insert(interner.intern("i"), Value::Int(5));
    let err = run(&lowered, &captures, &interner).unwrap_err();
    assert_eq!(err, RunError::UnboundVariable("i".to_string()));
}

#[test]
fn pattern_variable_never_writes_a_capture_of_the_same_name() {
    let interner = StringInterner::new();
    let lowered = failed_type_test_then(&interner, true);

    let mut captures = Captures::default();
    captures.insert(interner.intern("values"), strings(&["x"]));
    captures.insert(interner.intern("i"), Value::Int(5));
    let err = run_with_captures(&lowered, captures, &interner).unwrap_err();
    assert_eq!(err, RunError::UnboundVariable("i".to_string()));

    // A matching element binds the variable locally and passes.
    let mut captures = Captures::default();
    captures.insert(interner.intern("values"), ints(&[3]));
    captures.insert(interner.intern("i"), Value::Int(5));
    let (out, after) = run_with_captures(&lowered, captures, &interner).unwrap();
    assert_eq!(out, vec![Value::Int(3)]);
    assert_eq!(after.get(&interner.intern("i")), Some(&Value::Int(5)));
}
