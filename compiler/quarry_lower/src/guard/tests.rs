use pretty_assertions::assert_eq;
use quarry_diagnostic::ErrorCode;
use quarry_ir::{StringInterner, Ty};

use super::check;
use crate::flow::analyze;
use crate::testing::QueryBuilder;
use crate::{ChainErrors, ClauseChain, LowerError, RestrictionPolicy};

const DISALLOW: RestrictionPolicy = RestrictionPolicy::DisallowPatternVariablesInClauses;
const UNIQUE: RestrictionPolicy = RestrictionPolicy::RequireGlobalNameUniqueness;

fn guard(
    chain: &ClauseChain,
    interner: &StringInterner,
    policy: RestrictionPolicy,
) -> Result<(), ChainErrors> {
    let flow = analyze(chain, interner).unwrap();
    check(chain, &flow, policy, interner)
}

fn codes(errors: &ChainErrors) -> Vec<ErrorCode> {
    errors.errors().iter().map(LowerError::error_code).collect()
}

/// `from s in strings where TryParse(s, out i) select i`
fn propagating_chain(interner: &StringInterner) -> ClauseChain {
    let mut q = QueryBuilder::new(interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let test = q.try_parse(s, "i");
    q.filter(test);
    let i = q.ident("i");
    q.select(i, Ty::Int);
    q.build().unwrap()
}

/// `from s in strings where TryParse(s, out i) from t in ts where TryParse(t, out i) select t`
fn reused_name_chain(interner: &StringInterner) -> ClauseChain {
    let mut q = QueryBuilder::new(interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let first = q.try_parse(s, "i");
    q.filter(first);
    let ts = q.ident("ts");
    q.from("t", ts, Ty::Str);
    let t = q.ident("t");
    let second = q.try_parse(t, "i");
    q.filter(second);
    let t = q.ident("t");
    q.select(t, Ty::Str);
    q.build().unwrap()
}

#[test]
fn disallow_rejects_use_after_introducing_clause() {
    let interner = StringInterner::new();
    let chain = propagating_chain(&interner);

    let errors = guard(&chain, &interner, DISALLOW).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4003]);
    match errors.first() {
        LowerError::PatternVariableScopeViolation {
            clause,
            name,
            policy,
            ..
        } => {
            assert_eq!(*clause, 2);
            assert_eq!(name, "i");
            assert_eq!(*policy, DISALLOW);
        }
        other => panic!("expected scope violation, got {other:?}"),
    }
}

#[test]
fn unique_allows_propagation() {
    let interner = StringInterner::new();
    let chain = propagating_chain(&interner);
    assert_eq!(guard(&chain, &interner, UNIQUE), Ok(()));
}

#[test]
fn disallow_accepts_reused_names_confined_to_their_clauses() {
    let interner = StringInterner::new();
    let chain = reused_name_chain(&interner);
    assert_eq!(guard(&chain, &interner, DISALLOW), Ok(()));
}

#[test]
fn unique_rejects_reused_pattern_names() {
    let interner = StringInterner::new();
    let chain = reused_name_chain(&interner);

    let errors = guard(&chain, &interner, UNIQUE).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4003]);
    assert_eq!(errors.first().clause(), 3);
    assert_eq!(errors.first().variable(), Some("i"));
}

#[test]
fn rebinding_a_range_variable_is_rejected() {
    // from x in xs from x in ys select x
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let ys = q.ident("ys");
    q.from("x", ys, Ty::Int);
    let x = q.ident("x");
    q.select(x, Ty::Int);
    let chain = q.build().unwrap();

    let errors = guard(&chain, &interner, DISALLOW).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4006]);
    assert_eq!(errors.first().clause(), 1);
}

#[test]
fn pattern_variable_cannot_reuse_a_range_variable_name() {
    // from s in strings where TryParse(s, out s) select 0
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let test = q.try_parse(s, "s");
    q.filter(test);
    let zero = q.int(0);
    q.select(zero, Ty::Int);
    let chain = q.build().unwrap();

    let errors = guard(&chain, &interner, DISALLOW).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4006]);
}

#[test]
fn range_variable_cannot_shadow_propagated_pattern_variable() {
    // from s in strings where TryParse(s, out i) let i = 0 select i
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let test = q.try_parse(s, "i");
    q.filter(test);
    let zero = q.int(0);
    q.let_("i", zero, Ty::Int);
    let i = q.ident("i");
    q.select(i, Ty::Int);
    let chain = q.build().unwrap();

    let errors = guard(&chain, &interner, UNIQUE).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4006]);
    assert_eq!(errors.first().clause(), 2);

    // Under the baseline policy the pattern variable is already out of scope.
    assert_eq!(guard(&chain, &interner, DISALLOW), Ok(()));
}

#[test]
fn assignment_within_introducing_clause_is_allowed() {
    // from s in strings where TryParse(s, out i) && (i = i + 1) > 0 select s
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let parse = q.try_parse(s, "i");
    let i = q.ident("i");
    let one = q.int(1);
    let inc = q.add(i, one);
    let assign = q.assign("i", inc);
    let zero = q.int(0);
    let positive = q.gt(assign, zero);
    let test = q.and(parse, positive);
    q.filter(test);
    let s = q.ident("s");
    q.select(s, Ty::Str);
    let chain = q.build().unwrap();

    assert_eq!(guard(&chain, &interner, DISALLOW), Ok(()));
}

#[test]
fn assignment_ahead_of_declaration_is_read_only() {
    // from s in strings where (i = 7) > 0 && TryParse(s, out i) select s
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let seven = q.int(7);
    let assign = q.assign("i", seven);
    let span = q.span_of(assign);
    let zero = q.int(0);
    let positive = q.gt(assign, zero);
    let s = q.ident("s");
    let parse = q.try_parse(s, "i");
    let test = q.and(positive, parse);
    q.filter(test);
    let s = q.ident("s");
    q.select(s, Ty::Str);
    let chain = q.build().unwrap();

    for policy in [DISALLOW, UNIQUE] {
        let errors = guard(&chain, &interner, policy).unwrap_err();
        assert_eq!(
            errors.errors(),
            &[LowerError::ReadOnlyAssignment {
                clause: 1,
                name: "i".to_string(),
                span,
            }]
        );
    }
}

#[test]
fn assignment_to_range_variable_is_read_only() {
    // from x in xs select (x = 1)
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let one = q.int(1);
    let assign = q.assign("x", one);
    let span = q.span_of(assign);
    q.select(assign, Ty::Int);
    let chain = q.build().unwrap();

    let errors = guard(&chain, &interner, DISALLOW).unwrap_err();
    assert_eq!(
        errors.errors(),
        &[LowerError::ReadOnlyAssignment {
            clause: 1,
            name: "x".to_string(),
            span,
        }]
    );
}

#[test]
fn assignment_to_propagated_pattern_variable_is_read_only() {
    // from s in strings where TryParse(s, out i) select (i = 0)
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let src = q.ident("strings");
    q.source("s", src, Ty::Str);
    let s = q.ident("s");
    let test = q.try_parse(s, "i");
    q.filter(test);
    let zero = q.int(0);
    let assign = q.assign("i", zero);
    q.select(assign, Ty::Int);
    let chain = q.build().unwrap();

    let errors = guard(&chain, &interner, UNIQUE).unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E4007]);
}

#[test]
fn outer_assignment_is_not_checked() {
    // from x in xs select (total = x)
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let x = q.ident("x");
    let assign = q.assign("total", x);
    q.select(assign, Ty::Int);
    let chain = q.build().unwrap();

    assert_eq!(guard(&chain, &interner, DISALLOW), Ok(()));
}
