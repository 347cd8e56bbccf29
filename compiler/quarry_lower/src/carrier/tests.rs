use pretty_assertions::assert_eq;
use quarry_ir::{BindingId, CarrierId, OutcomeRepr, StringInterner, Ty};

use super::{liveness, synthesize, CarrierPlan};
use crate::flow::analyze;
use crate::testing::QueryBuilder;
use crate::{ClauseChain, LowerError};

fn plan(chain: &ClauseChain, interner: &StringInterner) -> Result<CarrierPlan, LowerError> {
    let flow = analyze(chain, interner).unwrap();
    synthesize(chain, &flow)
}

fn field_names(plan: &CarrierPlan, k: usize, interner: &StringInterner) -> Vec<&'static str> {
    plan.boundary(k)
        .unwrap()
        .shape
        .fields
        .iter()
        .map(|f| interner.lookup(f.name))
        .collect()
}

/// `from s in strings where TryParse(s, out i) select i`
fn try_parse_chain(interner: &StringInterner, elem: Ty, out_ty_nullable: bool) -> ClauseChain {
    let mut q = QueryBuilder::new(interner);
    let src = q.ident("strings");
    q.source("s", src, elem);
    let s = q.ident("s");
    let test = if out_ty_nullable {
        q.is_type(s, Ty::nullable(Ty::Str), "i")
    } else {
        q.try_parse(s, "i")
    };
    q.filter(test);
    let i = q.ident("i");
    q.select(i, Ty::Int);
    q.build().unwrap()
}

#[test]
fn try_parse_filter_carries_only_the_parsed_value() {
    let interner = StringInterner::new();
    let chain = try_parse_chain(&interner, Ty::Str, false);
    let plan = plan(&chain, &interner).unwrap();

    assert_eq!(plan.len(), 2);
    let source = plan.boundary(0).unwrap();
    assert!(!source.synthesized);
    assert_eq!(field_names(&plan, 0, &interner), vec!["s"]);

    let after_where = plan.boundary(1).unwrap();
    assert!(after_where.synthesized);
    assert_eq!(after_where.shape.id, CarrierId::new(1));
    assert_eq!(field_names(&plan, 1, &interner), vec!["i"]);
    assert_eq!(after_where.outcome, Some(OutcomeRepr::Elided));
}

#[test]
fn nullable_scalar_payload_falls_back_to_tagged() {
    let interner = StringInterner::new();
    let chain = try_parse_chain(&interner, Ty::Object, true);
    let plan = plan(&chain, &interner).unwrap();
    assert_eq!(plan.boundary(1).unwrap().outcome, Some(OutcomeRepr::Tagged));
}

#[test]
fn plain_where_forwards_its_input() {
    // from x in xs let y = x + 1 where y > 0 select x
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let xs = q.ident("xs");
    q.source("x", xs, Ty::Int);
    let x = q.ident("x");
    let one = q.int(1);
    let sum = q.add(x, one);
    q.let_("y", sum, Ty::Int);
    let y = q.ident("y");
    let zero = q.int(0);
    let positive = q.gt(y, zero);
    q.filter(positive);
    let x = q.ident("x");
    q.select(x, Ty::Int);
    let chain = q.build().unwrap();

    let plan = plan(&chain, &interner).unwrap();
    assert_eq!(field_names(&plan, 1, &interner), vec!["x", "y"]);
    let after_where = plan.boundary(2).unwrap();
    assert!(!after_where.synthesized);
    assert_eq!(after_where.outcome, None);
    assert_eq!(after_where.shape, plan.boundary(1).unwrap().shape);
}

#[test]
fn dead_variables_are_not_carried() {
    // from a in as from b in bs let c = a select c
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let as_ = q.ident("as");
    q.source("a", as_, Ty::Int);
    let bs = q.ident("bs");
    q.from("b", bs, Ty::Int);
    let a = q.ident("a");
    q.let_("c", a, Ty::Int);
    let c = q.ident("c");
    q.select(c, Ty::Int);
    let chain = q.build().unwrap();

    let plan = plan(&chain, &interner).unwrap();
    assert_eq!(field_names(&plan, 1, &interner), vec!["a"]);
    assert_eq!(field_names(&plan, 2, &interner), vec!["c"]);
}

#[test]
fn liveness_accumulates_backwards() {
    let interner = StringInterner::new();
    let chain = try_parse_chain(&interner, Ty::Str, false);
    let flow = analyze(&chain, &interner).unwrap();
    let live = liveness(&chain, &flow);

    assert_eq!(live.len(), 3);
    assert!(live[2].is_empty());
    assert_eq!(live[1].iter().copied().collect::<Vec<_>>(), vec![BindingId::new(1)]);
    assert!(live[0].contains(&BindingId::new(0)));
    assert!(live[0].contains(&BindingId::new(1)));
}

#[test]
fn deconstruction_records_live_parts() {
    // from p in points let (dx, dy) = p select dy
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let points = q.ident("points");
    let pair = Ty::Tuple(vec![Ty::Int, Ty::Int]);
    q.source("p", points, pair.clone());
    let p = q.ident("p");
    q.let_tuple(&["dx", "dy"], p, pair);
    let dy = q.ident("dy");
    q.select(dy, Ty::Int);
    let chain = q.build().unwrap();

    let plan = plan(&chain, &interner).unwrap();
    let spec = plan.boundary(1).unwrap();
    let extraction = spec.extraction.as_ref().unwrap();
    assert_eq!(extraction.parts, vec![(BindingId::new(2), 1)]);
    assert_eq!(field_names(&plan, 1, &interner), vec!["dy"]);
}

#[test]
fn deconstruction_arity_is_checked() {
    // from p in points let (a, b, c) = p select 0
    let interner = StringInterner::new();
    let mut q = QueryBuilder::new(&interner);
    let points = q.ident("points");
    let pair = Ty::Tuple(vec![Ty::Int, Ty::Int]);
    q.source("p", points, pair.clone());
    let p = q.ident("p");
    q.let_tuple(&["a", "b", "c"], p, pair);
    let zero = q.int(0);
    q.select(zero, Ty::Int);
    let chain = q.build().unwrap();

    let err = plan(&chain, &interner).unwrap_err();
    assert!(matches!(err, LowerError::ArityMismatch { clause: 1, .. }));
}

#[test]
fn drop_field_reports_presence() {
    let interner = StringInterner::new();
    let chain = try_parse_chain(&interner, Ty::Str, false);
    let mut plan = plan(&chain, &interner).unwrap();

    assert!(plan.drop_field(1, BindingId::new(1)));
    assert!(!plan.drop_field(1, BindingId::new(1)));
    assert!(!plan.drop_field(9, BindingId::new(0)));
    assert!(plan.boundary(1).unwrap().shape.is_unit());
}
