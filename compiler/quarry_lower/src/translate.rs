//! Combinator translation.
//!
//! Walks the clause chain once and emits one stage (or, for a gating clause
//! with live pattern variables, a map / filter / map triple) per clause,
//! consuming the carrier plan.
//!
//! Each boundary's carrier is the planned shape restricted to what the
//! previous stage actually provides plus what the clause introduces, so a
//! field missing from a plan surfaces as an unassigned use in the clause
//! that reads it.

use quarry_ir::{
    BindingId, CarrierShape, ClauseKind, ClauseNode, CombinatorCall, CombinatorChain,
    CombinatorKind, StageBody, StageShape, StringInterner,
};
use rustc_hash::FxHashSet;

use crate::carrier::{CarrierPlan, CarrierSpec};
use crate::flow::FlowAnalysis;
use crate::{ChainErrors, ClauseChain, LowerError};

pub fn translate(
    chain: &ClauseChain,
    flow: &FlowAnalysis,
    plan: &CarrierPlan,
    interner: &StringInterner,
) -> Result<CombinatorChain, ChainErrors> {
    let Some(source_spec) = plan.boundary(0) else {
        return Err(missing_carrier(chain, 0).into());
    };

    let mut t = Translator {
        chain,
        plan,
        stages: Vec::with_capacity(chain.len()),
        errors: Vec::new(),
        input: StageShape::Carrier(source_spec.shape.clone()),
    };

    let last = chain.len().saturating_sub(1);
    for k in 1..=last {
        t.check_reads(k, flow, interner);
        if k == last {
            t.project(k);
        } else {
            t.lower_clause(k, k + 1 == last);
        }
    }

    tracing::debug!(
        stages = t.stages.len(),
        errors = t.errors.len(),
        "combinators emitted"
    );

    if let Some(errors) = ChainErrors::from_vec(t.errors) {
        return Err(errors);
    }
    Ok(CombinatorChain {
        arena: chain.arena().clone(),
        source: chain.clause(0).expr,
        source_shape: source_spec.shape.clone(),
        stages: t.stages,
    })
}

fn missing_carrier(chain: &ClauseChain, k: usize) -> LowerError {
    LowerError::Internal {
        clause: k,
        reason: "no carrier was planned for this clause".to_string(),
        span: chain.clause(k).span,
    }
}

struct Translator<'a> {
    chain: &'a ClauseChain,
    plan: &'a CarrierPlan,
    stages: Vec<CombinatorCall>,
    errors: Vec<LowerError>,
    /// Shape produced by the most recent stage.
    input: StageShape,
}

impl Translator<'_> {
    fn current(&self) -> Option<&CarrierShape> {
        self.input.carrier()
    }

    fn check_reads(&mut self, k: usize, flow: &FlowAnalysis, interner: &StringInterner) {
        for (binding, span) in flow.reads(k) {
            if !self.current().is_some_and(|c| c.contains(binding)) {
                self.errors.push(LowerError::UnassignedVariableUse {
                    clause: k,
                    name: interner.lookup(self.chain.binding(binding).name).to_owned(),
                    span,
                });
            }
        }
    }

    fn emit(&mut self, kind: CombinatorKind, output: StageShape, body: StageBody, clause: usize) {
        let input = std::mem::replace(&mut self.input, output.clone());
        tracing::trace!(clause, kind = kind.method_name(), "stage emitted");
        self.stages.push(CombinatorCall {
            kind,
            input,
            output,
            body,
            clause,
        });
    }

    /// The planned carrier, keeping only fields that can actually be built.
    fn restrict(&self, clause: &ClauseNode, spec: &CarrierSpec) -> CarrierShape {
        let introduced: FxHashSet<BindingId> = clause.introduces().collect();
        let current = self.current();
        let mut shape = spec.shape.clone();
        shape.fields.retain(|f| {
            introduced.contains(&f.binding) || current.is_some_and(|c| c.contains(f.binding))
        });
        shape
    }

    fn project(&mut self, k: usize) {
        let clause = self.chain.clause(k);
        self.emit(
            CombinatorKind::Map,
            StageShape::Projection(clause.ty.clone()),
            StageBody::Project { result: clause.expr },
            k,
        );
    }

    fn lower_clause(&mut self, k: usize, select_follows: bool) {
        let chain = self.chain;
        let plan = self.plan;
        let clause = chain.clause(k);
        let Some(spec) = plan.boundary(k) else {
            self.errors.push(missing_carrier(chain, k));
            return;
        };
        let shape = self.restrict(clause, spec);

        match clause.kind {
            ClauseKind::From => {
                let Some(element) = clause.range_vars.iter().next() else {
                    self.errors.push(missing_carrier(chain, k));
                    return;
                };
                self.emit(
                    CombinatorKind::FlatMap,
                    StageShape::Carrier(shape),
                    StageBody::Generate {
                        collection: clause.expr,
                        element,
                    },
                    k,
                );
            }
            ClauseKind::Where => match spec.outcome {
                None => {
                    let unchanged = self.input.clone();
                    self.emit(
                        CombinatorKind::Filter,
                        unchanged,
                        StageBody::Predicate {
                            predicate: clause.expr,
                        },
                        k,
                    );
                }
                Some(repr) => {
                    let outcome = StageShape::Outcome {
                        payload: shape.clone(),
                        repr,
                    };
                    self.emit(
                        CombinatorKind::Map,
                        outcome.clone(),
                        StageBody::Guard {
                            predicate: clause.expr,
                        },
                        k,
                    );
                    self.emit(CombinatorKind::Filter, outcome, StageBody::RejectAbsent, k);
                    // The terminal projection unwraps a known-present outcome itself.
                    if !select_follows {
                        self.emit(
                            CombinatorKind::Map,
                            StageShape::Carrier(shape),
                            StageBody::Unwrap,
                            k,
                        );
                    }
                }
            },
            ClauseKind::Let => {
                let bindings = clause.range_vars.iter().map(|b| (b, clause.expr)).collect();
                self.emit(
                    CombinatorKind::Map,
                    StageShape::Carrier(shape),
                    StageBody::Extend { bindings },
                    k,
                );
            }
            ClauseKind::LetTuple => {
                let parts = spec
                    .extraction
                    .as_ref()
                    .map(|e| {
                        e.parts
                            .iter()
                            .copied()
                            .filter(|&(b, _)| shape.contains(b))
                            .collect()
                    })
                    .unwrap_or_default();
                self.emit(
                    CombinatorKind::Map,
                    StageShape::Carrier(shape),
                    StageBody::Destructure {
                        source: clause.expr,
                        parts,
                    },
                    k,
                );
            }
            ClauseKind::Source | ClauseKind::Select => {
                self.errors.push(LowerError::MalformedChain {
                    clause: k,
                    reason: format!("`{}` cannot appear mid-chain", clause.kind),
                    span: clause.span,
                });
            }
        }
    }
}
