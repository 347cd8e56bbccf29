//! Carrier synthesis.
//!
//! Decides, for every clause boundary, which chain variables travel in the
//! value flowing to the next stage, and whether a gating clause's result
//! must be wrapped in a two-state outcome.
//!
//! # Algorithm
//!
//! Backward liveness over the straight-line clause sequence:
//!
//! - `live_after(k) = live_after(k + 1) ∪ reads(k + 1)`, with nothing live
//!   after the terminal `select`.
//! - The carrier after clause `k` holds exactly the bindings introduced at
//!   or before `k` that are live after `k`, in binding order.
//!
//! Two boundaries are not synthesized: the source's (the raw element) and
//! the one after a `where` that binds nothing live (a filter forwards its
//! input unchanged).

use quarry_ir::{BindingId, CarrierField, CarrierId, CarrierShape, ClauseKind, OutcomeRepr};
use rustc_hash::FxHashSet;

use crate::deconstruct::{self, Extraction};
use crate::flow::FlowAnalysis;
use crate::{ClauseChain, LowerError};

/// Variables live at a clause boundary.
pub type LiveSet = FxHashSet<BindingId>;

/// Layout of the value crossing one boundary.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CarrierSpec {
    pub after_clause: usize,
    /// Fields of the carrier, or of the outcome's payload.
    pub shape: CarrierShape,
    /// Set when the clause produces `payload | absent` before filtering.
    pub outcome: Option<OutcomeRepr>,
    /// Positional extraction for a deconstructing clause.
    pub extraction: Option<Extraction>,
    /// `false` when the boundary reuses an existing element layout.
    pub synthesized: bool,
}

/// One carrier per boundary; index `k` is the value after clause `k`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CarrierPlan {
    boundaries: Vec<CarrierSpec>,
}

impl CarrierPlan {
    pub fn boundary(&self, after_clause: usize) -> Option<&CarrierSpec> {
        self.boundaries.get(after_clause)
    }

    pub fn boundaries(&self) -> &[CarrierSpec] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Remove `binding` from the carrier after `after_clause`.
    ///
    /// Returns whether the field was present. Used to check that every
    /// synthesized field is actually needed.
    pub fn drop_field(&mut self, after_clause: usize, binding: BindingId) -> bool {
        let Some(spec) = self.boundaries.get_mut(after_clause) else {
            return false;
        };
        let before = spec.shape.fields.len();
        spec.shape.fields.retain(|f| f.binding != binding);
        if let Some(extraction) = &mut spec.extraction {
            extraction.parts.retain(|&(b, _)| b != binding);
        }
        spec.shape.fields.len() != before
    }
}

/// Live sets after every clause.
pub fn liveness(chain: &ClauseChain, flow: &FlowAnalysis) -> Vec<LiveSet> {
    let len = chain.len();
    let mut live_after = vec![LiveSet::default(); len];
    for k in (0..len.saturating_sub(1)).rev() {
        let mut live = live_after[k + 1].clone();
        live.extend(flow.reads(k + 1).map(|(b, _)| b));
        live_after[k] = live;
    }
    live_after
}

pub fn synthesize(chain: &ClauseChain, flow: &FlowAnalysis) -> Result<CarrierPlan, LowerError> {
    let live_after = liveness(chain, flow);
    let last = chain.len().saturating_sub(1);
    let mut boundaries: Vec<CarrierSpec> = Vec::with_capacity(last);

    let (_, element) = chain.source();
    boundaries.push(CarrierSpec {
        after_clause: 0,
        shape: shape_from(chain, 0, [element]),
        outcome: None,
        extraction: None,
        synthesized: false,
    });

    for k in 1..last {
        let clause = chain.clause(k);
        let live = &live_after[k];
        let spec = match clause.kind {
            ClauseKind::Where if !clause.pattern_vars.iter().any(|b| live.contains(&b)) => {
                let previous = &boundaries[k - 1];
                CarrierSpec {
                    after_clause: k,
                    shape: previous.shape.clone(),
                    outcome: None,
                    extraction: None,
                    synthesized: false,
                }
            }
            ClauseKind::Where => {
                let shape = minimal_shape(chain, k, live);
                let repr = outcome_repr(&shape);
                CarrierSpec {
                    after_clause: k,
                    shape,
                    outcome: Some(repr),
                    extraction: None,
                    synthesized: true,
                }
            }
            ClauseKind::LetTuple => {
                let extraction = deconstruct::expand(chain, k, |b| live.contains(&b))?;
                CarrierSpec {
                    after_clause: k,
                    shape: minimal_shape(chain, k, live),
                    outcome: None,
                    extraction: Some(extraction),
                    synthesized: true,
                }
            }
            _ => CarrierSpec {
                after_clause: k,
                shape: minimal_shape(chain, k, live),
                outcome: None,
                extraction: None,
                synthesized: true,
            },
        };
        tracing::trace!(
            clause = k,
            fields = spec.shape.fields.len(),
            outcome = ?spec.outcome,
            synthesized = spec.synthesized,
            "carrier planned"
        );
        boundaries.push(spec);
    }

    tracing::debug!(
        boundaries = boundaries.len(),
        synthesized = boundaries.iter().filter(|b| b.synthesized).count(),
        "carriers synthesized"
    );
    Ok(CarrierPlan { boundaries })
}

/// Bindings introduced at or before `k` that are live after it.
fn minimal_shape(chain: &ClauseChain, k: usize, live: &LiveSet) -> CarrierShape {
    let mut ids: Vec<BindingId> = live
        .iter()
        .copied()
        .filter(|&b| chain.binding(b).clause <= k)
        .collect();
    ids.sort_unstable();
    shape_from(chain, k, ids)
}

fn shape_from(
    chain: &ClauseChain,
    k: usize,
    ids: impl IntoIterator<Item = BindingId>,
) -> CarrierShape {
    CarrierShape {
        id: CarrierId::new(u32::try_from(k).unwrap_or(u32::MAX)),
        fields: ids
            .into_iter()
            .map(|binding| {
                let b = chain.binding(binding);
                CarrierField {
                    binding,
                    name: b.name,
                    ty: b.ty.clone(),
                }
            })
            .collect(),
    }
}

/// The null sentinel cannot mark failure when a lone payload field may
/// itself be null.
pub fn outcome_repr(payload: &CarrierShape) -> OutcomeRepr {
    match payload.fields.as_slice() {
        [only] if only.ty.admits_null() => OutcomeRepr::Tagged,
        _ => OutcomeRepr::Elided,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
