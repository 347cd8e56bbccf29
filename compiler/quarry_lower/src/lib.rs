//! Lowering of query clause chains into combinator chains.
//!
//! A query is an ordered chain of clauses (`from`, `where`, `let`,
//! deconstructing `let`, `select`). This crate turns a validated chain into
//! a chain of map / filter / flat-map calls, threading every variable a
//! later clause needs through synthesized carrier values, including
//! pattern variables bound by refutable tests inside `where` clauses.
//!
//! # Pipeline Position
//!
//! ```text
//! Parse → Bind → **Lower queries** → Code generation
//! ```
//!
//! # Passes
//!
//! 1. **Chain construction** (`chain`): clause grammar, binding table,
//!    definite-assignment conditions of pattern variables
//! 2. **Flow analysis** (`flow`): per-clause facts, name resolution,
//!    sibling unification
//! 3. **Scope guard** (`guard`): restriction policy, rebinding and
//!    assignment rules
//! 4. **Carrier synthesis** (`carrier`, `deconstruct`): minimal carrier per
//!    boundary, outcome representation, positional extraction
//! 5. **Translation** (`translate`): combinator descriptors
//!
//! Every pass is total over a chain: it either produces its result or
//! reports errors, and a chain with errors produces no descriptors.

mod carrier;
mod chain;
mod config;
mod deconstruct;
mod error;
mod flow;
mod guard;
pub mod run;
pub mod testing;
mod tracing_setup;
mod translate;

use quarry_ir::{CombinatorChain, ExprArena, StringInterner};
use rayon::prelude::*;

pub use carrier::{CarrierPlan, CarrierSpec, LiveSet};
pub use chain::{ClauseChain, ClauseDesc, ClausePattern};
pub use config::{LowerConfig, RestrictionPolicy, UnknownPolicy, POLICY_ENV_VAR};
pub use deconstruct::Extraction;
pub use error::{ChainErrors, LowerError};
pub use flow::{FlowAnalysis, FlowFact, Resolution, VariableUse};
pub use run::{run, Captures, RunError, Value};
pub use tracing_setup::init_tracing;

/// Something that can be lowered to a combinator chain.
pub trait Lower {
    fn lower(
        &self,
        config: &LowerConfig,
        interner: &StringInterner,
    ) -> Result<CombinatorChain, ChainErrors>;
}

impl Lower for ClauseChain {
    fn lower(
        &self,
        config: &LowerConfig,
        interner: &StringInterner,
    ) -> Result<CombinatorChain, ChainErrors> {
        let _span = tracing::debug_span!(
            "lower_chain",
            clauses = self.len(),
            policy = %config.policy
        )
        .entered();

        let flow = flow::analyze(self, interner)?;
        guard::check(self, &flow, config.policy, interner)?;
        flow.check_assigned(interner)?;
        let plan = carrier::synthesize(self, &flow)?;
        translate::translate(self, &flow, &plan, interner)
    }
}

/// A lowered chain contains no clauses left to lower.
impl Lower for CombinatorChain {
    fn lower(
        &self,
        _config: &LowerConfig,
        _interner: &StringInterner,
    ) -> Result<CombinatorChain, ChainErrors> {
        Ok(self.clone())
    }
}

/// Analysis results for a chain, without translating it.
///
/// Exposed for tooling that wants to inspect facts or carriers.
pub fn analyze(
    chain: &ClauseChain,
    config: &LowerConfig,
    interner: &StringInterner,
) -> Result<(FlowAnalysis, CarrierPlan), ChainErrors> {
    let flow = flow::analyze(chain, interner)?;
    guard::check(chain, &flow, config.policy, interner)?;
    flow.check_assigned(interner)?;
    let plan = carrier::synthesize(chain, &flow)?;
    Ok((flow, plan))
}

/// Translate a chain with an explicit carrier plan.
pub fn translate_with_plan(
    chain: &ClauseChain,
    flow: &FlowAnalysis,
    plan: &CarrierPlan,
    interner: &StringInterner,
) -> Result<CombinatorChain, ChainErrors> {
    translate::translate(chain, flow, plan, interner)
}

/// Build and lower one chain from parser output.
pub fn lower_chain(
    arena: ExprArena,
    clauses: Vec<ClauseDesc>,
    config: &LowerConfig,
    interner: &StringInterner,
) -> Result<CombinatorChain, ChainErrors> {
    ClauseChain::build(arena, clauses)?.lower(config, interner)
}

/// One chain's parser output.
#[derive(Clone, Debug)]
pub struct ChainInput {
    pub arena: ExprArena,
    pub clauses: Vec<ClauseDesc>,
}

/// Lower independent chains in parallel. Results are in input order.
pub fn lower_chains(
    inputs: Vec<ChainInput>,
    config: &LowerConfig,
    interner: &StringInterner,
) -> Vec<Result<CombinatorChain, ChainErrors>> {
    tracing::debug!(chains = inputs.len(), "lowering chains");
    inputs
        .into_par_iter()
        .map(|input| lower_chain(input.arena, input.clauses, config, interner))
        .collect()
}
