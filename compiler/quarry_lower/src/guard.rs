//! Scope guard.
//!
//! Approves or rejects a chain against the active [`RestrictionPolicy`],
//! then enforces the scoping rules every policy shares: a clause may not
//! rebind a name that is still in scope, and chain variables are read-only
//! outside the clause that introduced them.
//!
//! All violations in the chain are reported together.

use quarry_ir::{BindingId, StringInterner, VariableBinding};
use rustc_hash::FxHashMap;

use crate::flow::{FlowAnalysis, FlowFact, Resolution};
use crate::{ChainErrors, ClauseChain, LowerError, RestrictionPolicy};

pub fn check(
    chain: &ClauseChain,
    flow: &FlowAnalysis,
    policy: RestrictionPolicy,
    interner: &StringInterner,
) -> Result<(), ChainErrors> {
    let mut guard = Guard {
        chain,
        flow,
        policy,
        interner,
        errors: Vec::new(),
    };

    match policy {
        RestrictionPolicy::DisallowPatternVariablesInClauses => guard.confine_to_clause(),
        RestrictionPolicy::RequireGlobalNameUniqueness => guard.require_unique_names(),
    }
    guard.check_assignments();
    guard.check_shadowing();

    tracing::debug!(
        policy = %policy,
        violations = guard.errors.len(),
        "scope guard finished"
    );
    ChainErrors::from_vec(guard.errors).map_or(Ok(()), Err)
}

struct Guard<'a> {
    chain: &'a ClauseChain,
    flow: &'a FlowAnalysis,
    policy: RestrictionPolicy,
    interner: &'a StringInterner,
    errors: Vec<LowerError>,
}

impl Guard<'_> {
    fn name_of(&self, binding: &VariableBinding) -> String {
        self.interner.lookup(binding.name).to_owned()
    }

    fn violation(&mut self, clause: usize, binding: BindingId, reason: String) {
        let b = self.chain.binding(binding);
        self.errors.push(LowerError::PatternVariableScopeViolation {
            clause,
            name: self.name_of(b),
            policy: self.policy,
            reason,
            span: b.span,
        });
    }

    /// Every reference to a pattern variable from a later clause fails.
    fn confine_to_clause(&mut self) {
        for clause in 0..self.chain.len() {
            for u in self.flow.uses(clause) {
                let Resolution::Earlier(b) = u.resolution else {
                    continue;
                };
                let binding = self.chain.binding(b);
                if !binding.is_pattern() {
                    continue;
                }
                let intro = binding.clause;
                self.errors.push(LowerError::PatternVariableScopeViolation {
                    clause,
                    name: self.name_of(binding),
                    policy: self.policy,
                    reason: format!(
                        "it is introduced in clause {intro} and used in clause {clause}"
                    ),
                    span: u.span,
                });
            }
        }
    }

    /// No two pattern variables in the chain may share a name.
    fn require_unique_names(&mut self) {
        let mut first: FxHashMap<_, usize> = FxHashMap::default();
        for id in self.chain.binding_ids() {
            let binding = self.chain.binding(id);
            if !binding.is_pattern() {
                continue;
            }
            match first.get(&binding.name) {
                Some(&clause) => {
                    let reason = format!("the name is also bound by a pattern in clause {clause}");
                    self.violation(binding.clause, id, reason);
                }
                None => {
                    first.insert(binding.name, binding.clause);
                }
            }
        }
    }

    /// Chain variables may only be assigned by their introducing clause.
    fn check_assignments(&mut self) {
        for clause in 0..self.chain.len() {
            for u in self.flow.uses(clause) {
                if !u.is_assignment {
                    continue;
                }
                let Some(b) = u.resolution.binding() else {
                    continue;
                };
                if u.before_declaration || !self.chain.binding(b).is_mutable_in(clause) {
                    self.errors.push(LowerError::ReadOnlyAssignment {
                        clause,
                        name: self.interner.lookup(u.name).to_owned(),
                        span: u.span,
                    });
                }
            }
        }
    }

    /// A clause may not introduce a name held by a binding still in scope.
    fn check_shadowing(&mut self) {
        for (index, clause) in self.chain.clauses().iter().enumerate() {
            let mut own: FxHashMap<_, BindingId> = FxHashMap::default();
            for id in clause.introduces() {
                let binding = self.chain.binding(id);
                let clash_in_clause = own.insert(binding.name, id).is_some();
                if clash_in_clause || self.held_by_earlier(index, binding) {
                    self.errors.push(LowerError::NameAlreadyInScope {
                        clause: index,
                        name: self.name_of(binding),
                        span: binding.span,
                    });
                }
            }
        }
    }

    fn held_by_earlier(&self, clause: usize, binding: &VariableBinding) -> bool {
        self.chain.clauses()[..clause]
            .iter()
            .flat_map(|c| c.introduces())
            .any(|earlier| {
                let held = self.chain.binding(earlier);
                if held.name != binding.name {
                    return false;
                }
                if !held.is_pattern() {
                    return true;
                }
                // Pattern-vs-pattern reuse is the uniqueness rule's concern.
                self.policy.allows_propagation()
                    && !binding.is_pattern()
                    && self.flow.fact(clause, earlier) == FlowFact::DefinitelyAssigned
            })
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
