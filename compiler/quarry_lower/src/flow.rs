//! Variable flow analysis.
//!
//! Computes, for every binding and every clause, whether the binding is
//! assigned there ([`FlowFact`]), and resolves every variable reference in
//! every clause expression to the binding it denotes.
//!
//! # Algorithm
//!
//! Clauses are processed in order. A pattern variable is
//! `DefinitelyAssignedIfTrue` inside its introducing clause. In later
//! clauses it is `DefinitelyAssigned` only if the introducing clause gates
//! continuation (`where`) and the variable is assigned whenever the clause's
//! expression is true; otherwise it stays `Unassigned` and any use is an
//! error. No reachability inference is attempted: a pattern that can never
//! fail is treated like any other.
//!
//! Same-name declarations on the two sides of `||` unify into one variable
//! when their types agree; any other repeated declaration is ambiguous.

use quarry_ir::{
    AssignmentCondition, BinaryOp, BindingId, ExprArena, ExprId, ExprKind, Name, Span,
    StringInterner, Ty,
};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{ChainErrors, ClauseChain, LowerError};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FlowFact {
    Unassigned,
    DefinitelyAssignedIfTrue,
    DefinitelyAssigned,
}

/// What a variable reference resolved to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Resolution {
    /// A pattern variable introduced by the referencing clause itself.
    SameClause(BindingId),
    /// A binding introduced by an earlier clause.
    Earlier(BindingId),
    /// Not a chain variable: a local captured from the enclosing code.
    Outer,
}

impl Resolution {
    pub fn binding(self) -> Option<BindingId> {
        match self {
            Resolution::SameClause(b) | Resolution::Earlier(b) => Some(b),
            Resolution::Outer => None,
        }
    }
}

/// One variable reference inside a clause expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct VariableUse {
    pub name: Name,
    pub resolution: Resolution,
    pub span: Span,
    /// The reference is the target of an assignment.
    pub is_assignment: bool,
    /// A same-clause reference evaluated before the pattern test that
    /// declares its variable.
    pub before_declaration: bool,
}

/// Flow facts and resolved uses for one chain.
#[derive(Clone, Debug)]
pub struct FlowAnalysis {
    /// `facts[binding][clause]`.
    facts: Vec<Vec<FlowFact>>,
    /// `uses[clause]`, in expression pre-order.
    uses: Vec<Vec<VariableUse>>,
}

impl FlowAnalysis {
    pub fn fact(&self, clause: usize, binding: BindingId) -> FlowFact {
        self.facts
            .get(binding.index())
            .and_then(|row| row.get(clause))
            .copied()
            .unwrap_or(FlowFact::Unassigned)
    }

    pub fn uses(&self, clause: usize) -> &[VariableUse] {
        self.uses.get(clause).map_or(&[], Vec::as_slice)
    }

    /// Bindings from earlier clauses that `clause` reads.
    pub fn reads(&self, clause: usize) -> impl Iterator<Item = (BindingId, Span)> + '_ {
        self.uses(clause).iter().filter_map(|u| match u.resolution {
            Resolution::Earlier(b) => Some((b, u.span)),
            _ => None,
        })
    }

    pub fn clause_count(&self) -> usize {
        self.uses.len()
    }

    /// Report every reference to a binding that is `Unassigned` where it is
    /// used, and every read of a pattern variable ahead of its declaration.
    ///
    /// Runs after the scope guard so that policy violations take precedence.
    pub fn check_assigned(&self, interner: &StringInterner) -> Result<(), ChainErrors> {
        let mut errors = Vec::new();
        for (clause, uses) in self.uses.iter().enumerate() {
            for u in uses {
                let unassigned = match u.resolution {
                    Resolution::Earlier(b) => self.fact(clause, b) == FlowFact::Unassigned,
                    Resolution::SameClause(_) => u.before_declaration && !u.is_assignment,
                    Resolution::Outer => false,
                };
                if unassigned {
                    errors.push(LowerError::UnassignedVariableUse {
                        clause,
                        name: interner.lookup(u.name).to_owned(),
                        span: u.span,
                    });
                }
            }
        }
        ChainErrors::from_vec(errors).map_or(Ok(()), Err)
    }
}

/// Analyze a chain, reporting every ambiguous pattern-variable declaration.
pub fn analyze(
    chain: &ClauseChain,
    interner: &StringInterner,
) -> Result<FlowAnalysis, ChainErrors> {
    let mut errors = Vec::new();
    for (index, clause) in chain.clauses().iter().enumerate() {
        check_siblings(chain.arena(), index, clause.expr, interner, &mut errors);
    }
    if let Some(errors) = ChainErrors::from_vec(errors) {
        return Err(errors);
    }

    let facts = compute_facts(chain);
    let uses: Vec<_> = (0..chain.len())
        .map(|index| resolve_uses(chain, index))
        .collect();

    tracing::debug!(
        clauses = chain.len(),
        bindings = chain.bindings().len(),
        uses = uses.iter().map(Vec::len).sum::<usize>(),
        "flow facts computed"
    );

    Ok(FlowAnalysis { facts, uses })
}

fn compute_facts(chain: &ClauseChain) -> Vec<Vec<FlowFact>> {
    let len = chain.len();
    chain
        .bindings()
        .iter()
        .map(|binding| {
            let intro = binding.clause;
            let gating = chain.clause(intro).kind.gates_continuation();
            (0..len)
                .map(|clause| {
                    if clause < intro {
                        return FlowFact::Unassigned;
                    }
                    if !binding.is_pattern() {
                        // A range variable is not visible in its own clause's expression.
                        return if clause == intro {
                            FlowFact::Unassigned
                        } else {
                            FlowFact::DefinitelyAssigned
                        };
                    }
                    if clause == intro {
                        FlowFact::DefinitelyAssignedIfTrue
                    } else if gating && binding.condition == AssignmentCondition::WhenTrue {
                        FlowFact::DefinitelyAssigned
                    } else {
                        FlowFact::Unassigned
                    }
                })
                .collect()
        })
        .collect()
}

/// Resolve every identifier and assignment target in clause `index`.
fn resolve_uses(chain: &ClauseChain, index: usize) -> Vec<VariableUse> {
    let arena = chain.arena();
    let clause = chain.clause(index);

    let own: FxHashMap<Name, BindingId> = clause
        .pattern_vars
        .iter()
        .map(|b| (chain.binding(b).name, b))
        .collect();

    // Evaluation position of every node, and of each name's first declaration.
    let position: FxHashMap<ExprId, usize> = evaluation_order(arena, clause.expr)
        .into_iter()
        .enumerate()
        .map(|(pos, id)| (id, pos))
        .collect();
    let mut declared_at: FxHashMap<Name, usize> = FxHashMap::default();
    for (&id, &pos) in &position {
        if let Some(name) = arena.get_expr(id).kind.pattern_binding() {
            let first = declared_at.entry(name).or_insert(pos);
            *first = (*first).min(pos);
        }
    }

    let mut out = Vec::new();
    for id in arena.walk(clause.expr) {
        let expr = arena.get_expr(id);
        let (name, is_assignment) = match &expr.kind {
            ExprKind::Ident(name) => (*name, false),
            ExprKind::Assign { target, .. } => (*target, true),
            _ => continue,
        };
        let resolution = match own.get(&name) {
            Some(&b) => Resolution::SameClause(b),
            None => resolve_earlier(chain, index, name),
        };
        let before_declaration = matches!(resolution, Resolution::SameClause(_))
            && declared_at
                .get(&name)
                .is_none_or(|&decl| position.get(&id).is_some_and(|&pos| pos < decl));
        out.push(VariableUse {
            name,
            resolution,
            span: expr.span,
            is_assignment,
            before_declaration,
        });
    }
    out
}

/// Nodes of `root` in evaluation order: operands before the node itself.
///
/// A pattern test binds its variable once its operand is evaluated, and an
/// assignment stores once its value is, so both sit after their children.
fn evaluation_order(arena: &ExprArena, root: ExprId) -> Vec<ExprId> {
    let mut out = Vec::new();
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            out.push(id);
            continue;
        }
        stack.push((id, true));
        stack.extend(arena.children(id).into_iter().rev().map(|child| (child, false)));
    }
    out
}

/// The most recent binding named `name` introduced before clause `index`.
fn resolve_earlier(chain: &ClauseChain, index: usize, name: Name) -> Resolution {
    chain.clauses()[..index]
        .iter()
        .rev()
        .find_map(|clause| {
            let mut ids: SmallVec<[BindingId; 4]> = clause.introduces().collect();
            ids.reverse();
            ids.into_iter().find(|&b| chain.binding(b).name == name)
        })
        .map_or(Resolution::Outer, Resolution::Earlier)
}

/// Declarations found in a subtree: name → (type, span of first declaration).
type Declared = FxHashMap<Name, (Ty, Span)>;

fn check_siblings(
    arena: &ExprArena,
    clause: usize,
    root: ExprId,
    interner: &StringInterner,
    errors: &mut Vec<LowerError>,
) {
    let mut ctx = SiblingCheck {
        arena,
        clause,
        interner,
        errors,
        reported: FxHashSet::default(),
    };
    ctx.declared(root);
}

struct SiblingCheck<'a> {
    arena: &'a ExprArena,
    clause: usize,
    interner: &'a StringInterner,
    errors: &'a mut Vec<LowerError>,
    reported: FxHashSet<Name>,
}

impl SiblingCheck<'_> {
    fn report(&mut self, name: Name, reason: String, span: Span) {
        if self.reported.insert(name) {
            self.errors.push(LowerError::AmbiguousPatternVariable {
                clause: self.clause,
                name: self.interner.lookup(name).to_owned(),
                reason,
                span,
            });
        }
    }

    fn declared(&mut self, id: ExprId) -> Declared {
        let arena = self.arena;
        let expr = arena.get_expr(id);
        match &expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let mut merged = self.declared(*left);
                for (name, (ty, span)) in self.declared(*right) {
                    match merged.get(&name) {
                        Some((existing, _)) if *existing != ty => {
                            let reason = format!(
                                "declared as `{existing}` and `{ty}` in alternative branches"
                            );
                            self.report(name, reason, span);
                        }
                        Some(_) => {}
                        None => {
                            merged.insert(name, (ty, span));
                        }
                    }
                }
                merged
            }
            kind => {
                let mut merged = Declared::default();
                for child in arena.children(id) {
                    let child_decls = self.declared(child);
                    self.merge_exclusive(&mut merged, child_decls);
                }
                if let Some(name) = kind.pattern_binding() {
                    let mut own = Declared::default();
                    own.insert(name, (kind.pattern_binding_ty(), expr.span));
                    self.merge_exclusive(&mut merged, own);
                }
                merged
            }
        }
    }

    /// Merge declarations from subexpressions that are all evaluated on the
    /// same path; a repeated name is a redeclaration.
    fn merge_exclusive(&mut self, into: &mut Declared, from: Declared) {
        for (name, (ty, span)) in from {
            if into.contains_key(&name) {
                self.report(
                    name,
                    "declared more than once on the same path".to_string(),
                    span,
                );
            } else {
                into.insert(name, (ty, span));
            }
        }
    }
}
