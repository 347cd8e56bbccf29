//! Clause chain construction.
//!
//! Turns the parser's ordered clause descriptions into immutable
//! [`ClauseNode`]s, assigning each clause the variables it introduces:
//! range variables from its binding position, and one pattern variable per
//! distinct name bound by a refutable test inside its expression.
//!
//! Grammar: exactly one leading `from` (the source), exactly one trailing
//! `select`, and any of `from` / `where` / `let` in between.

mod assignment;

use quarry_ir::{
    BindingId, BindingRange, ClauseKind, ClauseNode, ExprArena, ExprId, Name, Span, Ty,
    VariableBinding,
};
use rustc_hash::FxHashSet;

use crate::LowerError;

/// How a clause binds range variables.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ClausePattern {
    None,
    Single(Name),
    Tuple(Vec<Name>),
}

/// One clause as delivered by the parser/binder.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ClauseDesc {
    pub kind: ClauseKind,
    pub expr: ExprId,
    pub pattern: ClausePattern,
    /// Element type for generators, value type for `let`, result type for `select`.
    pub ty: Ty,
    pub span: Span,
}

impl ClauseDesc {
    fn new(kind: ClauseKind, expr: ExprId, pattern: ClausePattern, ty: Ty) -> Self {
        ClauseDesc {
            kind,
            expr,
            pattern,
            ty,
            span: Span::DUMMY,
        }
    }

    /// Leading `from name in expr`; `elem` is the element type.
    pub fn source(name: Name, expr: ExprId, elem: Ty) -> Self {
        Self::new(ClauseKind::Source, expr, ClausePattern::Single(name), elem)
    }

    /// Subsequent `from name in expr`.
    pub fn from(name: Name, expr: ExprId, elem: Ty) -> Self {
        Self::new(ClauseKind::From, expr, ClausePattern::Single(name), elem)
    }

    pub fn filter(expr: ExprId) -> Self {
        Self::new(ClauseKind::Where, expr, ClausePattern::None, Ty::Bool)
    }

    pub fn let_(name: Name, expr: ExprId, ty: Ty) -> Self {
        Self::new(ClauseKind::Let, expr, ClausePattern::Single(name), ty)
    }

    pub fn let_tuple(names: Vec<Name>, expr: ExprId, ty: Ty) -> Self {
        Self::new(ClauseKind::LetTuple, expr, ClausePattern::Tuple(names), ty)
    }

    pub fn select(expr: ExprId, ty: Ty) -> Self {
        Self::new(ClauseKind::Select, expr, ClausePattern::None, ty)
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// An immutable, validated clause chain.
#[derive(Clone, Debug)]
pub struct ClauseChain {
    arena: ExprArena,
    clauses: Vec<ClauseNode>,
    bindings: Vec<VariableBinding>,
}

impl ClauseChain {
    /// Build a chain from parsed clause descriptions.
    pub fn build(arena: ExprArena, descs: Vec<ClauseDesc>) -> Result<Self, LowerError> {
        tracing::debug!(clauses = descs.len(), "building clause chain");
        check_grammar(&arena, &descs)?;

        let mut builder = ChainBuilder {
            arena: &arena,
            clauses: Vec::with_capacity(descs.len()),
            bindings: Vec::new(),
        };
        for (index, desc) in descs.into_iter().enumerate() {
            builder.push_clause(index, desc);
        }
        let ChainBuilder {
            clauses, bindings, ..
        } = builder;

        Ok(ClauseChain {
            arena,
            clauses,
            bindings,
        })
    }

    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    pub fn clauses(&self) -> &[ClauseNode] {
        &self.clauses
    }

    pub fn clause(&self, index: usize) -> &ClauseNode {
        &self.clauses[index]
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn bindings(&self) -> &[VariableBinding] {
        &self.bindings
    }

    pub fn binding(&self, id: BindingId) -> &VariableBinding {
        &self.bindings[id.index()]
    }

    pub fn binding_ids(&self) -> impl Iterator<Item = BindingId> {
        (0..self.bindings.len()).filter_map(|i| u32::try_from(i).ok().map(BindingId::new))
    }

    /// Whether any clause introduces a pattern variable.
    pub fn has_pattern_variables(&self) -> bool {
        self.bindings.iter().any(VariableBinding::is_pattern)
    }

    /// Root sequence and its range variable.
    pub fn source(&self) -> (ExprId, BindingId) {
        let source = &self.clauses[0];
        (source.expr, BindingId::new(source.range_vars.start))
    }
}

fn malformed(clause: usize, span: Span, reason: impl Into<String>) -> LowerError {
    LowerError::MalformedChain {
        clause,
        reason: reason.into(),
        span,
    }
}

fn check_grammar(arena: &ExprArena, descs: &[ClauseDesc]) -> Result<(), LowerError> {
    let Some(last) = descs.len().checked_sub(1) else {
        return Err(malformed(0, Span::DUMMY, "a query needs at least `from` and `select`"));
    };

    for (index, desc) in descs.iter().enumerate() {
        match desc.kind {
            ClauseKind::Source if index != 0 => {
                return Err(malformed(index, desc.span, "the source `from` must come first"));
            }
            ClauseKind::Select if index != last => {
                return Err(malformed(index, desc.span, "`select` must be the last clause"));
            }
            _ => {}
        }
        if index == 0 && desc.kind != ClauseKind::Source {
            return Err(malformed(index, desc.span, "a query must start with `from`"));
        }
        if index == last && desc.kind != ClauseKind::Select {
            return Err(malformed(index, desc.span, "a query must end with `select`"));
        }

        let pattern_ok = match (&desc.kind, &desc.pattern) {
            (ClauseKind::Source | ClauseKind::From | ClauseKind::Let, ClausePattern::Single(n)) => {
                n.is_present()
            }
            (ClauseKind::LetTuple, ClausePattern::Tuple(names)) => {
                names.iter().all(|n| n.is_present())
            }
            (ClauseKind::Where | ClauseKind::Select, ClausePattern::None) => true,
            _ => false,
        };
        if !pattern_ok {
            return Err(malformed(
                index,
                desc.span,
                format!("`{}` clause has an invalid binding pattern", desc.kind),
            ));
        }

        if !desc.expr.is_valid() || arena.try_get_expr(desc.expr).is_none() {
            return Err(malformed(index, desc.span, "clause expression is missing"));
        }
    }
    Ok(())
}

struct ChainBuilder<'a> {
    arena: &'a ExprArena,
    clauses: Vec<ClauseNode>,
    bindings: Vec<VariableBinding>,
}

impl ChainBuilder<'_> {
    fn next_binding_index(&self) -> u32 {
        u32::try_from(self.bindings.len()).unwrap_or(u32::MAX)
    }

    fn range_since(&self, start: u32) -> BindingRange {
        let len = u16::try_from(self.bindings.len() - start as usize).unwrap_or(u16::MAX);
        BindingRange::new(start, len)
    }

    fn push_clause(&mut self, index: usize, desc: ClauseDesc) {
        let range_start = self.next_binding_index();
        match &desc.pattern {
            ClausePattern::None => {}
            ClausePattern::Single(name) => {
                self.bindings.push(VariableBinding::range(
                    *name,
                    desc.ty.clone(),
                    index,
                    desc.span,
                ));
            }
            ClausePattern::Tuple(names) => {
                for (position, name) in names.iter().enumerate() {
                    self.bindings.push(VariableBinding::range(
                        *name,
                        desc.ty.part(position),
                        index,
                        desc.span,
                    ));
                }
            }
        }
        let range_vars = self.range_since(range_start);

        let pattern_start = self.next_binding_index();
        self.push_pattern_vars(index, desc.expr);
        let pattern_vars = self.range_since(pattern_start);

        tracing::trace!(
            clause = index,
            kind = %desc.kind,
            range_vars = range_vars.len(),
            pattern_vars = pattern_vars.len(),
            "clause introduces bindings"
        );

        self.clauses.push(ClauseNode {
            kind: desc.kind,
            expr: desc.expr,
            range_vars,
            pattern_vars,
            ty: desc.ty,
            span: desc.span,
        });
    }

    /// One binding per distinct pattern-variable name, in first-occurrence
    /// order. Sibling declarations are reconciled later by the flow analyzer.
    fn push_pattern_vars(&mut self, index: usize, root: ExprId) {
        let mut seen: FxHashSet<Name> = FxHashSet::default();
        let outcomes = assignment::outcomes(self.arena, root);
        for id in self.arena.walk(root) {
            let expr = self.arena.get_expr(id);
            let Some(name) = expr.kind.pattern_binding() else {
                continue;
            };
            if !seen.insert(name) {
                continue;
            }
            self.bindings.push(VariableBinding::pattern(
                name,
                expr.kind.pattern_binding_ty(),
                outcomes.condition(name),
                index,
                expr.span,
            ));
        }
    }
}
