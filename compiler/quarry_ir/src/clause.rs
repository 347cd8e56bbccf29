//! Clause-chain data model.
//!
//! A clause chain is built once from the parser's clause list and never
//! mutated afterwards. Bindings live in one flat table owned by the chain;
//! each clause addresses its own slice of it.

use std::fmt;

use crate::{ExprId, Name, Span, Ty};

/// Kind of a query clause.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClauseKind {
    /// Leading `from x in source`. Its expression is the root sequence.
    Source,
    /// Any later `from y in collection` (a generator).
    From,
    /// `where predicate`.
    Where,
    /// `let x = value`.
    Let,
    /// `let (a, b, ..) = composite`.
    LetTuple,
    /// Terminal `select result`.
    Select,
}

impl ClauseKind {
    /// Whether this clause's boolean result decides if execution continues.
    ///
    /// Only gating clauses can propagate pattern variables past themselves.
    pub fn gates_continuation(self) -> bool {
        matches!(self, ClauseKind::Where)
    }

    /// Whether this clause introduces ordinary range variables.
    pub fn introduces_range_variables(self) -> bool {
        matches!(
            self,
            ClauseKind::Source | ClauseKind::From | ClauseKind::Let | ClauseKind::LetTuple
        )
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ClauseKind::Source | ClauseKind::From => "from",
            ClauseKind::Where => "where",
            ClauseKind::Let | ClauseKind::LetTuple => "let",
            ClauseKind::Select => "select",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Index into a chain's binding table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct BindingId(u32);

impl BindingId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        BindingId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Contiguous slice of the binding table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug)]
pub struct BindingRange {
    pub start: u32,
    pub len: u16,
}

impl BindingRange {
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    #[inline]
    pub const fn new(start: u32, len: u16) -> Self {
        Self { start, len }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    pub fn iter(self) -> impl Iterator<Item = BindingId> {
        (self.start..self.start + u32::from(self.len)).map(BindingId::new)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingOrigin {
    RangeVariable,
    PatternVariable,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Mutability {
    /// Assignable inside the introducing clause, read-only afterwards.
    MutableWithinIntroducingClause,
    ImmutableThereafter,
}

/// Outcome of the introducing expression under which a binding is assigned.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AssignmentCondition {
    /// Range variables: assigned unconditionally.
    Always,
    /// Assigned whenever the introducing expression evaluates to `true`.
    WhenTrue,
    /// Assigned whenever the introducing expression evaluates to `false`.
    WhenFalse,
    /// Assigned on some paths of both outcomes only.
    Indeterminate,
}

/// A variable introduced by a clause.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct VariableBinding {
    pub name: Name,
    pub ty: Ty,
    pub origin: BindingOrigin,
    pub mutability: Mutability,
    pub condition: AssignmentCondition,
    /// Index of the introducing clause.
    pub clause: usize,
    pub span: Span,
}

impl VariableBinding {
    pub fn range(name: Name, ty: Ty, clause: usize, span: Span) -> Self {
        VariableBinding {
            name,
            ty,
            origin: BindingOrigin::RangeVariable,
            mutability: Mutability::ImmutableThereafter,
            condition: AssignmentCondition::Always,
            clause,
            span,
        }
    }

    pub fn pattern(
        name: Name,
        ty: Ty,
        condition: AssignmentCondition,
        clause: usize,
        span: Span,
    ) -> Self {
        VariableBinding {
            name,
            ty,
            origin: BindingOrigin::PatternVariable,
            mutability: Mutability::MutableWithinIntroducingClause,
            condition,
            clause,
            span,
        }
    }

    pub fn is_pattern(&self) -> bool {
        self.origin == BindingOrigin::PatternVariable
    }

    /// Mutability is a property of the (clause, binding) pair.
    pub fn is_mutable_in(&self, clause: usize) -> bool {
        self.mutability == Mutability::MutableWithinIntroducingClause && clause == self.clause
    }
}

/// One clause of a chain.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ClauseNode {
    pub kind: ClauseKind,
    pub expr: ExprId,
    /// Range variables, in positional order for `LetTuple`.
    pub range_vars: BindingRange,
    /// Pattern variables found in `expr`, one per distinct name.
    pub pattern_vars: BindingRange,
    /// Static type of the clause's value (element type for generators,
    /// composite type for `LetTuple`, result type for `Select`).
    pub ty: Ty,
    pub span: Span,
}

impl ClauseNode {
    /// All bindings this clause introduces, range variables first.
    pub fn introduces(&self) -> impl Iterator<Item = BindingId> {
        self.range_vars.iter().chain(self.pattern_vars.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_where_gates() {
        assert!(ClauseKind::Where.gates_continuation());
        for kind in [
            ClauseKind::Source,
            ClauseKind::From,
            ClauseKind::Let,
            ClauseKind::LetTuple,
            ClauseKind::Select,
        ] {
            assert!(!kind.gates_continuation(), "{kind:?}");
        }
    }

    #[test]
    fn binding_range_iterates() {
        let ids: Vec<_> = BindingRange::new(3, 2).iter().collect();
        assert_eq!(ids, vec![BindingId::new(3), BindingId::new(4)]);
        assert!(BindingRange::EMPTY.iter().next().is_none());
    }

    #[test]
    fn pattern_mutable_only_in_own_clause() {
        let binding = VariableBinding::pattern(
            Name::from_raw(1),
            Ty::Int,
            AssignmentCondition::WhenTrue,
            2,
            Span::DUMMY,
        );
        assert!(binding.is_mutable_in(2));
        assert!(!binding.is_mutable_in(3));

        let range = VariableBinding::range(Name::from_raw(2), Ty::Int, 0, Span::DUMMY);
        assert!(!range.is_mutable_in(0));
    }
}
