//! Definite assignment of pattern variables by boolean outcome.
//!
//! For an expression `e`, computes the names assigned whenever `e` is
//! `true` and whenever `e` is `false`:
//!
//! | Expression | when true | when false |
//! |------------|-----------|------------|
//! | `x is T n` / `TryParse(x, out n)` | `A(x) ∪ {n}` | `A(x)` |
//! | `a && b` | `T(a) ∪ T(b)` | `F(a) ∩ (T(a) ∪ F(b))` |
//! | `a \|\| b` | `T(a) ∩ (F(a) ∪ T(b))` | `F(a) ∪ F(b)` |
//! | `!a` | `F(a)` | `T(a)` |
//! | other | `A(e)` | `A(e)` |
//!
//! where `A(e) = T(e) ∩ F(e)` is what `e` assigns unconditionally.

use quarry_ir::{AssignmentCondition, BinaryOp, ExprArena, ExprId, ExprKind, Name, UnaryOp};
use rustc_hash::FxHashSet;

type NameSet = FxHashSet<Name>;

pub(super) struct Outcomes {
    when_true: NameSet,
    when_false: NameSet,
}

impl Outcomes {
    fn uniform(set: NameSet) -> Self {
        Outcomes {
            when_false: set.clone(),
            when_true: set,
        }
    }

    fn unconditional(&self) -> NameSet {
        self.when_true
            .intersection(&self.when_false)
            .copied()
            .collect()
    }

    /// The condition under which `name` is assigned.
    pub(super) fn condition(&self, name: Name) -> AssignmentCondition {
        if self.when_true.contains(&name) {
            AssignmentCondition::WhenTrue
        } else if self.when_false.contains(&name) {
            AssignmentCondition::WhenFalse
        } else {
            AssignmentCondition::Indeterminate
        }
    }
}

pub(super) fn outcomes(arena: &ExprArena, id: ExprId) -> Outcomes {
    match &arena.get_expr(id).kind {
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            let l = outcomes(arena, *left);
            let r = outcomes(arena, *right);
            let when_true = l.when_true.union(&r.when_true).copied().collect();
            let right_false: NameSet = l.when_true.union(&r.when_false).copied().collect();
            let when_false = l.when_false.intersection(&right_false).copied().collect();
            Outcomes {
                when_true,
                when_false,
            }
        }
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            let l = outcomes(arena, *left);
            let r = outcomes(arena, *right);
            let right_true: NameSet = l.when_false.union(&r.when_true).copied().collect();
            let when_true = l.when_true.intersection(&right_true).copied().collect();
            let when_false = l.when_false.union(&r.when_false).copied().collect();
            Outcomes {
                when_true,
                when_false,
            }
        }
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => {
            let inner = outcomes(arena, *operand);
            Outcomes {
                when_true: inner.when_false,
                when_false: inner.when_true,
            }
        }
        ExprKind::TypeTest { operand, .. } | ExprKind::TryParse { operand, .. } => {
            let base = outcomes(arena, *operand).unconditional();
            let mut when_true = base.clone();
            if let Some(name) = arena.get_expr(id).kind.pattern_binding() {
                when_true.insert(name);
            }
            Outcomes {
                when_true,
                when_false: base,
            }
        }
        ExprKind::Assign { target, value } => {
            let mut set = outcomes(arena, *value).unconditional();
            set.insert(*target);
            Outcomes::uniform(set)
        }
        _ => {
            let mut set = NameSet::default();
            for child in arena.children(id) {
                set.extend(outcomes(arena, child).unconditional());
            }
            Outcomes::uniform(set)
        }
    }
}
