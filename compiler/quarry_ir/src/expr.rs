//! Flat expression arena.
//!
//! Clause expressions arrive already parsed and type-checked. They are
//! stored contiguously and referenced by `ExprId`; child lists live in a
//! side table addressed by `ExprRange`.

use std::fmt;

use smallvec::SmallVec;

use crate::{Name, Span, Ty};

/// Index into an [`ExprArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Sentinel for "no expression".
    pub const INVALID: ExprId = ExprId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ExprId({})", self.0)
        } else {
            write!(f, "ExprId::INVALID")
        }
    }
}

/// Range into the arena's expression-list table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprRange {
    pub start: u32,
    pub len: u16,
}

impl ExprRange {
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
}

impl fmt::Debug for ExprRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExprRange({}..{})",
            self.start,
            self.start + u32::from(self.len)
        )
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    /// Short-circuit `&&`.
    And,
    /// Short-circuit `||`.
    Or,
    Add,
    Sub,
    Mul,
    Eq,
    NotEq,
    Lt,
    Gt,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression node kinds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(Name),
    Null,
    /// Variable reference: a chain variable or a captured outer local.
    Ident(Name),
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    /// Refutable type test `operand is ty binding`.
    ///
    /// `binding` is `Name::EMPTY` for a bare test without designation.
    TypeTest {
        operand: ExprId,
        ty: Ty,
        binding: Name,
    },
    /// Refutable integer parse `TryParse(operand, out binding)`.
    TryParse { operand: ExprId, out: Name },
    /// `target = value`, yielding `value`.
    Assign { target: Name, value: ExprId },
    Tuple(ExprRange),
    List(ExprRange),
    /// Positional member access `receiver.index`.
    Field { receiver: ExprId, index: u32 },
}

impl ExprKind {
    /// The variable a refutable pattern test introduces, if any.
    pub fn pattern_binding(&self) -> Option<Name> {
        match self {
            ExprKind::TypeTest { binding, .. } if binding.is_present() => Some(*binding),
            ExprKind::TryParse { out, .. } if out.is_present() => Some(*out),
            _ => None,
        }
    }

    /// Static type of the variable introduced by a pattern test.
    pub fn pattern_binding_ty(&self) -> Ty {
        match self {
            ExprKind::TypeTest { ty, .. } => ty.clone(),
            ExprKind::TryParse { .. } => Ty::Int,
            _ => Ty::Unknown,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// Contiguous storage for the expressions of one clause chain.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprArena {
    exprs: Vec<Expr>,
    expr_lists: Vec<ExprId>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an expression, returning its ID.
    ///
    /// # Panics
    /// Panics if the arena exceeds `u32::MAX - 1` expressions.
    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let raw = u32::try_from(self.exprs.len())
            .ok()
            .filter(|&raw| raw != u32::MAX)
            .unwrap_or_else(|| panic!("expression arena overflow"));
        self.exprs.push(expr);
        ExprId::new(raw)
    }

    /// Allocate a list of expressions, returning its range.
    ///
    /// # Panics
    /// Panics if the list exceeds `u16::MAX` elements.
    pub fn alloc_expr_list(&mut self, exprs: impl IntoIterator<Item = ExprId>) -> ExprRange {
        let start = u32::try_from(self.expr_lists.len())
            .unwrap_or_else(|_| panic!("expression list table overflow"));
        self.expr_lists.extend(exprs);
        let len = u16::try_from(self.expr_lists.len() - start as usize)
            .unwrap_or_else(|_| panic!("expression list longer than u16::MAX"));
        ExprRange::new(start, len)
    }

    /// Get an expression by ID.
    ///
    /// # Panics
    /// Panics if `id` is out of bounds.
    #[inline]
    #[track_caller]
    pub fn get_expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// Get an expression by ID, `None` if it does not belong to this arena.
    #[inline]
    pub fn try_get_expr(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.index())
    }

    #[inline]
    pub fn get_expr_list(&self, range: ExprRange) -> &[ExprId] {
        let start = range.start as usize;
        &self.expr_lists[start..start + range.len()]
    }

    #[inline]
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// Direct children of an expression, in evaluation order.
    pub fn children(&self, id: ExprId) -> SmallVec<[ExprId; 4]> {
        match &self.get_expr(id).kind {
            ExprKind::Int(_)
            | ExprKind::Bool(_)
            | ExprKind::Str(_)
            | ExprKind::Null
            | ExprKind::Ident(_) => SmallVec::new(),
            ExprKind::Binary { left, right, .. } => smallvec::smallvec![*left, *right],
            ExprKind::Unary { operand, .. }
            | ExprKind::TypeTest { operand, .. }
            | ExprKind::TryParse { operand, .. } => smallvec::smallvec![*operand],
            ExprKind::Assign { value, .. } => smallvec::smallvec![*value],
            ExprKind::Field { receiver, .. } => smallvec::smallvec![*receiver],
            ExprKind::Tuple(range) | ExprKind::List(range) => {
                self.get_expr_list(*range).iter().copied().collect()
            }
        }
    }

    /// Every expression reachable from `root`, pre-order.
    pub fn walk(&self, root: ExprId) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}
