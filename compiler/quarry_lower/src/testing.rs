//! Testing utilities for the lowering passes.
//!
//! [`QueryBuilder`] stands in for the external parser/binder: it allocates
//! clause expressions into an arena and records clause descriptions, giving
//! every node a distinct span so diagnostics can be asserted precisely.
//!
//! ```
//! use quarry_ir::{StringInterner, Ty};
//! use quarry_lower::testing::QueryBuilder;
//!
//! let interner = StringInterner::new();
//! let mut q = QueryBuilder::new(&interner);
//! let src = q.ident("strings");
//! q.source("s", src, Ty::Str);
//! let s = q.ident("s");
//! let test = q.try_parse(s, "i");
//! q.filter(test);
//! let i = q.ident("i");
//! q.select(i, Ty::Int);
//! let chain = q.build().unwrap();
//! assert_eq!(chain.len(), 3);
//! ```

use quarry_ir::{
    BinaryOp, Expr, ExprArena, ExprId, ExprKind, Name, Span, StringInterner, Ty, UnaryOp,
};

use crate::{ClauseChain, ClauseDesc, LowerError};

pub struct QueryBuilder<'a> {
    interner: &'a StringInterner,
    arena: ExprArena,
    clauses: Vec<ClauseDesc>,
    offset: u32,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(interner: &'a StringInterner) -> Self {
        QueryBuilder {
            interner,
            arena: ExprArena::new(),
            clauses: Vec::new(),
            offset: 0,
        }
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        let span = Span::new(self.offset, self.offset + 1);
        self.offset += 2;
        self.arena.alloc_expr(Expr::new(kind, span))
    }

    pub fn span_of(&self, id: ExprId) -> Span {
        self.arena.get_expr(id).span
    }

    // Expressions

    pub fn ident(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.alloc(ExprKind::Ident(name))
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.alloc(ExprKind::Int(value))
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.alloc(ExprKind::Bool(value))
    }

    pub fn str(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.alloc(ExprKind::Str(name))
    }

    pub fn null(&mut self) -> ExprId {
        self.alloc(ExprKind::Null)
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right })
    }

    pub fn and(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::And, left, right)
    }

    pub fn or(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::Or, left, right)
    }

    pub fn add(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn sub(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::Sub, left, right)
    }

    pub fn gt(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::Gt, left, right)
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        self.alloc(ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        })
    }

    /// `operand is ty binding`; an empty `binding` is a bare type test.
    pub fn is_type(&mut self, operand: ExprId, ty: Ty, binding: &str) -> ExprId {
        let binding = self.name(binding);
        self.alloc(ExprKind::TypeTest {
            operand,
            ty,
            binding,
        })
    }

    pub fn try_parse(&mut self, operand: ExprId, out: &str) -> ExprId {
        let out = self.name(out);
        self.alloc(ExprKind::TryParse { operand, out })
    }

    pub fn assign(&mut self, target: &str, value: ExprId) -> ExprId {
        let target = self.name(target);
        self.alloc(ExprKind::Assign { target, value })
    }

    pub fn tuple(&mut self, elems: impl IntoIterator<Item = ExprId>) -> ExprId {
        let range = self.arena.alloc_expr_list(elems);
        self.alloc(ExprKind::Tuple(range))
    }

    pub fn list(&mut self, elems: impl IntoIterator<Item = ExprId>) -> ExprId {
        let range = self.arena.alloc_expr_list(elems);
        self.alloc(ExprKind::List(range))
    }

    pub fn field(&mut self, receiver: ExprId, index: u32) -> ExprId {
        self.alloc(ExprKind::Field { receiver, index })
    }

    // Clauses

    fn push_clause(&mut self, desc: ClauseDesc) {
        let span = self
            .arena
            .try_get_expr(desc.expr)
            .map_or(Span::DUMMY, |e| e.span);
        self.clauses.push(desc.with_span(span));
    }

    pub fn source(&mut self, name: &str, expr: ExprId, elem: Ty) {
        let name = self.name(name);
        self.push_clause(ClauseDesc::source(name, expr, elem));
    }

    pub fn from(&mut self, name: &str, expr: ExprId, elem: Ty) {
        let name = self.name(name);
        self.push_clause(ClauseDesc::from(name, expr, elem));
    }

    pub fn filter(&mut self, expr: ExprId) {
        self.push_clause(ClauseDesc::filter(expr));
    }

    pub fn let_(&mut self, name: &str, expr: ExprId, ty: Ty) {
        let name = self.name(name);
        self.push_clause(ClauseDesc::let_(name, expr, ty));
    }

    pub fn let_tuple(&mut self, names: &[&str], expr: ExprId, ty: Ty) {
        let names = names.iter().map(|n| self.name(n)).collect();
        self.push_clause(ClauseDesc::let_tuple(names, expr, ty));
    }

    pub fn select(&mut self, expr: ExprId, ty: Ty) {
        self.push_clause(ClauseDesc::select(expr, ty));
    }

    /// Push an arbitrary clause description unchanged.
    pub fn clause(&mut self, desc: ClauseDesc) {
        self.clauses.push(desc);
    }

    pub fn into_parts(self) -> (ExprArena, Vec<ClauseDesc>) {
        (self.arena, self.clauses)
    }

    pub fn build(self) -> Result<ClauseChain, LowerError> {
        ClauseChain::build(self.arena, self.clauses)
    }
}
