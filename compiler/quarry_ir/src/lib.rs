//! Quarry IR - data types for query-clause lowering.
//!
//! - Interned names (`Name`, `StringInterner`) and source spans
//! - The static types the lowering stage inspects (`Ty`)
//! - A flat expression arena for clause expressions
//! - The clause-chain data model (`ClauseNode`, `VariableBinding`)
//! - The combinator descriptors produced for the code generator
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: identifiers are `Name(u32)`
//! - **Flatten Everything**: no `Box<Expr>`, children are `ExprId(u32)` indices
//! - **Derived data is separate**: flow facts and carriers are computed per
//!   lowering and never stored on these types

mod clause;
mod combinator;
mod expr;
mod interner;
mod name;
mod span;
mod ty;

pub use clause::{
    AssignmentCondition, BindingId, BindingOrigin, BindingRange, ClauseKind, ClauseNode,
    Mutability, VariableBinding,
};
pub use combinator::{
    CarrierField, CarrierId, CarrierShape, CombinatorCall, CombinatorChain, CombinatorKind,
    OutcomeRepr, StageBody, StageShape,
};
pub use expr::{BinaryOp, Expr, ExprArena, ExprId, ExprKind, ExprRange, UnaryOp};
pub use interner::StringInterner;
pub use name::Name;
pub use span::Span;
pub use ty::Ty;
