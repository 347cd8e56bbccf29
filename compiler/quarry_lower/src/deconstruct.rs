//! Deconstruction expansion.
//!
//! A deconstructing `let (a, b) = expr` evaluates `expr` once and extracts
//! each positional part into its range variable. Parts nobody downstream
//! reads are never extracted, and the whole clause lowers to a single map
//! regardless of how many names the pattern binds.

use quarry_ir::{BindingId, ClauseKind, ExprArena, ExprId, ExprKind, Ty};

use crate::{ClauseChain, LowerError};

/// Positional extraction performed by one deconstructing clause.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Extraction {
    pub source: ExprId,
    /// Live range variables and the position each one is read from.
    pub parts: Vec<(BindingId, u32)>,
}

/// Number of positional parts `expr` produces, if it has any.
///
/// A tuple literal is counted directly; anything else relies on its static
/// type.
pub fn composite_arity(arena: &ExprArena, expr: ExprId, ty: &Ty) -> Option<usize> {
    match &arena.get_expr(expr).kind {
        ExprKind::Tuple(range) => Some(range.len()),
        _ => ty.arity(),
    }
}

/// Expand the deconstructing clause at `index`, keeping only the parts
/// for which `live` holds.
pub fn expand(
    chain: &ClauseChain,
    index: usize,
    live: impl Fn(BindingId) -> bool,
) -> Result<Extraction, LowerError> {
    let clause = chain.clause(index);
    debug_assert_eq!(clause.kind, ClauseKind::LetTuple);

    let pattern = clause.range_vars.len();
    let composite = composite_arity(chain.arena(), clause.expr, &clause.ty);
    if composite != Some(pattern) {
        return Err(LowerError::ArityMismatch {
            clause: index,
            pattern,
            composite,
            span: clause.span,
        });
    }

    let parts: Vec<_> = clause
        .range_vars
        .iter()
        .zip(0u32..)
        .filter(|&(binding, _)| live(binding))
        .collect();

    tracing::trace!(
        clause = index,
        arity = pattern,
        extracted = parts.len(),
        "deconstruction expanded"
    );

    Ok(Extraction {
        source: clause.expr,
        parts,
    })
}
