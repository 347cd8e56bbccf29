//! Lowering errors and their diagnostic conversion.
//!
//! Every error is static and terminal for its chain: a chain either lowers
//! completely or reports its errors and produces no descriptors. Error codes
//! live in the E4xxx range; broken invariants between passes are E9001.

use std::fmt;

use quarry_diagnostic::{Diagnostic, ErrorCode};
use quarry_ir::Span;

use crate::RestrictionPolicy;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("malformed clause chain at clause {clause}: {reason}")]
    MalformedChain {
        clause: usize,
        reason: String,
        span: Span,
    },

    #[error("pattern variable `{name}` is ambiguous: {reason}")]
    AmbiguousPatternVariable {
        clause: usize,
        name: String,
        reason: String,
        span: Span,
    },

    #[error("pattern variable `{name}` violates the `{policy}` scope policy: {reason}")]
    PatternVariableScopeViolation {
        clause: usize,
        name: String,
        policy: RestrictionPolicy,
        reason: String,
        span: Span,
    },

    #[error(
        "deconstruction binds {pattern} name(s) but the value has {}",
        describe_arity(.composite)
    )]
    ArityMismatch {
        clause: usize,
        pattern: usize,
        composite: Option<usize>,
        span: Span,
    },

    #[error("`{name}` is not definitely assigned in clause {clause}")]
    UnassignedVariableUse {
        clause: usize,
        name: String,
        span: Span,
    },

    #[error("`{name}` is already in scope at clause {clause}")]
    NameAlreadyInScope {
        clause: usize,
        name: String,
        span: Span,
    },

    #[error("cannot assign to query variable `{name}` in clause {clause}")]
    ReadOnlyAssignment {
        clause: usize,
        name: String,
        span: Span,
    },

    /// A pass received input an earlier pass should have ruled out.
    #[error("internal lowering error at clause {clause}: {reason}")]
    Internal {
        clause: usize,
        reason: String,
        span: Span,
    },
}

fn describe_arity(composite: &Option<usize>) -> String {
    match composite {
        Some(n) => format!("{n} part(s)"),
        None => "no positional parts".to_string(),
    }
}

impl LowerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            LowerError::MalformedChain { .. } => ErrorCode::E4001,
            LowerError::AmbiguousPatternVariable { .. } => ErrorCode::E4002,
            LowerError::PatternVariableScopeViolation { .. } => ErrorCode::E4003,
            LowerError::ArityMismatch { .. } => ErrorCode::E4004,
            LowerError::UnassignedVariableUse { .. } => ErrorCode::E4005,
            LowerError::NameAlreadyInScope { .. } => ErrorCode::E4006,
            LowerError::ReadOnlyAssignment { .. } => ErrorCode::E4007,
            LowerError::Internal { .. } => ErrorCode::E9001,
        }
    }

    /// Index of the offending clause.
    pub fn clause(&self) -> usize {
        match self {
            LowerError::MalformedChain { clause, .. }
            | LowerError::AmbiguousPatternVariable { clause, .. }
            | LowerError::PatternVariableScopeViolation { clause, .. }
            | LowerError::ArityMismatch { clause, .. }
            | LowerError::UnassignedVariableUse { clause, .. }
            | LowerError::NameAlreadyInScope { clause, .. }
            | LowerError::ReadOnlyAssignment { clause, .. }
            | LowerError::Internal { clause, .. } => *clause,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LowerError::MalformedChain { span, .. }
            | LowerError::AmbiguousPatternVariable { span, .. }
            | LowerError::PatternVariableScopeViolation { span, .. }
            | LowerError::ArityMismatch { span, .. }
            | LowerError::UnassignedVariableUse { span, .. }
            | LowerError::NameAlreadyInScope { span, .. }
            | LowerError::ReadOnlyAssignment { span, .. }
            | LowerError::Internal { span, .. } => *span,
        }
    }

    /// Name of the offending variable, where the error is about one.
    pub fn variable(&self) -> Option<&str> {
        match self {
            LowerError::AmbiguousPatternVariable { name, .. }
            | LowerError::PatternVariableScopeViolation { name, .. }
            | LowerError::UnassignedVariableUse { name, .. }
            | LowerError::NameAlreadyInScope { name, .. }
            | LowerError::ReadOnlyAssignment { name, .. } => Some(name),
            LowerError::MalformedChain { .. }
            | LowerError::ArityMismatch { .. }
            | LowerError::Internal { .. } => None,
        }
    }

    fn primary_label(&self) -> &'static str {
        match self {
            LowerError::MalformedChain { .. } => "clause not allowed here",
            LowerError::AmbiguousPatternVariable { .. } => "conflicting declaration",
            LowerError::PatternVariableScopeViolation { .. } => "not visible in this clause",
            LowerError::ArityMismatch { .. } => "wrong number of names",
            LowerError::UnassignedVariableUse { .. } => "not definitely assigned here",
            LowerError::NameAlreadyInScope { .. } => "name already in use",
            LowerError::ReadOnlyAssignment { .. } => "read-only here",
            LowerError::Internal { .. } => "while lowering this clause",
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            LowerError::PatternVariableScopeViolation { name, .. } => Some(format!(
                "bind `{name}` with a `let` clause to use it in later clauses"
            )),
            LowerError::UnassignedVariableUse { name, .. } => Some(format!(
                "introduce `{name}` in a `where` clause so it is assigned whenever execution continues"
            )),
            LowerError::NameAlreadyInScope { name, .. } => {
                Some(format!("rename this `{name}` binding"))
            }
            LowerError::ArityMismatch {
                composite: Some(n), ..
            } => Some(format!("bind exactly {n} name(s)")),
            _ => None,
        }
    }

    /// Convert into a `Diagnostic` tagged with clause index and variable.
    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.error_code())
            .with_message(self.to_string())
            .with_label(self.span(), self.primary_label())
            .with_clause(self.clause());
        if let Some(name) = self.variable() {
            diag = diag.with_variable(name);
        }
        if let Some(suggestion) = self.suggestion() {
            diag = diag.with_suggestion(suggestion);
        }
        diag
    }
}

/// All errors reported for one chain. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainErrors {
    errors: Vec<LowerError>,
}

impl ChainErrors {
    /// Wrap collected errors, `None` if there are none.
    pub fn from_vec(errors: Vec<LowerError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(ChainErrors { errors })
        }
    }

    pub fn errors(&self) -> &[LowerError] {
        &self.errors
    }

    pub fn first(&self) -> &LowerError {
        &self.errors[0]
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(LowerError::to_diagnostic).collect()
    }
}

impl From<LowerError> for ChainErrors {
    fn from(error: LowerError) -> Self {
        ChainErrors {
            errors: vec![error],
        }
    }
}

impl IntoIterator for ChainErrors {
    type Item = LowerError;
    type IntoIter = std::vec::IntoIter<LowerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ChainErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainErrors {}
