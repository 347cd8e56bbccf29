use std::fmt;

use quarry_ir::Span;

use crate::ErrorCode;

/// A labeled span with a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: false,
        }
    }
}

/// A structured error diagnostic.
///
/// Query-lowering diagnostics additionally record the offending clause
/// index and variable name so tooling can point at the clause without
/// re-resolving spans.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub labels: Vec<Label>,
    pub suggestions: Vec<String>,
    /// Index of the clause the diagnostic is about.
    pub clause: Option<usize>,
    /// Variable the diagnostic is about.
    pub variable: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode) -> Self {
        Diagnostic {
            code,
            message: String::new(),
            labels: Vec::new(),
            suggestions: Vec::new(),
            clause: None,
            variable: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a primary label at the error location.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label for context.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_clause(mut self, clause: usize) -> Self {
        self.clause = Some(clause);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(name.into());
        self
    }

    /// The primary span, if any label is primary.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels.iter().find(|l| l.is_primary).map(|l| l.span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error [{}]: {}", self.code, self.message)?;
        if let Some(clause) = self.clause {
            write!(f, " (clause {clause})")?;
        }
        for label in &self.labels {
            let marker = if label.is_primary { "-->" } else { "   " };
            write!(f, "\n  {marker} {:?}: {}", label.span, label.message)?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  = help: {suggestion}")?;
        }
        Ok(())
    }
}
