use std::fmt;

/// Error codes for query-lowering diagnostics.
///
/// Format: E4xxx for clause-chain lowering, E9xxx for internal errors.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    /// Clause kind in a position the chain grammar forbids
    E4001,
    /// Incompatible same-name pattern variables
    E4002,
    /// Pattern variable propagation forbidden by the restriction policy
    E4003,
    /// Deconstruction arity mismatch
    E4004,
    /// Use of a pattern variable that is not definitely assigned
    E4005,
    /// Binding reuses a name that is still in scope
    E4006,
    /// Assignment to a read-only query variable
    E4007,

    /// Internal compiler error
    E9001,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Short description, suitable for `--explain`-style listings.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E4001 => "malformed query clause chain",
            ErrorCode::E4002 => "ambiguous pattern variable",
            ErrorCode::E4003 => "pattern variable scope violation",
            ErrorCode::E4004 => "deconstruction arity mismatch",
            ErrorCode::E4005 => "use of unassigned pattern variable",
            ErrorCode::E4006 => "name already in scope",
            ErrorCode::E4007 => "assignment to read-only query variable",
            ErrorCode::E9001 => "internal compiler error",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render() {
        assert_eq!(ErrorCode::E4003.to_string(), "E4003");
        assert_eq!(ErrorCode::E4004.description(), "deconstruction arity mismatch");
        assert!(ErrorCode::E9001.is_internal());
        assert!(!ErrorCode::E4001.is_internal());
    }
}
