//! Diagnostic system for query-lowering errors.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (where it went wrong)
//! - Clause index and variable name (which part of the chain)
//! - Suggestions (how to fix)

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Label};
pub use error_code::ErrorCode;
