//! Compilation-wide lowering configuration.
//!
//! The restriction policy decides how far today's surface syntax lets
//! pattern variables escape their introducing clause. It is threaded by
//! reference through every pass and never mutated mid-compilation, so a
//! later language version only has to add a variant here and teach the
//! flow analyzer and scope guard about it.

use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the restriction policy.
pub const POLICY_ENV_VAR: &str = "QUARRY_PATTERN_SCOPE";

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum RestrictionPolicy {
    /// Pattern variables are confined to their own clause.
    #[default]
    DisallowPatternVariablesInClauses,
    /// Pattern variables may flow past gating clauses, but no two pattern
    /// variables in a chain may share a name.
    RequireGlobalNameUniqueness,
}

impl RestrictionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionPolicy::DisallowPatternVariablesInClauses => "disallow",
            RestrictionPolicy::RequireGlobalNameUniqueness => "unique",
        }
    }

    /// Whether pattern variables may be read after their introducing clause.
    pub fn allows_propagation(self) -> bool {
        matches!(self, RestrictionPolicy::RequireGlobalNameUniqueness)
    }
}

impl fmt::Display for RestrictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown pattern scope policy `{0}` (expected `disallow` or `unique`)")]
pub struct UnknownPolicy(pub String);

impl FromStr for RestrictionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disallow" => Ok(RestrictionPolicy::DisallowPatternVariablesInClauses),
            "unique" => Ok(RestrictionPolicy::RequireGlobalNameUniqueness),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

/// Settings shared by every chain in one compilation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct LowerConfig {
    pub policy: RestrictionPolicy,
}

impl LowerConfig {
    pub fn new(policy: RestrictionPolicy) -> Self {
        LowerConfig { policy }
    }

    /// Read the policy from [`POLICY_ENV_VAR`], falling back to the default.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(POLICY_ENV_VAR).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let policy = match value {
            None => RestrictionPolicy::default(),
            Some(raw) => raw.parse().unwrap_or_else(|err: UnknownPolicy| {
                tracing::warn!(%err, "falling back to default pattern scope policy");
                RestrictionPolicy::default()
            }),
        };
        LowerConfig { policy }
    }
}
