//! Interned identifier.

use std::fmt;

/// Interned identifier.
///
/// A plain index into the [`StringInterner`](crate::StringInterner) that
/// produced it. Equality and hashing are O(1) integer operations, so names
/// are used directly as map keys throughout the lowering passes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string. Used where a binding slot is absent
    /// (e.g. a type test with no designation: `o is int`).
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check whether this name designates anything.
    #[inline]
    pub const fn is_present(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::EMPTY
    }
}
