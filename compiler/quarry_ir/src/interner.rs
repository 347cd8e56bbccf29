//! String interner for identifiers.
//!
//! Chains lowered in parallel share one interner, so lookups take a read
//! lock and only first-time interning takes the write lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::Name;

#[derive(Default)]
struct InternTable {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

/// Thread-safe string interner.
pub struct StringInterner {
    table: RwLock<InternTable>,
}

impl StringInterner {
    /// Create an interner with the empty string pre-interned as [`Name::EMPTY`].
    pub fn new() -> Self {
        let mut table = InternTable::default();
        table.map.insert("", 0);
        table.strings.push("");
        StringInterner {
            table: RwLock::new(table),
        }
    }

    /// Intern a string, returning its `Name`.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` distinct strings are interned.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(&raw) = self.table.read().map.get(s) {
            return Name::from_raw(raw);
        }

        let mut table = self.table.write();
        // Another thread may have won the race between the two locks.
        if let Some(&raw) = table.map.get(s) {
            return Name::from_raw(raw);
        }

        let raw = u32::try_from(table.strings.len())
            .unwrap_or_else(|_| panic!("string interner exceeded u32::MAX entries"));
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        table.strings.push(leaked);
        table.map.insert(leaked, raw);
        Name::from_raw(raw)
    }

    /// Look up the string for a name.
    ///
    /// Names from a different interner resolve to `""`.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.table
            .read()
            .strings
            .get(name.index())
            .copied()
            .unwrap_or("")
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}
