//! String/symbol interning.
//!
//! A single dedup table maps byte content to a small integer id, shared by
//! every phase so that string and symbol values compare for equality in
//! O(1) once interned. Strings and symbols share this table but are tagged
//! differently at the [`crate::value::Value`] level: interning only
//! guarantees identical bytes collapse to the same id, it does not itself
//! distinguish the two kinds.

use ahash::AHashMap;

/// Id of an interned byte string, stable for the lifetime of the owning
/// [`Interns`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    /// Exposes the raw id, used to stash a symbol's identity inside a
    /// [`crate::value::Value::Placeholder`] payload so a letrec violation
    /// can name the offending binding without a second side table.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn from_u32(raw: u32) -> Self {
        Self(raw)
    }
}

/// Append-only interning table.
///
/// Used both for symbol names (identifiers, module-registry keys, import
/// names) and for string literals, which share representation but differ
/// by tag at the value level.
#[derive(Debug, Default)]
pub struct Interns {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning its stable id. Re-interning identical bytes
    /// returns the existing id rather than allocating again.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interning table overflowed u32"));
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinterning_returns_the_same_id() {
        let mut interns = Interns::new();
        let a = interns.intern("foo");
        let b = interns.intern("bar");
        let c = interns.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(interns.get(a), "foo");
        assert_eq!(interns.get(b), "bar");
    }
}
