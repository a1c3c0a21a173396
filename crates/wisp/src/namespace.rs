//! The module registry: the flat, mutable `symbol -> value` table that
//! backs top-level `define` and every `LDS`/`IMP` lookup.
//!
//! Deliberately just an `AHashMap`, not the slot-array-plus-call-stack
//! machinery the rest of the VM uses for lexical locals: module-level
//! bindings are looked up by name from arbitrary functions at arbitrary
//! times (including from closures created long before the name was last
//! redefined), so there is no fixed frame they could live in. Resolving by
//! name on every access is what gives `LDS` its late-binding behavior (see
//! DESIGN.md's resolution of the redefinition open question).

use ahash::AHashMap;

use crate::intern::StringId;
use crate::value::Value;

/// Top-level symbol table owned by a [`crate::context::Context`].
///
/// Mutated only by `define`/`register_native`/`define_value`, all of which
/// run on the context-owning thread (see spec.md §5's shared-resources
/// note).
#[derive(Debug, Default)]
pub struct Namespace {
    bindings: AHashMap<StringId, Value>,
}

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, overwriting any previous binding. A second
    /// `define` of the same name is visible to every existing `LDS` site
    /// referencing it, since lookup is always by name at the moment of use.
    pub fn define(&mut self, name: StringId, value: Value) {
        self.bindings.insert(name, value);
    }

    #[must_use]
    pub fn get(&self, name: StringId) -> Option<Value> {
        self.bindings.get(&name).copied()
    }

    #[must_use]
    pub fn is_bound(&self, name: StringId) -> bool {
        self.bindings.contains_key(&name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interns;

    #[test]
    fn redefinition_is_visible_to_future_lookups() {
        let mut interns = Interns::new();
        let name = interns.intern("x");
        let mut ns = Namespace::new();
        ns.define(name, Value::Number(1.0));
        assert_eq!(ns.get(name), Some(Value::Number(1.0)));
        ns.define(name, Value::Number(2.0));
        assert_eq!(ns.get(name), Some(Value::Number(2.0)));
    }

    #[test]
    fn unbound_name_is_none() {
        let mut interns = Interns::new();
        let name = interns.intern("never-defined");
        let ns = Namespace::new();
        assert_eq!(ns.get(name), None);
    }
}
