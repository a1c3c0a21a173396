//! Typed argument binding for native functions (spec.md §4.7's native-call
//! contract): a declared positional parameter list, checked and bound
//! against a call's actual argument vector.

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::location::CodeRange;
use crate::value::Value;

/// The runtime tag a native parameter slot is declared to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Number,
    Boolean,
    String,
    Symbol,
    List,
    Function,
}

impl ParamType {
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Number => matches!(value, Value::Number(_)),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::String => matches!(value, Value::Str(_)),
            Self::Symbol => matches!(value, Value::Symbol(_)),
            Self::List => matches!(value, Value::List(_)),
            Self::Function => matches!(value, Value::Function(_) | Value::Native(_)),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::List => "list",
            Self::Function => "function",
        }
    }
}

/// A single declared parameter slot. `default` is only consulted when the
/// slot is not `required` and the call supplied fewer arguments than this
/// slot's position.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub required: bool,
    pub ty: ParamType,
    pub default: Option<Value>,
}

impl ParamSpec {
    #[must_use]
    pub fn required(ty: ParamType) -> Self {
        Self { required: true, ty, default: None }
    }

    #[must_use]
    pub fn optional(ty: ParamType, default: Value) -> Self {
        Self { required: false, ty, default: Some(default) }
    }
}

/// The declared shape of a native function's argument list: a positional
/// prefix of [`ParamSpec`] slots, optionally followed by an unbounded tail
/// that must all satisfy a single [`ParamType`] (`+`/`*`/`list` take this
/// shape: zero declared positional slots, a `Number`/`Any` variadic tail).
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub name: &'static str,
    params: Vec<ParamSpec>,
    variadic: Option<ParamType>,
}

impl Signature {
    #[must_use]
    pub fn new(name: &'static str, params: Vec<ParamSpec>) -> Self {
        debug_assert!(
            {
                let mut seen_optional = false;
                let mut ok = true;
                for p in &params {
                    if !p.required {
                        seen_optional = true;
                    } else if seen_optional {
                        ok = false;
                    }
                }
                ok
            },
            "required parameters must all precede optional ones"
        );
        Self { name, params, variadic: None }
    }

    /// Like [`Self::new`], but any argument beyond `params` is accepted
    /// provided it satisfies `variadic`'s type, with no upper bound on
    /// count.
    #[must_use]
    pub fn new_variadic(name: &'static str, params: Vec<ParamSpec>, variadic: ParamType) -> Self {
        let mut sig = Self::new(name, params);
        sig.variadic = Some(variadic);
        sig
    }

    #[must_use]
    pub fn min(&self) -> usize {
        self.params.iter().filter(|p| p.required).count()
    }

    /// `None` means unbounded (a variadic tail is declared).
    #[must_use]
    pub fn max(&self) -> Option<usize> {
        if self.variadic.is_some() { None } else { Some(self.params.len()) }
    }

    /// Checks arity and per-slot types, then returns the bound argument
    /// vector: the positional prefix (missing optional slots filled from
    /// their declared default), followed by any variadic-tail arguments
    /// verbatim.
    pub fn bind(&self, args: &[Value], loc: CodeRange) -> Result<Vec<Value>, RuntimeError> {
        let min = self.min();
        if args.len() < min || self.max().is_some_and(|max| args.len() > max) {
            let expected = match self.max() {
                Some(max) if max == min => format!("exactly {min}"),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(RuntimeError::arity_mismatch(self.name, &expected, args.len(), loc));
        }
        let mut bound = Vec::with_capacity(args.len().max(self.params.len()));
        for (idx, spec) in self.params.iter().enumerate() {
            let value = match args.get(idx) {
                Some(v) => {
                    if !spec.ty.accepts(v) {
                        return Err(RuntimeError::bad_argument(idx + 1, spec.ty.name(), v.type_name(), loc));
                    }
                    *v
                }
                None => spec.default.expect("non-required slot beyond args must carry a default"),
            };
            bound.push(value);
        }
        if let Some(ty) = self.variadic {
            for (idx, v) in args.iter().enumerate().skip(self.params.len()) {
                if !ty.accepts(v) {
                    return Err(RuntimeError::bad_argument(idx + 1, ty.name(), v.type_name(), loc));
                }
                bound.push(*v);
            }
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_slots_reject_wrong_type() {
        let sig = Signature::new("f", vec![ParamSpec::required(ParamType::Number)]);
        let err = sig.bind(&[Value::Bool(true)], CodeRange::UNKNOWN).expect_err("type mismatch");
        assert_eq!(err.kind, RuntimeErrorKind::BadArgument);
    }

    #[test]
    fn optional_slot_falls_back_to_default() {
        let sig = Signature::new(
            "f",
            vec![ParamSpec::required(ParamType::Number), ParamSpec::optional(ParamType::Number, Value::Number(0.0))],
        );
        let bound = sig.bind(&[Value::Number(5.0)], CodeRange::UNKNOWN).expect("one arg satisfies min");
        assert_eq!(bound, vec![Value::Number(5.0), Value::Number(0.0)]);
    }

    #[test]
    fn too_many_arguments_is_arity_mismatch() {
        let sig = Signature::new("f", vec![ParamSpec::required(ParamType::Any)]);
        let err = sig.bind(&[Value::Nil, Value::Nil], CodeRange::UNKNOWN).expect_err("over max");
        assert_eq!(err.kind, RuntimeErrorKind::ArityMismatch);
    }

    #[test]
    fn variadic_tail_accepts_unbounded_matching_arguments() {
        let sig = Signature::new_variadic("+", vec![], ParamType::Number);
        let bound = sig.bind(&[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)], CodeRange::UNKNOWN).expect("all numbers");
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn variadic_tail_rejects_a_mistyped_argument() {
        let sig = Signature::new_variadic("+", vec![], ParamType::Number);
        let err = sig.bind(&[Value::Number(1.0), Value::Bool(true)], CodeRange::UNKNOWN).expect_err("non-number in tail");
        assert_eq!(err.kind, RuntimeErrorKind::BadArgument);
    }

    #[test]
    fn bad_argument_index_is_one_based() {
        // spec.md §8: `(+ 1 "a")` is reported as argument index 2.
        let sig = Signature::new_variadic("+", vec![], ParamType::Number);
        let err = sig.bind(&[Value::Number(1.0), Value::Str(crate::intern::StringId::from_u32(0))], CodeRange::UNKNOWN).expect_err("string in tail");
        assert!(err.message.contains('2'), "message should cite 1-based index 2: {}", err.message);
    }
}
