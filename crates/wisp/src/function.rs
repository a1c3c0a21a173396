//! Runtime function representation: the compiled, immutable bytecode block
//! and the closures built over it.
//!
//! A `Code`-holding, `Rc`-shared function object split into two halves:
//! [`FunctionBlock`] is the natural Rust struct-of-arrays the compiler and
//! VM index into directly, replacing manually aligned memory blocks and
//! pointer arithmetic with the target language's own slice abstractions.
//! [`layout::encode`] in `bytecode/code.rs` separately produces a literal
//! header+arrays+string-pool byte blob for disassembly and debugging
//! tooling, without claiming any cross-platform persistence guarantee.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::intern::StringId;
use crate::location::CodeRange;
use crate::value::Value;

/// A function's arity, including the variadic-collect-to-list case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments required.
    Fixed(u8),
    /// At least `min` arguments; any extras are collected into a list bound
    /// to the last parameter.
    Variadic { min: u8 },
}

impl Arity {
    #[must_use]
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Self::Fixed(n) => argc == usize::from(n),
            Self::Variadic { min } => argc >= usize::from(min),
        }
    }

    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Fixed(n) => format!("exactly {n}"),
            Self::Variadic { min } => format!("at least {min}"),
        }
    }
}

/// An immutable, self-contained compiled function.
///
/// Owned by the module that compiled it and shared by `Rc` into every
/// closure built over it; `constants`/`imports`/`nested` are append-only
/// during compilation and frozen once [`crate::bytecode::compiler::Compiler`]
/// finishes with it.
#[derive(Debug)]
pub struct FunctionBlock {
    /// 32-bit packed instructions (opcode:6, operand:26 signed).
    pub instructions: Vec<u32>,
    /// Parallel to `instructions`: the source range each instruction was
    /// emitted from, so a traceback can point back at source text.
    pub locations: Vec<CodeRange>,
    /// Indices into the shared interner naming the module-level symbols
    /// this function references freely.
    pub imports: Vec<StringId>,
    /// Constants embedded at compile time, deduplicated by structural
    /// equality.
    pub constants: Vec<Value>,
    /// Nested lambda function blocks, indexed by `CLS k`.
    pub nested: Vec<Rc<FunctionBlock>>,
    /// This function's *own* env slot for each entry of a closure's
    /// `captured` array, in the same order. A capture's slot in the child's
    /// frame has no fixed relationship to wherever it lived in the parent,
    /// so this mapping has to travel with the function, not the call site.
    pub capture_slots: Vec<u16>,
    /// Every `letrec`-declared slot in this function, paired with the
    /// symbol it binds. A freshly pushed frame pre-fills exactly these
    /// slots with `Value::Placeholder` (see `bytecode/vm/mod.rs`); every
    /// other slot defaults to `Value::Nil`, since `let` always overwrites
    /// its slot immediately after allocating it and never leaves a window
    /// where it could be observed uninitialized.
    pub letrec_slots: Vec<(u16, StringId)>,
    pub arity: Arity,
    /// Number of environment slots (locals + captures) this function needs
    /// when a frame is pushed for it.
    pub env_size: u16,
    pub source_name: StringId,
    pub debug_name: StringId,
}

/// What a closure calls into: compiled bytecode, or a host-registered
/// native function.
#[derive(Debug, Clone)]
pub enum Callee {
    Bytecode(Rc<FunctionBlock>),
    /// Index into [`crate::context::Context`]'s native function table.
    Native(crate::context::NativeId),
}

/// A function paired with its captured environment.
///
/// Captures are materialized once, at `CLS` time, from the enclosing
/// frame's operand stack; they never change size or shrink afterward.
#[derive(Debug, Clone)]
pub struct Closure {
    pub callee: Callee,
    pub arity: Arity,
    pub captured: SmallVec<[Value; 4]>,
}

impl Closure {
    #[must_use]
    pub fn new_bytecode(function: Rc<FunctionBlock>, captured: SmallVec<[Value; 4]>) -> Self {
        let arity = function.arity;
        Self { callee: Callee::Bytecode(function), arity, captured }
    }

    #[must_use]
    pub fn new_native(id: crate::context::NativeId, arity: Arity) -> Self {
        Self { callee: Callee::Native(id), arity, captured: SmallVec::new() }
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(self.callee, Callee::Native(_))
    }
}
