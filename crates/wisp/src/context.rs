//! The embedding surface: an owned interner/heap/module-registry triple
//! plus the native function table (spec.md §6's `context_new`/`load_script`,
//! paired with a `Vm`'s `new`/`exec`).

use std::rc::Rc;

use crate::allocator::{Allocator, SystemAllocator};
use crate::ast::AstBuilder;
use crate::bytecode::compile_program;
use crate::error::{RuntimeError, WispError};
use crate::function::{Arity, Closure, FunctionBlock};
use crate::heap::Heap;
use crate::intern::Interns;
use crate::location::CodeRange;
use crate::namespace::Namespace;
use crate::parser::Parser;
use crate::primitives;
use crate::signature::Signature;
use crate::value::Value;

/// Index into [`Context`]'s native function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(u32);

impl NativeId {
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A host function: reads already-bound, already-typechecked arguments
/// (per `signature`) and produces a value or a [`RuntimeError`] (most
/// commonly `UserError` for a primitive's own domain failures, e.g.
/// `head`/`tail` of an empty list).
pub type NativeFn = fn(&mut Context, &[Value], CodeRange) -> Result<Value, RuntimeError>;

struct NativeEntry {
    signature: Signature,
    func: NativeFn,
}

/// Owns everything a running script needs: the string table, the runtime
/// heap, the module registry, and the native function table. One
/// `Context` serves any number of [`crate::bytecode::vm::Vm`]s, but only
/// ever one at a time (spec.md §5's single-owner rule — a `Context` is not
/// `Send`/`Sync`).
pub struct Context {
    pub interns: Interns,
    pub heap: Heap,
    pub namespace: Namespace,
    natives: Vec<NativeEntry>,
    allocator: Box<dyn Allocator>,
    pub last_error: Option<WispError>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(Box::new(SystemAllocator))
    }

    #[must_use]
    pub fn with_allocator(allocator: Box<dyn Allocator>) -> Self {
        let mut ctx = Self { interns: Interns::new(), heap: Heap::new(), namespace: Namespace::new(), natives: vec![], allocator, last_error: None };
        primitives::install_prelude(&mut ctx);
        ctx
    }

    #[must_use]
    pub fn allocator(&self) -> &dyn Allocator {
        self.allocator.as_ref()
    }

    /// Registers a native function under `name` in the module registry,
    /// the same symbol table `define` writes into — a native and a
    /// `lambda` are interchangeable callees from bytecode's perspective.
    pub fn register_native(&mut self, name: &str, signature: Signature, func: NativeFn) -> NativeId {
        let id = NativeId(u32::try_from(self.natives.len()).expect("native table overflowed u32"));
        self.natives.push(NativeEntry { signature, func });
        // Natives' own `Signature` is the sole arity/type authority (see
        // `call_native`); the `Closure`'s `arity` field is consulted only
        // for bytecode closures, so any value satisfies it here.
        let closure = Closure::new_native(id, Arity::Variadic { min: 0 });
        let heap_id = self.heap.alloc_closure(closure);
        let name_id = self.interns.intern(name);
        self.namespace.define(name_id, Value::Function(heap_id));
        id
    }

    pub fn define_value(&mut self, name: &str, value: Value) {
        let name_id = self.interns.intern(name);
        self.namespace.define(name_id, value);
    }

    /// Parses, builds the AST, compiles, and links `source` into a
    /// top-level function ready for [`crate::bytecode::vm::Vm::exec`].
    /// Failure records a [`WispError`] on `self.last_error` and also
    /// returns it (spec.md §6: "failure records an error on ctx").
    pub fn load_script(&mut self, source_name: &str, source: &str) -> Result<Rc<FunctionBlock>, WispError> {
        match self.try_load_script(source_name, source) {
            Ok(block) => Ok(block),
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn try_load_script(&mut self, source_name: &str, source: &str) -> Result<Rc<FunctionBlock>, WispError> {
        let source_name_id = self.interns.intern(source_name);
        let mut parser = Parser::new(source);
        let program = parser.parse_program().map_err(WispError::from_parse)?;
        let mut builder = AstBuilder::new();
        let mut forms = Vec::with_capacity(program.len());
        for node in &program {
            forms.push(builder.build_top_level(&mut self.interns, node).map_err(WispError::from_compile)?);
        }
        compile_program(&mut self.interns, &mut self.heap, source_name_id, &forms).map_err(WispError::from_compile)
    }

    /// Binds `args` against the registered native's declared [`Signature`]
    /// and invokes it. Called only from `Vm`'s `CALL`/`TAIL` handling.
    pub(crate) fn call_native(&mut self, id: NativeId, args: &[Value], loc: CodeRange) -> Result<Value, RuntimeError> {
        let idx = id.as_usize();
        let bound = self.natives[idx].signature.bind(args, loc)?;
        let func = self.natives[idx].func;
        func(self, &bound, loc)
    }
}
