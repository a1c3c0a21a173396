#![doc = include_str!("../../../README.md")]

mod allocator;
mod ast;
mod bytecode;
mod context;
mod error;
mod function;
mod heap;
mod intern;
mod lexer;
mod location;
mod namespace;
mod parser;
mod primitives;
mod resource;
mod signature;
pub mod tracer;
mod value;

pub use crate::{
    allocator::{Allocator, Arena, SystemAllocator},
    bytecode::{compile_program, encode, EncodedFunction, Instruction, Opcode, Status, Vm, VmConfig},
    context::{Context, NativeFn, NativeId},
    error::{
        CompileError, LexError, LexErrorKind, ParseError, RuntimeError, RuntimeErrorKind, TraceFrame, WispError,
    },
    function::{Arity, Callee, Closure, FunctionBlock},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    location::{CodeRange, Pos},
    namespace::Namespace,
    resource::{Guard, LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker},
    signature::{ParamSpec, ParamType, Signature},
    value::{cmp, display_value, Value},
};
