//! Bytecode representation, compiler, and virtual machine (spec.md §4.5-4.7):
//! the stack-based execution model a parsed, desugared AST compiles down to.
//!
//! # Module structure
//!
//! - `op` - the 32-bit packed instruction word and [`Opcode`] table
//! - `builder` - [`CodeBuilder`], the two-pass label/jump emitter
//! - `compiler` - AST to bytecode compilation, including capture resolution
//! - `vm` - the stack-based interpreter that runs a compiled function
//! - `code` - the bit-exact [`EncodedFunction`] layout for disassembly tooling

pub use builder::CodeBuilder;
pub use code::{encode, EncodedFunction};
pub use compiler::compile_program;
pub use op::{Instruction, Opcode};
pub use vm::{Status, Vm, VmConfig};

mod builder;
mod code;
mod compiler;
mod op;
mod vm;
