//! Bit-exact function memory layout (spec.md §6), for disassembly and
//! debugging tooling external to the VM itself — the VM never reads this
//! blob back; it runs directly off [`crate::function::FunctionBlock`].
//!
//! Layout: header, then `instructions[]`, `locations[]`, `constants[]`
//! (each a 16-byte tagged cell), `imports[]` (string-pool offsets), then the
//! string pool itself (length-prefixed UTF-8). All multi-byte fields are
//! host-endian; this is not a cross-platform persistence format. Nested
//! functions are encoded recursively rather than flattened into one blob —
//! still "a separate allocation" per spec.md §6, just owned by the parent
//! [`EncodedFunction`] instead of addressed by an offset into it.

use crate::function::{Arity, FunctionBlock};
use crate::heap::Heap;
use crate::intern::Interns;
use crate::value::Value;

const MAGIC: u32 = 0x5057_5331; // "1SPW" little-endian reads back as "WPS1"
const VERSION: u16 = 1;

const CONST_TAG_NIL: u32 = 0;
const CONST_TAG_BOOL: u32 = 1;
const CONST_TAG_NUMBER: u32 = 2;
const CONST_TAG_STR: u32 = 3;
const CONST_TAG_SYMBOL: u32 = 4;
/// A quoted list can't be flattened into a single string-pool offset the
/// way a string/symbol can; this tag's payload offset points at a
/// human-readable rendering instead of a structurally round-trippable one,
/// since nothing in this codebase ever decodes an `EncodedFunction` back
/// into a `FunctionBlock`.
const CONST_TAG_LIST_DEBUG: u32 = 5;

/// Header size in bytes: matches the field list verbatim, so
/// [`HEADER_LEN`] and `encode`'s header-writing code can't silently drift.
const HEADER_LEN: usize = 4 + 2 + 2 + 1 + 1 + 2 + 4 + 2 + 2 + 2 + 4 + 4;
const CONST_CELL_LEN: usize = 16;

/// The encoded form of one [`FunctionBlock`], with its nested functions
/// encoded alongside it rather than inlined.
#[derive(Debug, Clone)]
pub struct EncodedFunction {
    pub bytes: Vec<u8>,
    pub nested: Vec<EncodedFunction>,
}

struct StringPool {
    bytes: Vec<u8>,
}

impl StringPool {
    fn new() -> Self {
        Self { bytes: vec![] }
    }

    /// Appends `s` as a length-prefixed entry, returning its byte offset
    /// into the pool. Does not deduplicate: a disassembly dump values
    /// simplicity over size here.
    fn push(&mut self, s: &str) -> u32 {
        let offset = u32::try_from(self.bytes.len()).expect("string pool offset overflowed u32");
        let len = u32::try_from(s.len()).expect("interned string overflowed u32 length");
        self.bytes.extend_from_slice(&len.to_ne_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        offset
    }
}

/// Encodes `function` (and, recursively, every function in `function.nested`)
/// into the bit-exact layout spec.md §6 describes. `heap` resolves any
/// quoted-list constant for its debug rendering.
#[must_use]
pub fn encode(function: &FunctionBlock, interns: &Interns, heap: &Heap) -> EncodedFunction {
    let mut pool = StringPool::new();
    let mut out = Vec::with_capacity(HEADER_LEN);

    let (arity, variadic) = match function.arity {
        Arity::Fixed(n) => (n, 0u8),
        Arity::Variadic { min } => (min, 1u8),
    };
    let source_name_offset = pool.push(interns.get(function.source_name));
    let debug_name_offset = pool.push(interns.get(function.debug_name));

    out.extend_from_slice(&MAGIC.to_ne_bytes());
    out.extend_from_slice(&VERSION.to_ne_bytes());
    out.extend_from_slice(&0u16.to_ne_bytes()); // flags: reserved, unused
    out.push(arity);
    out.push(variadic);
    out.extend_from_slice(&function.env_size.to_ne_bytes());
    out.extend_from_slice(&u32::try_from(function.instructions.len()).expect("instruction count overflowed u32").to_ne_bytes());
    out.extend_from_slice(&u16::try_from(function.constants.len()).expect("constant count overflowed u16").to_ne_bytes());
    out.extend_from_slice(&u16::try_from(function.imports.len()).expect("import count overflowed u16").to_ne_bytes());
    out.extend_from_slice(&u16::try_from(function.nested.len()).expect("nested count overflowed u16").to_ne_bytes());
    out.extend_from_slice(&source_name_offset.to_ne_bytes());
    out.extend_from_slice(&debug_name_offset.to_ne_bytes());
    debug_assert_eq!(out.len(), HEADER_LEN, "header field list and HEADER_LEN have drifted apart");

    for &word in &function.instructions {
        out.extend_from_slice(&word.to_ne_bytes());
    }
    for loc in &function.locations {
        out.extend_from_slice(&loc.start.line.to_ne_bytes());
        out.extend_from_slice(&loc.start.col.to_ne_bytes());
        out.extend_from_slice(&loc.end.line.to_ne_bytes());
        out.extend_from_slice(&loc.end.col.to_ne_bytes());
    }
    for &constant in &function.constants {
        encode_constant(&mut out, constant, interns, heap, &mut pool);
    }
    for &name in &function.imports {
        let offset = pool.push(interns.get(name));
        out.extend_from_slice(&offset.to_ne_bytes());
    }

    out.extend_from_slice(&pool.bytes);

    let nested = function.nested.iter().map(|child| encode(child, interns, heap)).collect();
    EncodedFunction { bytes: out, nested }
}

fn encode_constant(out: &mut Vec<u8>, value: Value, interns: &Interns, heap: &Heap, pool: &mut StringPool) {
    let mut cell = [0u8; CONST_CELL_LEN];
    match value {
        Value::Nil => cell[0..4].copy_from_slice(&CONST_TAG_NIL.to_ne_bytes()),
        Value::Bool(b) => {
            cell[0..4].copy_from_slice(&CONST_TAG_BOOL.to_ne_bytes());
            cell[8] = u8::from(b);
        }
        Value::Number(n) => {
            cell[0..4].copy_from_slice(&CONST_TAG_NUMBER.to_ne_bytes());
            cell[8..16].copy_from_slice(&n.to_ne_bytes());
        }
        Value::Str(id) | Value::Symbol(id) => {
            let tag = if matches!(value, Value::Str(_)) { CONST_TAG_STR } else { CONST_TAG_SYMBOL };
            let offset = pool.push(interns.get(id));
            cell[0..4].copy_from_slice(&tag.to_ne_bytes());
            cell[4..8].copy_from_slice(&offset.to_ne_bytes());
        }
        Value::List(_) => {
            let rendered = crate::value::display_value(value, interns, heap);
            let offset = pool.push(&rendered);
            cell[0..4].copy_from_slice(&CONST_TAG_LIST_DEBUG.to_ne_bytes());
            cell[4..8].copy_from_slice(&offset.to_ne_bytes());
        }
        Value::Function(_) | Value::Placeholder(_) | Value::Native(_) => {
            unreachable!("the compiler never embeds these as literal constants")
        }
    }
    out.extend_from_slice(&cell);
}

#[allow(dead_code)] // read back only by this module's own tests
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes(bytes[at..at + 4].try_into().expect("4-byte slice"))
}

#[allow(dead_code)]
fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes(bytes[at..at + 2].try_into().expect("2-byte slice"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn header_fields_round_trip_for_a_simple_script() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(+ 1 2)").expect("compiles");
        let encoded = encode(&script, &ctx.interns, &ctx.heap);

        assert_eq!(read_u32(&encoded.bytes, 0), MAGIC);
        assert_eq!(read_u16(&encoded.bytes, 4), VERSION);
        let num_instructions = read_u32(&encoded.bytes, 12);
        assert_eq!(num_instructions as usize, script.instructions.len());
        let num_constants = read_u16(&encoded.bytes, 16);
        assert_eq!(num_constants as usize, script.constants.len());
    }

    #[test]
    fn instruction_words_decode_back_to_the_same_opcodes() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(if (< 1 2) 10 20)").expect("compiles");
        let encoded = encode(&script, &ctx.interns, &ctx.heap);

        let instr_start = HEADER_LEN;
        for (i, &expected_word) in script.instructions.iter().enumerate() {
            let word = read_u32(&encoded.bytes, instr_start + i * 4);
            assert_eq!(word, expected_word);
        }
    }

    #[test]
    fn nested_lambda_produces_one_encoded_child() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(lambda (x) x)").expect("compiles");
        let encoded = encode(&script, &ctx.interns, &ctx.heap);
        assert_eq!(encoded.nested.len(), script.nested.len());
    }
}
