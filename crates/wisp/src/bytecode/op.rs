//! The 32-bit packed instruction word: 6-bit opcode, 26-bit signed operand.

use std::fmt;

use strum::{Display as StrumDisplay, EnumString};

const OPERAND_BITS: u32 = 26;
const OPERAND_MASK: u32 = (1 << OPERAND_BITS) - 1;
const OPERAND_SIGN_BIT: i32 = 1 << (OPERAND_BITS - 1);

/// Smallest and largest operand values `LDI`/relative jumps can carry
/// without overflowing the 26-bit signed field.
pub const OPERAND_MIN: i32 = -(1 << (OPERAND_BITS - 1));
pub const OPERAND_MAX: i32 = (1 << (OPERAND_BITS - 1)) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Opcode {
    Nop,
    Pop,
    Ldc,
    Ldl,
    Lds,
    Ldi,
    Ldb,
    Nil,
    Set,
    Jmp,
    Jof,
    Call,
    Tail,
    Ret,
    Cls,
    Imp,
    /// Compile-time only placeholder import marker; never appears in
    /// bytecode handed to the VM. Rewritten to `Lds` during linking.
    Plhr,
    /// Pops the top of the operand stack and binds it in the module
    /// registry under the name at `imports[k]` of the running function.
    ///
    /// Not in the distilled instruction table: `define` is documented there
    /// as "SET into a module-registry slot addressed by the symbol name",
    /// and a *name*-addressed store is exactly what the import string pool
    /// already exists for, so this reuses that indirection rather than
    /// overloading `SET`'s slot-indexed operand to sometimes mean something
    /// else. See DESIGN.md.
    Def,
}

impl Opcode {
    #[must_use]
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Nop),
            1 => Some(Self::Pop),
            2 => Some(Self::Ldc),
            3 => Some(Self::Ldl),
            4 => Some(Self::Lds),
            5 => Some(Self::Ldi),
            6 => Some(Self::Ldb),
            7 => Some(Self::Nil),
            8 => Some(Self::Set),
            9 => Some(Self::Jmp),
            10 => Some(Self::Jof),
            11 => Some(Self::Call),
            12 => Some(Self::Tail),
            13 => Some(Self::Ret),
            14 => Some(Self::Cls),
            15 => Some(Self::Imp),
            16 => Some(Self::Plhr),
            17 => Some(Self::Def),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_bits(self) -> u32 {
        match self {
            Self::Nop => 0,
            Self::Pop => 1,
            Self::Ldc => 2,
            Self::Ldl => 3,
            Self::Lds => 4,
            Self::Ldi => 5,
            Self::Ldb => 6,
            Self::Nil => 7,
            Self::Set => 8,
            Self::Jmp => 9,
            Self::Jof => 10,
            Self::Call => 11,
            Self::Tail => 12,
            Self::Ret => 13,
            Self::Cls => 14,
            Self::Imp => 15,
            Self::Plhr => 16,
            Self::Def => 17,
        }
    }
}

/// A decoded instruction: opcode plus its signed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub operand: i32,
}

impl Instruction {
    #[must_use]
    pub fn new(op: Opcode, operand: i32) -> Self {
        debug_assert!(
            (OPERAND_MIN..=OPERAND_MAX).contains(&operand),
            "operand {operand} does not fit in a 26-bit signed field"
        );
        Self { op, operand }
    }

    #[must_use]
    pub fn pack(self) -> u32 {
        (self.op.to_bits() << OPERAND_BITS) | (self.operand as u32 & OPERAND_MASK)
    }

    #[must_use]
    pub fn unpack(word: u32) -> Self {
        let op = Opcode::from_bits(word >> OPERAND_BITS).expect("word encodes an unknown opcode");
        let raw = (word & OPERAND_MASK) as i32;
        let operand = if raw & OPERAND_SIGN_BIT != 0 { raw - (1 << OPERAND_BITS) } else { raw };
        Self { op, operand }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips_for_every_opcode() {
        for bits in 0..=17u32 {
            let op = Opcode::from_bits(bits).expect("valid opcode");
            for operand in [OPERAND_MIN, -1, 0, 1, OPERAND_MAX] {
                let instr = Instruction::new(op, operand);
                let word = instr.pack();
                assert_eq!(Instruction::unpack(word), instr);
            }
        }
    }

    #[test]
    fn negative_operand_sign_extends_correctly() {
        let instr = Instruction::new(Opcode::Jmp, -5);
        let word = instr.pack();
        let back = Instruction::unpack(word);
        assert_eq!(back.operand, -5);
    }
}
