use std::fmt::Display;

use crate::decode::{DecodeError, Instruction, Operand, OperandKind, INSTRUCTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub a: u64,     // Register A, drained three bits per loop by `adv 3`
    pub b: u64,     // Register B
    pub c: u64,     // Register C
    pub pc: usize,  // The instruction pointer, in words
    pub halt: bool, // Flag keeping the current running state
}

impl Display for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cpu [ a: {}, b: {}, c: {}, pc: {}, halt: {} ]",
            self.a, self.b, self.c, self.pc, self.halt
        )
    }
}

impl Cpu {
    pub fn new(a: u64, b: u64, c: u64) -> Self {
        Cpu {
            a,
            b,
            c,
            pc: 0,
            halt: false,
        }
    }

    pub fn register(&self, register: Register) -> u64 {
        match register {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
        }
    }

    fn operand_value(&self, operand: Operand) -> u64 {
        match operand {
            Operand::Value(value) => u64::from(value),
            Operand::Register(register) => self.register(register),
        }
    }

    /// Executes one instruction and moves the instruction pointer past it,
    /// returning the digit emitted by `out`.
    pub fn execute(&mut self, instr: &Instruction) -> Option<u8> {
        let value = self.operand_value(instr.operand);
        self.pc += 2;

        match instr.opcode {
            OpCode::Adv => self.a = shr(self.a, value),
            OpCode::Bxl => self.b ^= value,
            OpCode::Bst => self.b = value & 0x7,
            OpCode::Jnz => {
                if self.a != 0 {
                    self.pc = value as usize;
                }
            }
            OpCode::Bxc => self.b ^= self.c,
            OpCode::Out => return Some((value & 0x7) as u8),
            OpCode::Bdv => self.b = shr(self.a, value),
            OpCode::Cdv => self.c = shr(self.a, value),
        }

        None
    }
}

/// `value >> amount`, saturating to zero once every bit is shifted out.
pub(crate) fn shr(value: u64, amount: u64) -> u64 {
    u32::try_from(amount)
        .ok()
        .and_then(|amount| value.checked_shr(amount))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Adv = 0, // A = A >> combo
    Bxl = 1, // B = B ^ literal
    Bst = 2, // B = combo & 7
    Jnz = 3, // if A != 0 then PC = literal
    Bxc = 4, // B = B ^ C, operand ignored
    Out = 5, // emit combo & 7
    Bdv = 6, // B = A >> combo
    Cdv = 7, // C = A >> combo
}

impl OpCode {
    pub const ALL: [OpCode; 8] = [
        OpCode::Adv,
        OpCode::Bxl,
        OpCode::Bst,
        OpCode::Jnz,
        OpCode::Bxc,
        OpCode::Out,
        OpCode::Bdv,
        OpCode::Cdv,
    ];

    pub fn mnemonic(self) -> &'static str {
        INSTRUCTIONS[self as usize].0
    }

    pub fn operand_kind(self) -> OperandKind {
        INSTRUCTIONS[self as usize].1
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.mnemonic() == mnemonic)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(v))
            .copied()
            .ok_or(DecodeError::UnknownOpcode(v))
    }
}
