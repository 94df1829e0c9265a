//! Instruction encoding shared by the disassembler, the interpreter and the
//! fixed-point search.

use std::{fmt::Display, slice::Chunks, str::FromStr};

use thiserror::Error;

use crate::cpu::{OpCode, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Literal,
    Combo,
}

/// Mnemonic and operand kind of every opcode, indexed by opcode value.
pub const INSTRUCTIONS: [(&str, OperandKind); 8] = [
    ("adv", OperandKind::Combo),
    ("bxl", OperandKind::Literal),
    ("bst", OperandKind::Combo),
    ("jnz", OperandKind::Literal),
    ("bxc", OperandKind::Literal),
    ("out", OperandKind::Combo),
    ("bdv", OperandKind::Combo),
    ("cdv", OperandKind::Combo),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("operand {0} is not a 3-bit value")]
    OperandOutOfRange(u8),
    #[error("combo operand 7 is reserved")]
    ReservedComboOperand,
    #[error("program of {len} words ends with an opcode but no operand")]
    MalformedProgram { len: usize },
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("invalid operand `{operand}` for `{mnemonic}`")]
    InvalidOperand { mnemonic: String, operand: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Value(u8),
    Register(Register),
}

impl Operand {
    fn decode(kind: OperandKind, value: u8) -> Result<Self, DecodeError> {
        match (kind, value) {
            (_, 8..=u8::MAX) => Err(DecodeError::OperandOutOfRange(value)),
            (OperandKind::Literal, _) | (OperandKind::Combo, 0..=3) => Ok(Operand::Value(value)),
            (OperandKind::Combo, 4) => Ok(Operand::Register(Register::A)),
            (OperandKind::Combo, 5) => Ok(Operand::Register(Register::B)),
            (OperandKind::Combo, 6) => Ok(Operand::Register(Register::C)),
            (OperandKind::Combo, _) => Err(DecodeError::ReservedComboOperand),
        }
    }

    fn encode(self) -> u8 {
        match self {
            Operand::Value(value) => value,
            Operand::Register(Register::A) => 4,
            Operand::Register(Register::B) => 5,
            Operand::Register(Register::C) => 6,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(value) => write!(f, "{}", value),
            Operand::Register(register) => write!(f, "{}", register),
        }
    }
}

/// Renders an operand the way the disassembler prints it.
pub fn decode_operand(kind: OperandKind, value: u8) -> Result<String, DecodeError> {
    Operand::decode(kind, value).map(|operand| operand.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    pub fn decode(opcode: u8, operand: u8) -> Result<Self, DecodeError> {
        let opcode = OpCode::try_from(opcode)?;
        let operand = Operand::decode(opcode.operand_kind(), operand)?;
        Ok(Self { opcode, operand })
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.opcode as u8, self.operand.encode()]
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.opcode.mnemonic(), self.operand)
    }
}

impl FromStr for Instruction {
    type Err = DecodeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default();
        let opcode = OpCode::from_mnemonic(mnemonic)
            .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))?;

        let invalid = |operand: &str| DecodeError::InvalidOperand {
            mnemonic: mnemonic.to_string(),
            operand: operand.to_string(),
        };

        let text = match (parts.next(), parts.next()) {
            (Some(text), None) => text,
            _ => return Err(invalid(line.trim())),
        };

        let operand = match (opcode.operand_kind(), text) {
            (OperandKind::Combo, "A") => Operand::Register(Register::A),
            (OperandKind::Combo, "B") => Operand::Register(Register::B),
            (OperandKind::Combo, "C") => Operand::Register(Register::C),
            (kind, _) => {
                let value = text.parse::<u8>().map_err(|_| invalid(text))?;
                match Operand::decode(kind, value) {
                    Ok(operand @ Operand::Value(_)) => operand,
                    _ => return Err(invalid(text)),
                }
            }
        };

        Ok(Self { opcode, operand })
    }
}

/// Lazy, single pass decoding of a flat word sequence. Stops after the first
/// error.
pub struct Disassembly<'a> {
    pairs: Chunks<'a, u8>,
    len: usize,
    done: bool,
}

impl<'a> Iterator for Disassembly<'a> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let decoded = match self.pairs.next()? {
            [opcode, operand] => Instruction::decode(*opcode, *operand),
            _ => Err(DecodeError::MalformedProgram { len: self.len }),
        };
        self.done = decoded.is_err();
        Some(decoded)
    }
}

pub fn disassemble(words: &[u8]) -> Disassembly<'_> {
    Disassembly {
        pairs: words.chunks(2),
        len: words.len(),
        done: false,
    }
}

/// Turns `<mnemonic> <operand>` lines back into program words.
pub fn assemble(source: &str) -> Result<Vec<u8>, DecodeError> {
    let mut words = Vec::new();
    for line in source.lines().map(str::trim).filter(|line| !line.is_empty()) {
        words.extend(line.parse::<Instruction>()?.encode());
    }
    Ok(words)
}
