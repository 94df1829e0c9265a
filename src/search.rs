//! Backward digit search for the smallest register A that makes a program
//! print its own words.
//!
//! Each pass of the program's loop prints one digit that only depends on
//! the bits of A still present at that point, then shifts A right by three.
//! The last printed digit therefore depends only on the most significant
//! 3-bit group of the initial A. Walking the target backwards fixes one group
//! per printed digit, so each level has at most eight candidates.
//!
//! Worst case the search visits `8^len` nodes for a `len`-word target.

use log::{debug, trace};
use thiserror::Error;

use crate::{
    cpu::{shr, Cpu, OpCode, Register},
    decode::{disassemble, DecodeError, Instruction, Operand},
};

pub const REFERENCE_PROGRAM: [u8; 16] = [2, 4, 1, 6, 7, 5, 4, 4, 1, 7, 0, 3, 5, 5, 3, 0];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("program is not a single `out` loop draining A by `adv 3`: {0}")]
    UnsupportedProgram(&'static str),
}

/// One pass of a program's loop body.
pub trait Transform {
    /// Digit printed by the loop body when it starts with `a` in register A
    /// and zero in B and C.
    fn output_digit(&self, a: u64) -> Option<u8>;
}

/// `B = (A & 7) ^ k1; C = A >> B; print (B ^ C ^ k2) & 7`.
///
/// `REFERENCE` is the body of [`REFERENCE_PROGRAM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorShiftTransform {
    pub k1: u64,
    pub k2: u64,
}

impl XorShiftTransform {
    pub const REFERENCE: Self = Self { k1: 6, k2: 7 };
}

impl Transform for XorShiftTransform {
    fn output_digit(&self, a: u64) -> Option<u8> {
        let b = (a & 0x7) ^ self.k1;
        let c = shr(a, b);
        Some(((b ^ c ^ self.k2) & 0x7) as u8)
    }
}

/// Interprets the decoded loop body of an arbitrary program of the shape
/// `<body with one out and one adv 3>; jnz 0`.
#[derive(Debug, Clone)]
pub struct ProgramTransform {
    body: Vec<Instruction>,
}

impl ProgramTransform {
    pub fn new(words: &[u8]) -> Result<Self, SearchError> {
        let mut body = disassemble(words).collect::<Result<Vec<_>, _>>()?;

        let jump_back = Instruction {
            opcode: OpCode::Jnz,
            operand: Operand::Value(0),
        };
        if body.pop() != Some(jump_back) {
            return Err(SearchError::UnsupportedProgram("must end with `jnz 0`"));
        }

        let count = |opcode: OpCode| body.iter().filter(|instr| instr.opcode == opcode).count();
        if count(OpCode::Jnz) != 0 {
            return Err(SearchError::UnsupportedProgram("jump inside the loop body"));
        }
        if count(OpCode::Out) != 1 {
            return Err(SearchError::UnsupportedProgram("needs exactly one `out`"));
        }
        let shifts_by_three = body.iter().any(|instr| {
            instr.opcode == OpCode::Adv && instr.operand == Operand::Value(3)
        });
        if count(OpCode::Adv) != 1 || !shifts_by_three {
            return Err(SearchError::UnsupportedProgram("needs exactly one `adv 3`"));
        }
        if reads_carried_register(&body) {
            return Err(SearchError::UnsupportedProgram(
                "B or C is read before the loop body sets it",
            ));
        }

        Ok(Self { body })
    }
}

/// Whether a pass depends on B or C left over from the previous pass.
fn reads_carried_register(body: &[Instruction]) -> bool {
    let (mut b_set, mut c_set) = (false, false);

    for instr in body {
        let reads_b = matches!(instr.opcode, OpCode::Bxl | OpCode::Bxc)
            || instr.operand == Operand::Register(Register::B);
        let reads_c =
            instr.opcode == OpCode::Bxc || instr.operand == Operand::Register(Register::C);
        if (reads_b && !b_set) || (reads_c && !c_set) {
            return true;
        }

        match instr.opcode {
            OpCode::Bst | OpCode::Bdv => b_set = true,
            OpCode::Cdv => c_set = true,
            _ => {}
        }
    }

    false
}

impl Transform for ProgramTransform {
    fn output_digit(&self, a: u64) -> Option<u8> {
        let mut cpu = Cpu::new(a, 0, 0);
        self.body.iter().find_map(|instr| cpu.execute(instr))
    }
}

/// Depth-first search state. Digits are tried in ascending order and the
/// first complete assignment wins, so the result is the smallest reachable A.
pub struct Search<'a, T> {
    transform: &'a T,
    visited: u64,
}

impl<'a, T: Transform> Search<'a, T> {
    pub fn new(transform: &'a T) -> Self {
        Self {
            transform,
            visited: 0,
        }
    }

    pub fn nodes_visited(&self) -> u64 {
        self.visited
    }

    /// Smallest A printing `target`, `None` when no branch succeeds. Every
    /// group above the lowest keeps A nonzero, so the result runs exactly
    /// `target.len()` passes. An empty target is trivially printed by A = 0.
    pub fn run(&mut self, target: &[u8]) -> Option<u64> {
        let reversed: Vec<u8> = target.iter().rev().copied().collect();
        let found = self.extend(&reversed, 0);
        debug!(
            "search over {} digits visited {} nodes: {:?}",
            target.len(),
            self.visited,
            found
        );
        found
    }

    fn extend(&mut self, suffix: &[u8], acc: u64) -> Option<u64> {
        let Some((&wanted, rest)) = suffix.split_first() else {
            return Some(acc);
        };

        // no room for another 3-bit group
        if acc > u64::MAX >> 3 {
            return None;
        }

        for digit in 0..8 {
            let candidate = (acc << 3) | digit;
            // the loop only runs again while A >> 3 is nonzero
            if candidate == 0 && !rest.is_empty() {
                continue;
            }
            self.visited += 1;

            if self.transform.output_digit(candidate) == Some(wanted) {
                trace!("digit {} matches {} at A = {:#o}", digit, wanted, candidate);
                if let Some(found) = self.extend(rest, candidate) {
                    return Some(found);
                }
            }
        }

        None
    }
}

pub fn solve<T: Transform>(transform: &T, target: &[u8]) -> Option<u64> {
    Search::new(transform).run(target)
}

/// Searches with the transform read from `words` themselves.
pub fn solve_program(words: &[u8]) -> Result<Option<u64>, SearchError> {
    let transform = ProgramTransform::new(words)?;
    Ok(solve(&transform, words))
}
