pub mod cpu;
pub mod decode;
pub mod memory;
pub mod program;
pub mod search;

use caches::Cache;
use cpu::{Cpu, OpCode};
use decode::{DecodeError, Instruction};
use log::{debug, info, trace};
use memory::{Addressable, Memory, MemoryError};
use program::Program;
use thiserror::Error;

pub const CACHE_SIZE: usize = 32;
pub const MAX_STEPS: u64 = 1_000_000;

type CodeCache = caches::AdaptiveCache<usize, TranslationBlock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of decoded blocks kept, keyed by start address.
    pub cache_size: usize,
    /// Executed instructions after which the run is aborted.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_size: CACHE_SIZE,
            max_steps: MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("at address {address}: {source}")]
    Decode { address: usize, source: DecodeError },
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("exceeded the limit of {0} executed instructions")]
    StepLimit(u64),
    #[error("unable to create the code cache: {0}")]
    CodeCache(String),
}

/// Straight-line run of decoded instructions, ending at a `jnz` or where the
/// program halted.
struct TranslationBlock {
    instructions: Vec<Instruction>,
    executions: u64,
}

impl TranslationBlock {
    fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            executions: 0,
        }
    }
}

#[derive(Default)]
pub struct EmulationEngine {
    pub(crate) cpu: Cpu,
    memory: Memory,
    output: Vec<u8>,
    config: EngineConfig,
    steps: u64,
}

impl EmulationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn load_program(&mut self, program: &Program) -> Result<(), EngineError> {
        if program.data.len() % 2 != 0 {
            return Err(EngineError::Decode {
                address: program.data.len() - 1,
                source: DecodeError::MalformedProgram {
                    len: program.data.len(),
                },
            });
        }

        // Set the initial register values
        self.cpu = Cpu::new(program.initial_a, program.initial_b, program.initial_c);
        self.output.clear();
        self.steps = 0;

        // Load the program in memory
        self.memory.write_chunk(&program.data)?;

        Ok(())
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    fn debug_state(&self) {
        let next_eights = (self.cpu.pc..self.cpu.pc + 8)
            .filter_map(|address| self.memory.read(address))
            .fold(String::new(), |acc, word| acc + &format!("{} ", word));
        debug!(
            "State: PC: {:#04x}, A: {}, B: {}, C: {} | {}",
            self.cpu.pc, self.cpu.a, self.cpu.b, self.cpu.c, next_eights
        );
    }

    /// Decodes the pair at PC, `None` once fewer than two words remain.
    fn fetch(&self) -> Result<Option<Instruction>, EngineError> {
        let address = self.cpu.pc;
        match (self.memory.read(address), self.memory.read(address + 1)) {
            (Some(opcode), Some(operand)) => Instruction::decode(opcode, operand)
                .map(Some)
                .map_err(|source| EngineError::Decode { address, source }),
            _ => Ok(None),
        }
    }

    fn step(&mut self, instr: &Instruction) -> Result<(), EngineError> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(EngineError::StepLimit(self.config.max_steps));
        }

        if let Some(digit) = self.cpu.execute(instr) {
            self.output.push(digit);
        }

        Ok(())
    }

    fn interpret(&mut self) -> Result<Vec<Instruction>, EngineError> {
        let mut dynamic_block = Vec::new();

        loop {
            let Some(instr) = self.fetch()? else {
                self.cpu.halt = true;
                break Ok(dynamic_block);
            };

            dynamic_block.push(instr);
            self.step(&instr)?;

            if instr.opcode == OpCode::Jnz {
                break Ok(dynamic_block);
            }
        }
    }

    /// Runs until the program halts and returns everything it printed.
    pub fn main_loop(&mut self) -> Result<&[u8], EngineError> {
        let mut code_cache = CodeCache::new(self.config.cache_size)
            .map_err(|e| EngineError::CodeCache(format!("{:?}", e)))?;

        // As long the machine is not stopped
        while !self.cpu.halt {
            let pc = self.cpu.pc;

            if let Some(tbb) = code_cache.get_mut(&pc) {
                tbb.executions += 1;
                trace!("replaying block at {:#04x} ({} runs)", pc, tbb.executions);

                for instr in &tbb.instructions {
                    self.step(instr)?;
                }
            } else {
                debug!("translation block not found...");

                // Interpret instructions normally and build the translation block
                let dbb = self.interpret()?;
                if !dbb.is_empty() {
                    code_cache.put(pc, TranslationBlock::new(dbb));
                }
            }

            self.debug_state();
        }

        info!("{}", self.cpu);

        Ok(&self.output)
    }
}

pub fn run_program(program: &Program, config: EngineConfig) -> Result<Vec<u8>, EngineError> {
    let mut vm = EmulationEngine::new(config);
    vm.load_program(program)?;
    Ok(vm.main_loop()?.to_vec())
}

/// Whether starting with `a` in register A makes `words` print themselves.
pub fn is_quine(words: &[u8], a: u64, config: EngineConfig) -> Result<bool, EngineError> {
    let output = run_program(&Program::new(words.to_vec(), a, 0, 0), config)?;
    Ok(output == words)
}

#[cfg(test)]
mod tests {

    use super::*;

    use crate::program::Program;
    use crate::search::{solve, solve_program, XorShiftTransform, REFERENCE_PROGRAM};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn execute(program: Program) -> EmulationEngine {
        let mut vm = EmulationEngine::default();
        vm.load_program(&program).unwrap();
        vm.main_loop().unwrap();
        vm
    }

    #[test]
    pub fn scenario_bst_reads_c() {
        init();
        let vm = execute(Program::new(vec![2, 6], 0, 0, 9));
        assert_eq!(vm.cpu().b, 1);
        assert!(vm.cpu().halt);
    }

    #[test]
    pub fn scenario_prints_operands() {
        init();
        let vm = execute(Program::new(vec![5, 0, 5, 1, 5, 4], 10, 0, 0));
        assert_eq!(vm.output(), [0, 1, 2]);
    }

    #[test]
    pub fn scenario_countdown_loop() {
        init();
        let vm = execute(Program::new(vec![0, 1, 5, 4, 3, 0], 2024, 0, 0));
        assert_eq!(vm.output(), [4, 2, 5, 6, 7, 7, 7, 7, 3, 1, 0]);
        assert_eq!(vm.cpu().a, 0);
    }

    #[test]
    pub fn scenario_bxl_and_bxc() {
        init();
        let vm = execute(Program::new(vec![1, 7], 0, 29, 0));
        assert_eq!(vm.cpu().b, 26);

        let vm = execute(Program::new(vec![4, 0], 0, 2024, 43690));
        assert_eq!(vm.cpu().b, 44354);
    }

    #[test]
    pub fn scenario_debugger_dump() {
        init();
        let program: Program = "Register A: 729\nRegister B: 0\nRegister C: 0\n\nProgram: 0,1,5,4,3,0"
            .parse()
            .unwrap();
        let output = run_program(&program, EngineConfig::default()).unwrap();
        assert_eq!(program::join_words(&output), "4,6,3,5,6,3,5,2,1,0");
    }

    #[test]
    pub fn scenario_reference_fixed_point() {
        init();
        let a = solve(&XorShiftTransform::REFERENCE, &REFERENCE_PROGRAM).unwrap();
        let output = run_program(
            &Program::new(REFERENCE_PROGRAM.to_vec(), a, 0, 0),
            EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(output, REFERENCE_PROGRAM);
    }

    #[test]
    pub fn scenario_no_smaller_quine() {
        init();
        let a = solve(&XorShiftTransform::REFERENCE, &REFERENCE_PROGRAM).unwrap();
        let config = EngineConfig::default();
        for candidate in (0..4096).chain(a - 64..a) {
            assert!(!is_quine(&REFERENCE_PROGRAM, candidate, config).unwrap(), "A = {}", candidate);
        }
        assert!(is_quine(&REFERENCE_PROGRAM, a, config).unwrap());
    }

    #[test]
    pub fn scenario_program_solutions_are_fixed_points() {
        init();
        let programs: [(&[u8], Option<u64>); 7] = [
            (&REFERENCE_PROGRAM, Some(47_910_079_998_866)),
            (&[0, 3, 5, 4, 3, 0], Some(117_440)),
            (&[2, 4, 1, 1, 7, 5, 4, 4, 1, 4, 0, 3, 5, 5, 3, 0], Some(202_991_746_427_434)),
            (&[2, 4, 1, 5, 7, 5, 1, 6, 4, 3, 5, 5, 0, 3, 3, 0], Some(107_416_732_707_226)),
            (&[2, 4, 1, 3, 7, 5, 0, 3, 1, 5, 4, 4, 5, 5, 3, 0], Some(236_539_226_447_469)),
            (&[2, 4, 1, 2, 7, 5, 4, 5, 1, 3, 5, 5, 0, 3, 3, 0], Some(37_221_270_076_916)),
            (&[2, 4, 5, 5, 0, 3, 3, 0], None),
        ];
        let config = EngineConfig::default();

        for (words, expected) in programs {
            let found = solve_program(words).unwrap();
            assert_eq!(found, expected, "program {:?}", words);
            if let Some(a) = found {
                assert!(is_quine(words, a, config).unwrap(), "A = {} for {:?}", a, words);
                assert!(!is_quine(words, a - 1, config).unwrap());
            }
        }
    }

    #[test]
    pub fn scenario_endless_loop_hits_step_limit() {
        init();
        let mut vm = EmulationEngine::new(EngineConfig {
            max_steps: 100,
            ..EngineConfig::default()
        });
        vm.load_program(&Program::new(vec![3, 0], 1, 0, 0)).unwrap();
        assert_eq!(vm.main_loop(), Err(EngineError::StepLimit(100)));
    }

    #[test]
    pub fn scenario_reserved_operand_is_reported() {
        init();
        let mut vm = EmulationEngine::default();
        vm.load_program(&Program::new(vec![1, 1, 5, 7], 0, 0, 0)).unwrap();
        assert_eq!(
            vm.main_loop(),
            Err(EngineError::Decode {
                address: 2,
                source: DecodeError::ReservedComboOperand
            })
        );
    }

    #[test]
    pub fn scenario_odd_length_is_rejected() {
        init();
        let mut vm = EmulationEngine::default();
        assert_eq!(
            vm.load_program(&Program::new(vec![0, 3, 5], 0, 0, 0)),
            Err(EngineError::Decode {
                address: 2,
                source: DecodeError::MalformedProgram { len: 3 }
            })
        );
    }

    #[test]
    pub fn scenario_empty_program_halts() {
        init();
        let vm = execute(Program::new(Vec::new(), 7, 0, 0));
        assert!(vm.cpu().halt);
        assert!(vm.output().is_empty());
    }

    #[test]
    pub fn scenario_small_cache_still_runs() {
        init();
        let config = EngineConfig {
            cache_size: 2,
            ..EngineConfig::default()
        };
        let output = run_program(&Program::new(vec![0, 3, 5, 4, 3, 0], 117_440, 0, 0), config)
            .unwrap();
        assert_eq!(output, [0, 3, 5, 4, 3, 0]);
    }
}
