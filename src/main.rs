use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use tri_vm::{
    decode::disassemble,
    is_quine,
    program::{join_words, Program},
    run_program,
    search::{ProgramTransform, Search, Transform, XorShiftTransform, REFERENCE_PROGRAM},
    EngineConfig, CACHE_SIZE, MAX_STEPS,
};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum TransformKind {
    /// Interpret the program's own loop body.
    Program,
    /// `B = (A & 7) ^ k1; C = A >> B; print (B ^ C ^ k2) & 7`.
    XorShift,
}

#[derive(Parser, Debug)]
#[command(
    name = "trivm",
    about = "Disassembler, interpreter and quine search for the 3-bit machine"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Decoded blocks kept in the interpreter's code cache.
    #[arg(long, global = true, default_value_t = CACHE_SIZE)]
    cache_size: usize,

    /// Abort a run after this many executed instructions.
    #[arg(long, global = true, default_value_t = MAX_STEPS)]
    max_steps: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one `<mnemonic> <operand>` line per instruction.
    Disasm {
        /// Program file, standard input when omitted.
        #[arg(value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Run a program (word list or debugger dump) and print its output.
    Run {
        #[arg(value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Find the smallest A for which the program prints itself.
    Solve {
        /// Program file, the built-in reference program when omitted.
        #[arg(value_name = "PATH")]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = TransformKind::Program)]
        transform: TransformKind,

        #[arg(long, default_value_t = XorShiftTransform::REFERENCE.k1)]
        k1: u64,

        #[arg(long, default_value_t = XorShiftTransform::REFERENCE.k2)]
        k2: u64,
    },
}

fn read_program(input: Option<&PathBuf>) -> Result<Program> {
    let text = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read program from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read program from standard input")?;
            buffer
        }
    };
    text.parse::<Program>().context("failed to parse program")
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig {
        cache_size: args.cache_size,
        max_steps: args.max_steps,
    };

    match &args.command {
        Command::Disasm { input } => {
            let program = read_program(input.as_ref())?;
            for instr in disassemble(program.words()) {
                println!("{}", instr.context("failed to decode program")?);
            }
        }
        Command::Run { input } => {
            let program = read_program(input.as_ref())?;
            let output = run_program(&program, config).context("program run failed")?;
            println!("{}", join_words(&output));
        }
        Command::Solve {
            input,
            transform,
            k1,
            k2,
        } => {
            let program = match input {
                Some(path) => read_program(Some(path))?,
                None => Program::from(REFERENCE_PROGRAM.to_vec()),
            };
            let words = program.words();

            let found = match transform {
                TransformKind::Program => {
                    let transform = ProgramTransform::new(words)
                        .context("program cannot be searched backwards")?;
                    search(&transform, words)
                }
                TransformKind::XorShift => {
                    search(&XorShiftTransform { k1: *k1, k2: *k2 }, words)
                }
            };

            println!("{}", verified_answer(words, found, config)?);
        }
    }

    Ok(())
}

/// Only reports an A that the interpreter confirms prints `words`.
fn verified_answer(words: &[u8], found: Option<u64>, config: EngineConfig) -> Result<String> {
    let Some(a) = found else {
        return Ok("no solution".to_string());
    };
    if !is_quine(words, a, config).context("verification run failed")? {
        bail!("search found A = {} but running it does not reproduce the program", a);
    }
    Ok(format!("A = {}", a))
}

fn search<T: Transform>(transform: &T, words: &[u8]) -> Option<u64> {
    let mut search = Search::new(transform);
    let found = search.run(words);
    info!("visited {} nodes", search.nodes_visited());
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_verified_answer() {
        let answer = verified_answer(&REFERENCE_PROGRAM, Some(47_910_079_998_866), EngineConfig::default());
        assert_eq!(answer.unwrap(), "A = 47910079998866");
    }

    #[test]
    fn reports_missing_answer() {
        let answer = verified_answer(&REFERENCE_PROGRAM, None, EngineConfig::default());
        assert_eq!(answer.unwrap(), "no solution");
    }

    #[test]
    fn refuses_answer_that_is_not_a_fixed_point() {
        for wrong in [1, 47_910_079_998_865] {
            let answer = verified_answer(&REFERENCE_PROGRAM, Some(wrong), EngineConfig::default());
            assert!(answer.is_err(), "A = {}", wrong);
        }
    }
}
