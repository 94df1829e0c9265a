use std::{fmt::Display, str::FromStr};

use thiserror::Error;

const REGISTER_NAMES: [&str; 3] = ["A", "B", "C"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty program")]
    Empty,
    #[error("invalid token `{token}` at position {position}")]
    InvalidToken { token: String, position: usize },
    #[error("value {value} at position {position} is not a 3-bit number")]
    OutOfRange { value: u64, position: usize },
    #[error("expected 3 registers, found {0}")]
    RegisterCount(usize),
    #[error("malformed line `{0}`")]
    UnexpectedLine(String),
    #[error("missing `Program:` line")]
    MissingProgram,
}

/// Program words plus the register values it starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub data: Vec<u8>,
    pub initial_a: u64,
    pub initial_b: u64,
    pub initial_c: u64,
}

impl Program {
    pub fn new(data: Vec<u8>, initial_a: u64, initial_b: u64, initial_c: u64) -> Self {
        Self {
            data,
            initial_a,
            initial_b,
            initial_c,
        }
    }

    pub fn words(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Program {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data, 0, 0, 0)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&join_words(&self.data))
    }
}

/// Accepts either a bare `x,y,...` word list or a debugger dump:
///
/// ```text
/// Register A: 729
/// Register B: 0
/// Register C: 0
///
/// Program: 0,1,5,4,3,0
/// ```
impl FromStr for Program {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.contains("Program:") || text.trim_start().starts_with("Register ") {
            parse_dump(text)
        } else {
            parse_words(text).map(Program::from)
        }
    }
}

pub fn parse_words(text: &str) -> Result<Vec<u8>, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    text.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(position, token)| {
            let value = token.parse::<u64>().map_err(|_| ParseError::InvalidToken {
                token: token.to_string(),
                position,
            })?;
            u8::try_from(value)
                .ok()
                .filter(|word| *word <= 7)
                .ok_or(ParseError::OutOfRange { value, position })
        })
        .collect()
}

fn parse_dump(text: &str) -> Result<Program, ParseError> {
    let mut registers = Vec::with_capacity(REGISTER_NAMES.len());
    let mut data = None;

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(words) = line.strip_prefix("Program:") {
            data = Some(parse_words(words)?);
            continue;
        }

        let unexpected = || ParseError::UnexpectedLine(line.to_string());
        let (name, value) = line
            .strip_prefix("Register ")
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(unexpected)?;
        if registers.len() == REGISTER_NAMES.len() {
            return Err(ParseError::RegisterCount(registers.len() + 1));
        }
        if name.trim() != REGISTER_NAMES[registers.len()] {
            return Err(unexpected());
        }
        registers.push(value.trim().parse::<u64>().map_err(|_| unexpected())?);
    }

    let [a, b, c] = registers.as_slice() else {
        return Err(ParseError::RegisterCount(registers.len()));
    };
    let data = data.ok_or(ParseError::MissingProgram)?;
    Ok(Program::new(data, *a, *b, *c))
}

pub fn join_words(words: &[u8]) -> String {
    words
        .iter()
        .map(|word| word.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
