use thiserror::Error;

pub trait Addressable<T> {
    /// Reads the word at `address`, `None` past the loaded program.
    fn read(&self, address: usize) -> Option<T>;
    fn write_chunk(&mut self, chunk: &[T]) -> Result<(), MemoryError>;
}

pub const MEMORY_SIZE: usize = 1024 * 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("chunk of {0} words is larger than maximum memory ({} words)", MEMORY_SIZE)]
    ChunkTooLarge(usize),
    #[error("word {word} at address {address} is not a 3-bit value")]
    InvalidWord { address: usize, word: u8 },
}

/// Read-only program storage, one 3-bit word per cell.
#[derive(Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Addressable<u8> for Memory {
    fn read(&self, address: usize) -> Option<u8> {
        self.data.get(address).copied()
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), MemoryError> {
        if chunk.len() > MEMORY_SIZE {
            return Err(MemoryError::ChunkTooLarge(chunk.len()));
        }

        if let Some((address, &word)) = chunk.iter().enumerate().find(|(_, word)| **word > 7) {
            return Err(MemoryError::InvalidWord { address, word });
        }

        self.data.clear();
        self.data.extend_from_slice(chunk);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stop_at_program_end() {
        let mut memory = Memory::default();
        memory.write_chunk(&[0, 3, 5, 4]).unwrap();
        assert_eq!(memory.read(3), Some(4));
        assert_eq!(memory.read(4), None);
    }

    #[test]
    fn reloading_replaces_previous_program() {
        let mut memory = Memory::default();
        memory.write_chunk(&[1, 2, 3, 4]).unwrap();
        memory.write_chunk(&[5, 6]).unwrap();
        assert_eq!(memory.read(1), Some(6));
        assert_eq!(memory.read(2), None);
    }

    #[test]
    fn rejects_oversized_and_wide_words() {
        let mut memory = Memory::default();
        assert_eq!(
            memory.write_chunk(&vec![0; MEMORY_SIZE + 1]),
            Err(MemoryError::ChunkTooLarge(MEMORY_SIZE + 1))
        );
        assert_eq!(
            memory.write_chunk(&[0, 9]),
            Err(MemoryError::InvalidWord { address: 1, word: 9 })
        );
        assert_eq!(memory.read(0), None);
    }
}
