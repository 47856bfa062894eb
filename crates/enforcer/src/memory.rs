use std::{fmt, ops::Range};

use primitive_types::{H256, U256};

use crate::hash::mem_hash;

/// Byte-addressed scratch memory, always a whole number of 32-byte words.
///
/// Memory resumed from a one-step proof that does not touch memory is *elided*: only its hash
/// and size are known, which is enough for everything but actual reads and writes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
    elided: Option<ElidedMemory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElidedMemory {
    hash: H256,
    words: usize,
}

impl fmt::Debug for Memory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.elided {
            Some(elided) => formatter
                .debug_struct("Memory")
                .field("hash", &elided.hash)
                .field("words", &elided.words)
                .finish_non_exhaustive(),
            None => formatter
                .debug_struct("Memory")
                .field("words", &self.size_words())
                .field("hash", &self.hash())
                .finish(),
        }
    }
}

impl Memory {
    /// Memory consisting of the given words.
    pub fn from_words(words: &[H256]) -> Self {
        Self {
            bytes: words.iter().flat_map(|word| word.0).collect(),
            elided: None,
        }
    }

    /// Memory known only by its commitment.
    pub fn elided(hash: H256, words: usize) -> Self {
        Self {
            bytes: Vec::new(),
            elided: Some(ElidedMemory { hash, words }),
        }
    }

    /// Checks whether the contents are unavailable.
    pub fn is_elided(&self) -> bool {
        self.elided.is_some()
    }

    /// Size in 32-byte words.
    pub fn size_words(&self) -> usize {
        match self.elided {
            Some(elided) => elided.words,
            None => self.bytes.len() / 32,
        }
    }

    /// Commitment to the contents.
    pub fn hash(&self) -> H256 {
        match self.elided {
            Some(elided) => elided.hash,
            None => mem_hash(&self.bytes),
        }
    }

    /// Contents as 32-byte words. Empty for elided memory.
    pub fn words(&self) -> Vec<H256> {
        self.bytes.chunks_exact(32).map(H256::from_slice).collect()
    }

    /// Raw contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Grows the memory so that `end` bytes are addressable, rounding up to a whole word.
    pub(crate) fn grow(&mut self, end: usize) {
        let len = end.div_ceil(32) * 32;
        if len > self.bytes.len() {
            self.bytes.resize(len, 0);
        }
    }

    pub(crate) fn read_u256(&self, offset: usize) -> U256 {
        U256::from_big_endian(&self.read_range(offset..offset + 32))
    }

    /// Copies `range` out of memory; anything past the end reads as zero.
    pub(crate) fn read_range(&self, range: Range<usize>) -> Vec<u8> {
        let mut result = vec![0; range.len()];
        if range.start < self.bytes.len() {
            let end = range.end.min(self.bytes.len());
            result[..end - range.start].copy_from_slice(&self.bytes[range.start..end]);
        }
        result
    }

    /// Writes `data` at `offset`, growing the memory as needed.
    pub(crate) fn write(&mut self, offset: usize, data: &[u8]) {
        self.grow(offset + data.len());
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    pub(crate) fn write_u256(&mut self, offset: usize, value: U256) {
        let mut bytes = [0; 32];
        value.to_big_endian(&mut bytes);
        self.write(offset, &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeat_byte(byte: u8) -> U256 {
        U256::from_little_endian(&[byte; 32])
    }

    #[test]
    fn write_resizes_to_whole_words() {
        let mut memory = Memory::default();
        assert_eq!(memory.size_words(), 0);
        memory.write_u256(5, repeat_byte(0xaa));
        assert_eq!(memory.size_words(), 2);
        assert_eq!(memory.read_u256(5), repeat_byte(0xaa));
        assert_eq!(memory.read_range(0..5), [0; 5]);

        memory.write(63, &[1]);
        assert_eq!(memory.size_words(), 2);
        memory.write(64, &[1]);
        assert_eq!(memory.size_words(), 3);
    }

    #[test]
    fn reading_past_the_end() {
        let mut memory = Memory::default();
        memory.write(0, &[7; 32]);
        assert_eq!(memory.read_range(30..34), [7, 7, 0, 0]);
        assert_eq!(memory.read_range(100..102), [0, 0]);
    }

    #[test]
    fn elided_memory_keeps_commitment() {
        let mut memory = Memory::default();
        memory.write(0, &[1, 2, 3]);
        let elided = Memory::elided(memory.hash(), memory.size_words());
        assert_eq!(elided.hash(), memory.hash());
        assert_eq!(elided.size_words(), 1);
        assert!(elided.words().is_empty());
        assert_eq!(Memory::from_words(&memory.words()), memory);
    }
}
