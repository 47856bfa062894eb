use std::{fmt, ops::Range, sync::Arc};

use enforcer_interface::Opcode;
use primitive_types::H256;

use crate::bitset::Bitset;

/// Bytecode together with its jump-destination table.
///
/// Cloning this is cheap. It is a handle to memory similar to [`Arc`].
#[derive(Clone, PartialEq, Eq)]
pub struct Program {
    code: Arc<[u8]>,
    jump_destinations: Arc<Bitset>,
}

impl fmt::Debug for Program {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DEBUGGED_BYTES: usize = 32;

        let mut s = formatter.debug_struct("Program");
        if self.code.len() <= DEBUGGED_BYTES {
            s.field("code", &hex::encode(&self.code));
        } else {
            s.field("code.len", &self.code.len())
                .field("code.start", &hex::encode(&self.code[..DEBUGGED_BYTES]));
        }
        s.field("jump_destinations", &self.jump_destinations.count_ones())
            .finish()
    }
}

impl Program {
    /// Creates a program, analysing its jump destinations once.
    pub fn new(code: impl Into<Arc<[u8]>>) -> Self {
        let code = code.into();
        let jump_destinations = Arc::new(analyse_jump_destinations(&code));
        Self {
            code,
            jump_destinations,
        }
    }

    /// Parses `0x`-prefixed (or bare) hex bytecode.
    ///
    /// # Errors
    ///
    /// Returns an error if `code` is not valid hex.
    pub fn from_hex(code: &str) -> Result<Self, hex::FromHexError> {
        crate::decode_hex(code).map(Self::new)
    }

    /// Builds a view of this program that only knows the given 32-byte words.
    ///
    /// Everything else reads as zero; the length and the jump-destination table are shared
    /// with `self`, so jumps are validated exactly as in the full program.
    pub fn with_fragments(&self, fragments: impl IntoIterator<Item = (usize, H256)>) -> Self {
        let mut code = vec![0; self.code.len()];
        for (slot, word) in fragments {
            let start = slot * 32;
            if start >= code.len() {
                continue;
            }
            let end = (start + 32).min(code.len());
            code[start..end].copy_from_slice(&word.as_bytes()[..end - start]);
        }
        Self {
            code: code.into(),
            jump_destinations: self.jump_destinations.clone(),
        }
    }

    /// Code length in bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Checks whether the program has no code at all.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Raw bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Number of 32-byte words covering the code.
    pub fn word_count(&self) -> usize {
        self.code.len().div_ceil(32)
    }

    /// The 32-byte word at `slot`, zero padded past the end of the code.
    pub fn word(&self, slot: usize) -> H256 {
        let mut word = H256::zero();
        let start = slot.saturating_mul(32).min(self.code.len());
        let end = (start + 32).min(self.code.len());
        word.0[..end - start].copy_from_slice(&self.code[start..end]);
        word
    }

    pub(crate) fn byte(&self, pc: usize) -> u8 {
        self.code.get(pc).copied().unwrap_or(0)
    }

    /// Copies `range` out of the code; bytes beyond the end read as zero.
    pub(crate) fn read(&self, range: Range<usize>) -> Vec<u8> {
        let mut out = vec![0; range.len()];
        if range.start < self.code.len() {
            let end = range.end.min(self.code.len());
            out[..end - range.start].copy_from_slice(&self.code[range.start..end]);
        }
        out
    }

    /// Checks whether `destination` is a `JUMPDEST` that is not part of `PUSH` data.
    pub fn is_jump_destination(&self, destination: usize) -> bool {
        self.jump_destinations.get(destination)
    }
}

fn analyse_jump_destinations(code: &[u8]) -> Bitset {
    let mut destinations = Bitset::with_len(code.len());
    let mut pc = 0;
    while pc < code.len() {
        match Opcode::from_byte(code[pc]) {
            Some(Opcode::JumpDest) => destinations.set(pc),
            Some(opcode) => pc += opcode.immediate_size(),
            None => {}
        }
        pc += 1;
    }
    destinations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_data_is_not_a_jump_destination() {
        // PUSH1 0x5b JUMPDEST PUSH2 0x5b5b JUMPDEST
        let program = Program::new(vec![0x60, 0x5b, 0x5b, 0x61, 0x5b, 0x5b, 0x5b]);
        let destinations: Vec<_> = (0..program.len())
            .filter(|&pc| program.is_jump_destination(pc))
            .collect();
        assert_eq!(destinations, [2, 6]);
        assert!(!program.is_jump_destination(100));
    }

    #[test]
    fn words_are_zero_padded() {
        let program = Program::from_hex("0x6001").unwrap();
        assert_eq!(program.word_count(), 1);
        assert_eq!(program.word(0).0[..3], [0x60, 0x01, 0x00]);
        assert_eq!(program.word(5), H256::zero());
        assert_eq!(program.read(1..4), [0x01, 0, 0]);
    }

    #[test]
    fn fragments_keep_length_and_jump_table() {
        let mut code = vec![0_u8; 40];
        code[33] = 0x5b;
        let program = Program::new(code);
        let sparse = program.with_fragments([(1, program.word(1))]);
        assert_eq!(sparse.len(), 40);
        assert_eq!(sparse.byte(33), 0x5b);
        assert!(sparse.is_jump_destination(33));
        assert_eq!(sparse.word(0), H256::zero());
    }
}
