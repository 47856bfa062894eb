//! Dynamic gas: memory expansion and per-word charges.

use std::ops::Range;

use enforcer_interface::ErrNo;
use primitive_types::U256;

use crate::{VirtualMachine, World};

/// Total cost of `words` words of memory: `3·words + words²/512`.
pub fn memory_cost(words: u64) -> u64 {
    words * 3 + words * words / 512
}

/// Number of 32-byte words covering `bytes`.
pub(crate) fn word_count(bytes: usize) -> u64 {
    bytes.div_ceil(32) as u64
}

/// Converts an operand to an index, saturating at `limit`.
pub(crate) fn clamp(value: U256, limit: usize) -> usize {
    if value > U256::from(limit) {
        limit
    } else {
        value.as_usize()
    }
}

impl<W: World> VirtualMachine<W> {
    #[inline(always)]
    pub(crate) fn use_gas(&mut self, amount: u64) -> Result<(), ErrNo> {
        self.state.gas_remaining = self
            .state
            .gas_remaining
            .checked_sub(amount)
            .ok_or(ErrNo::OutOfGas)?;
        Ok(())
    }

    /// Charges `per_word` gas for every word of a `size`-byte operand.
    pub(crate) fn use_word_gas(&mut self, per_word: u64, size: usize) -> Result<(), ErrNo> {
        let cost = word_count(size)
            .checked_mul(per_word)
            .ok_or(ErrNo::OutOfGas)?;
        self.use_gas(cost)
    }

    /// Makes `offset..offset + size` addressable, charging for the words added.
    ///
    /// Returns the byte range, or `None` for an empty access (which never expands memory).
    pub(crate) fn expand_memory(
        &mut self,
        offset: U256,
        size: U256,
    ) -> Result<Option<Range<usize>>, ErrNo> {
        if size.is_zero() {
            return Ok(None);
        }
        let end = offset
            .checked_add(size)
            .filter(|end| end.bits() <= 64)
            .ok_or(ErrNo::OutOfGas)?
            .as_u64();
        let words = end.div_ceil(32);
        if words > self.settings.max_memory_words as u64 {
            return Err(ErrNo::InternalError);
        }

        let current = self.state.memory.size_words() as u64;
        if words > current {
            self.use_gas(memory_cost(words) - memory_cost(current))?;
        }
        let range = offset.as_usize()..end as usize;
        self.state.memory.grow(range.end);
        Ok(Some(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cost_is_quadratic() {
        assert_eq!(memory_cost(0), 0);
        assert_eq!(memory_cost(1), 3);
        assert_eq!(memory_cost(32), 98);
        assert_eq!(memory_cost(1024), 1024 * 3 + 2048);
    }

    #[test]
    fn clamping() {
        assert_eq!(clamp(U256::MAX, 10), 10);
        assert_eq!(clamp(U256::from(3), 10), 3);
        assert_eq!(word_count(33), 2);
    }
}
