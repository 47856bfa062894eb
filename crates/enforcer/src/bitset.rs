/// Growable bitset. Used to store the jump destinations of a [`Program`](crate::Program).
#[derive(Clone, PartialEq, Eq, Debug, Default, Hash)]
pub(crate) struct Bitset(Vec<u64>);

impl Bitset {
    pub(crate) fn with_len(len: usize) -> Self {
        Self(vec![0; len.div_ceil(64)])
    }

    #[inline(always)]
    pub(crate) fn get(&self, i: usize) -> bool {
        let (slot, bit) = slot_and_bit(i);
        self.0.get(slot).is_some_and(|word| word & bit != 0)
    }

    /// # Panics
    ///
    /// Panics if `i` is beyond the length the bitset was created with.
    #[inline(always)]
    pub(crate) fn set(&mut self, i: usize) {
        let (slot, bit) = slot_and_bit(i);
        self.0[slot] |= bit;
    }

    pub(crate) fn count_ones(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }
}

#[inline(always)]
fn slot_and_bit(i: usize) -> (usize, u64) {
    (i >> 6, 1u64 << (i & 0b11_1111))
}
