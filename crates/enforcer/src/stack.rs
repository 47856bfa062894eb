use primitive_types::{H256, U256};

use crate::hash::stack_hash;

/// Maximum number of stack elements, hidden ones included.
pub const STACK_LIMIT: usize = 1024;

/// Elements below the materialised part of a [`Stack`], committed by hash only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackBase {
    /// Fold of the hidden elements.
    pub hash: H256,
    /// Number of hidden elements.
    pub size: usize,
}

/// Operand stack, bottom first.
///
/// A stack resumed from a one-step proof only materialises the elements the next instruction
/// touches; the rest is represented by [`StackBase`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<U256>,
    base: StackBase,
}

impl From<Vec<U256>> for Stack {
    fn from(values: Vec<U256>) -> Self {
        Self {
            values,
            base: StackBase::default(),
        }
    }
}

impl Stack {
    /// Creates a stack whose lower part is only known by hash.
    pub fn with_base(values: Vec<U256>, base: StackBase) -> Self {
        Self { values, base }
    }

    /// Materialised elements, bottom first.
    pub fn values(&self) -> &[U256] {
        &self.values
    }

    /// Hidden part of the stack.
    pub fn base(&self) -> StackBase {
        self.base
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.base.size + self.values.len()
    }

    /// Checks whether the stack holds no elements at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commitment to the whole stack.
    pub fn hash(&self) -> H256 {
        stack_hash(&self.values, self.base.hash)
    }

    /// Topmost `count` materialised elements, bottom first.
    pub fn top(&self, count: usize) -> &[U256] {
        &self.values[self.values.len() - count.min(self.values.len())..]
    }

    /// Splits off the topmost `count` elements, returning the commitment to what remains below.
    pub fn split_top(&self, count: usize) -> (StackBase, &[U256]) {
        let at = self.values.len() - count.min(self.values.len());
        let base = StackBase {
            hash: stack_hash(&self.values[..at], self.base.hash),
            size: self.base.size + at,
        };
        (base, &self.values[at..])
    }

    pub(crate) fn materialised(&self) -> usize {
        self.values.len()
    }

    /// Pops `N` elements; index 0 is the former top. Callers check the arity beforehand.
    pub(crate) fn pop<const N: usize>(&mut self) -> [U256; N] {
        let mut out = [U256::zero(); N];
        let at = self.values.len() - N;
        for (slot, value) in out.iter_mut().zip(self.values.drain(at..).rev()) {
            *slot = value;
        }
        out
    }

    pub(crate) fn push(&mut self, value: U256) {
        self.values.push(value);
    }

    /// Duplicates the `depth`-th element from the top (1 = top).
    pub(crate) fn dup(&mut self, depth: usize) {
        let value = self.values[self.values.len() - depth];
        self.values.push(value);
    }

    /// Swaps the top with the element `depth` places below it.
    pub(crate) fn swap(&mut self, depth: usize) {
        let top = self.values.len() - 1;
        self.values.swap(top, top - depth);
    }
}
