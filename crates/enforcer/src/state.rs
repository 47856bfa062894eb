use std::sync::Arc;

use primitive_types::H256;

use crate::{
    hash::{data_hash, StateCommitment},
    memory::Memory,
    stack::Stack,
    World,
};

/// Call data of an execution together with its commitment.
///
/// Cloning this is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    bytes: Arc<[u8]>,
    hash: H256,
    elided: bool,
}

impl CallData {
    /// Call data with known contents.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            hash: data_hash(&bytes),
            bytes,
            elided: false,
        }
    }

    /// Call data known only by its hash.
    pub fn elided(hash: H256) -> Self {
        Self {
            bytes: Arc::new([]),
            hash,
            elided: true,
        }
    }

    /// Contents; empty when elided.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Commitment bound into state hashes.
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Checks whether the contents are unavailable.
    pub fn is_elided(&self) -> bool {
        self.elided
    }
}

impl From<Vec<u8>> for CallData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for CallData {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// Committed snapshot of an execution: the initial state or the state after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState<W = ()> {
    /// Program counter of the next instruction.
    pub pc: usize,
    /// Operand stack.
    pub stack: Stack,
    /// Scratch memory.
    pub memory: Memory,
    /// Data returned by the last call, or the output of `RETURN` / `REVERT`.
    pub return_data: Vec<u8>,
    /// Running hash of the emitted logs.
    pub log_hash: H256,
    /// Remaining gas.
    pub gas_remaining: u64,
    /// Custom environment; shared between steps until a call mutates it.
    pub world: Arc<W>,
}

impl<W: World> ExecutionState<W> {
    /// Initial state: empty stack and memory, `pc` 0.
    pub fn new(world: W, gas_remaining: u64) -> Self {
        Self {
            pc: 0,
            stack: Stack::default(),
            memory: Memory::default(),
            return_data: Vec::new(),
            log_hash: H256::zero(),
            gas_remaining,
            world: Arc::new(world),
        }
    }

    /// Components of the state hash, given the hash of the call data.
    pub fn commitment(&self, data_hash: H256) -> StateCommitment {
        StateCommitment {
            stack_hash: self.stack.hash(),
            mem_hash: self.memory.hash(),
            data_hash,
            return_data_hash: crate::hash::data_hash(&self.return_data),
            log_hash: self.log_hash,
            custom_environment_hash: self.world.environment_hash(),
            pc: self.pc as u64,
            gas_remaining: self.gas_remaining,
            stack_size: self.stack.len() as u64,
            mem_size: self.memory.size_words() as u64,
        }
    }

    /// State hash, given the hash of the call data.
    pub fn hash(&self, data_hash: H256) -> H256 {
        self.commitment(data_hash).hash()
    }
}

#[cfg(test)]
mod tests {
    use primitive_types::U256;

    use super::*;

    #[test]
    fn hash_covers_every_component() {
        let data = CallData::new(vec![1, 2, 3]);
        let state = ExecutionState::new((), 1_000);
        let base = state.hash(data.hash());

        let mut pushed = state.clone();
        pushed.stack.push(U256::one());
        let mut returned = state.clone();
        returned.return_data = vec![0];
        let mut logged = state.clone();
        logged.log_hash = H256::repeat_byte(1);
        let mut grown = state.clone();
        grown.memory.grow(1);

        for other in [pushed, returned, logged, grown] {
            assert_ne!(other.hash(data.hash()), base);
        }
        assert_ne!(state.hash(CallData::new(vec![]).hash()), base);
    }

    #[test]
    fn elided_call_data_keeps_hash() {
        let data = CallData::new(vec![9; 40]);
        let elided = CallData::elided(data.hash());
        assert!(elided.is_elided());
        assert!(elided.bytes().is_empty());
        assert_eq!(elided.hash(), data.hash());
    }
}
