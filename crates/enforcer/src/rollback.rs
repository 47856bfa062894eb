use std::sync::Arc;

use primitive_types::H256;

use crate::{memory::Memory, stack::Stack, state::ExecutionState, World};

/// A trait for things that can be rolled back to snapshots
pub(crate) trait Rollback {
    type Snapshot;
    fn snapshot(&self) -> Self::Snapshot;
    fn rollback(&mut self, snapshot: Self::Snapshot);
}

/// Everything an instruction may modify. The world is shared, so snapshotting it is a
/// reference count bump.
#[derive(Debug)]
pub(crate) struct StateSnapshot<W> {
    pc: usize,
    stack: Stack,
    memory: Memory,
    return_data: Vec<u8>,
    log_hash: H256,
    gas_remaining: u64,
    world: Arc<W>,
}

impl<W: World> Rollback for ExecutionState<W> {
    type Snapshot = StateSnapshot<W>;

    fn snapshot(&self) -> Self::Snapshot {
        StateSnapshot {
            pc: self.pc,
            stack: self.stack.clone(),
            memory: self.memory.clone(),
            return_data: self.return_data.clone(),
            log_hash: self.log_hash,
            gas_remaining: self.gas_remaining,
            world: self.world.clone(),
        }
    }

    fn rollback(&mut self, snapshot: Self::Snapshot) {
        let StateSnapshot {
            pc,
            stack,
            memory,
            return_data,
            log_hash,
            gas_remaining,
            world,
        } = snapshot;
        self.pc = pc;
        self.stack = stack;
        self.memory = memory;
        self.return_data = return_data;
        self.log_hash = log_hash;
        self.gas_remaining = gas_remaining;
        self.world = world;
    }
}

#[cfg(test)]
mod tests {
    use primitive_types::U256;

    use super::*;

    #[test]
    fn rollback_restores_every_field() {
        let mut state = ExecutionState::new((), 50);
        state.stack.push(U256::one());
        let snapshot = state.snapshot();
        let expected = state.clone();

        state.pc = 7;
        state.stack.push(U256::from(2));
        state.memory.write(0, &[1]);
        state.return_data = vec![1];
        state.gas_remaining = 0;
        state.rollback(snapshot);
        assert_eq!(state, expected);
    }
}
