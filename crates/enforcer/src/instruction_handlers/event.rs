use enforcer_interface::{ErrNo, Opcode};
use primitive_types::H256;
use sha3::{Digest, Keccak256};

use super::common::boilerplate;
use crate::{
    hash::{keccak256, u256_to_h256},
    instruction::{ExecutionStatus, Instruction},
    step::Effects,
    VirtualMachine, World,
};

/// Gas per byte of logged data.
const LOG_DATA_GAS: u64 = 8;

/// `LOGn` folds the entry into the running log hash:
/// `keccak256(previous ‖ topic₀ ‖ … ‖ keccak256(data))`.
fn log<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset, size] = vm.state.stack.pop();
        let topics: Vec<_> = (0..opcode.log_topics().unwrap_or(0))
            .map(|_| {
                let [topic] = vm.state.stack.pop();
                topic
            })
            .collect();

        let range = vm.expand_memory(offset, size)?;
        let data = match &range {
            Some(range) => {
                let cost = (range.len() as u64)
                    .checked_mul(LOG_DATA_GAS)
                    .ok_or(ErrNo::OutOfGas)?;
                vm.use_gas(cost)?;
                vm.state.memory.read_range(range.clone())
            }
            None => Vec::new(),
        };

        let mut hasher = Keccak256::new();
        hasher.update(vm.state.log_hash.as_bytes());
        for topic in topics {
            hasher.update(u256_to_h256(topic).as_bytes());
        }
        hasher.update(keccak256(&data).as_bytes());
        vm.state.log_hash = H256(hasher.finalize().into());
        effects.mem_read = range;
        Ok(())
    })
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_log(opcode: Opcode) -> Self {
        if opcode.log_topics().is_none() {
            return Self::from_unsupported(opcode);
        }
        Self {
            handler: log::<W>,
            opcode,
        }
    }
}
