use std::sync::Arc;

use enforcer_interface::{ErrNo, Opcode};
use primitive_types::{H160, U256};

use super::{common::boilerplate, context::address_into_u256};
use crate::{
    hash::u256_to_h256,
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    world::ExternalCall,
    VirtualMachine, World,
};

/// Highest address reserved for precompiles.
const LAST_PRECOMPILE: u64 = 9;

/// `CALL` (`STATIC == false`) and `STATICCALL`. The callee must be handled by the [`World`];
/// there are no nested frames.
fn call<W: World, const STATIC: bool>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [_gas, target] = vm.state.stack.pop();
        let value = if STATIC {
            U256::zero()
        } else {
            let [value] = vm.state.stack.pop();
            value
        };
        let [in_offset, in_size, out_offset, out_size] = vm.state.stack.pop();

        let input_range = vm.expand_memory(in_offset, in_size)?;
        let output_range = vm.expand_memory(out_offset, out_size)?;
        if !value.is_zero() {
            return Err(ErrNo::InsufficientFunds);
        }
        let target = H160::from(u256_to_h256(target));
        let target_value = address_into_u256(target);
        if !target_value.is_zero() && target_value <= U256::from(LAST_PRECOMPILE) {
            return Err(ErrNo::PrecompileNotImplemented);
        }

        let input = input_range
            .as_ref()
            .map_or_else(Vec::new, |range| vm.state.memory.read_range(range.clone()));
        let call = ExternalCall {
            target,
            sender: vm.context.address,
            input: &input,
            is_static: STATIC,
        };
        let outcome = Arc::make_mut(&mut vm.state.world)
            .call(&call)
            .ok_or(ErrNo::InstructionNotSupported)?;

        if let Some(range) = &output_range {
            let copied = range.len().min(outcome.return_data.len());
            vm.state
                .memory
                .write(range.start, &outcome.return_data[..copied]);
        }
        vm.state.return_data = outcome.return_data;
        vm.state.stack.push(U256::from(u8::from(outcome.success)));
        effects.mem_read = input_range;
        effects.mem_write = output_range;
        Ok(())
    })
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_call(opcode: Opcode) -> Self {
        let handler: Handler<W> = match opcode {
            Opcode::Call => call::<W, false>,
            Opcode::StaticCall => call::<W, true>,
            _ => return Self::from_unsupported(opcode),
        };
        Self { handler, opcode }
    }
}
