use enforcer_interface::{ErrNo, Opcode};
use primitive_types::U256;

use super::common::boilerplate;
use crate::{
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    VirtualMachine, World,
};

fn pop<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [_] = vm.state.stack.pop();
        Ok(())
    })
}

/// `PUSHn`; immediates running past the end of the code read as zero.
fn push<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let start = effects.pc + 1;
        let immediate = start..start + opcode.immediate_size();
        effects.read_code(immediate.clone(), vm.program.len());
        let value = U256::from_big_endian(&vm.program.read(immediate));
        vm.state.stack.push(value);
        Ok(())
    })
}

fn dup<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        vm.state.stack.dup(opcode.dup_depth().unwrap_or(1));
        Ok(())
    })
}

fn swap<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        vm.state.stack.swap(opcode.swap_depth().unwrap_or(1));
        Ok(())
    })
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_stack_op(opcode: Opcode) -> Self {
        let handler: Handler<W> = if opcode == Opcode::Pop {
            pop::<W>
        } else if opcode.immediate_size() > 0 {
            push::<W>
        } else if opcode.dup_depth().is_some() {
            dup::<W>
        } else if opcode.swap_depth().is_some() {
            swap::<W>
        } else {
            return Self::from_unsupported(opcode);
        };
        Self { handler, opcode }
    }
}
