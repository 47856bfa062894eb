use enforcer_interface::{ErrNo, Opcode};

use crate::{
    instruction::ExecutionStatus, stack::STACK_LIMIT, step::Effects, VirtualMachine, World,
};

#[inline(always)]
pub(crate) fn boilerplate<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
    business_logic: impl FnOnce(&mut VirtualMachine<W>, &mut Effects) -> Result<(), ErrNo>,
) -> Result<ExecutionStatus, ErrNo> {
    full_boilerplate(vm, effects, opcode, |vm, effects| {
        business_logic(vm, effects)?;
        Ok(ExecutionStatus::Running)
    })
}

/// Checks the stack bounds, charges the static gas and advances `pc` past the instruction and its
/// immediates before running `business_logic`. Jumps overwrite `pc` again.
#[inline(always)]
pub(crate) fn full_boilerplate<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
    business_logic: impl FnOnce(
        &mut VirtualMachine<W>,
        &mut Effects,
    ) -> Result<ExecutionStatus, ErrNo>,
) -> Result<ExecutionStatus, ErrNo> {
    let stack = &vm.state.stack;
    if stack.materialised() < opcode.stack_inputs() {
        return Err(ErrNo::StackUnderflow);
    }
    let height = (stack.len() - opcode.stack_inputs()).checked_add(opcode.stack_outputs());
    if height.filter(|&height| height <= STACK_LIMIT).is_none() {
        return Err(ErrNo::StackOverflow);
    }
    // Contents that a one-step proof only committed by hash cannot be operated on.
    if (opcode.touches_memory() && vm.state.memory.is_elided())
        || (opcode.reads_call_data() && vm.call_data.is_elided())
    {
        return Err(ErrNo::InternalError);
    }
    vm.use_gas(opcode.base_gas())?;

    vm.state.pc = effects.pc + 1 + opcode.immediate_size();
    business_logic(vm, effects)
}
